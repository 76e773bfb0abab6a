// ==========================================
// Product Feed Import - command line entry point
// ==========================================
// Thin shell over the API layer: preview and auto-map a feed,
// manage feed configurations, run imports with live progress.
// ==========================================

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use feed_import::api::ApiError;
use feed_import::app::{get_default_db_path, AppState, DB_PATH_ENV};
use feed_import::domain::feed::{FeedConfig, FormatOptions, DEFAULT_CSV_DELIMITER};
use feed_import::domain::import_run::ImportProgress;
use feed_import::domain::types::{FeedFormat, RunStatus};
use feed_import::logging;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "feed-import", version, about = "Import product feeds into the shop catalog")]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = DB_PATH_ENV)]
    db: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the fields and a few items of a feed
    Preview(SourceArgs),
    /// Suggest field mappings for a feed
    AutoMap(SourceArgs),
    /// Manage feed configurations
    #[command(subcommand)]
    Feed(FeedCommand),
    /// Run imports and inspect their history
    #[command(subcommand)]
    Import(ImportCommand),
    /// Pipeline settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct SourceArgs {
    /// http(s):// URL, file:// URL or local path
    url: String,
    #[arg(long, default_value = "xml")]
    format: FeedFormat,
    /// Repeating item element (XML) or key path of the item array (JSON)
    #[arg(long)]
    item_path: Option<String>,
    #[arg(long, default_value_t = DEFAULT_CSV_DELIMITER)]
    delimiter: char,
    /// CSV without a header row
    #[arg(long)]
    no_header: bool,
}

impl SourceArgs {
    fn format_options(&self) -> FormatOptions {
        let mut options = FormatOptions::default();
        if self.item_path.is_some() {
            options.xml_item_path = self.item_path.clone();
        }
        options.csv_delimiter = self.delimiter;
        options.csv_has_header = !self.no_header;
        options
    }
}

#[derive(Subcommand)]
enum FeedCommand {
    /// Create a feed from a JSON configuration file
    Create { config: PathBuf },
    /// Replace a feed's configuration
    Update { feed_id: String, config: PathBuf },
    List {
        #[arg(long)]
        merchant: Option<String>,
    },
    Show { feed_id: String },
    Delete { feed_id: String },
    /// List the target fields a mapping can point to
    Fields,
}

#[derive(Subcommand)]
enum ImportCommand {
    /// Run an import and follow its progress (Ctrl-C stops it)
    Run {
        feed_id: String,
        /// Progress refresh interval
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
    /// Past runs of a feed, newest first
    History { feed_id: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    List,
    Set { key: String, value: String },
    Reset { key: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.log_json {
        logging::init_json();
    } else {
        logging::init();
    }

    let db_path = cli.db.clone().unwrap_or_else(get_default_db_path);
    tracing::debug!(db_path = %db_path, "using database");
    let state = AppState::new(db_path)
        .await
        .map_err(anyhow::Error::msg)
        .context("cannot initialize the application")?;

    match cli.command {
        Command::Preview(source) => {
            let preview = state
                .feed_api
                .preview(&source.url, source.format, &source.format_options())
                .await?;
            print_json(&preview)?;
        }
        Command::AutoMap(source) => {
            let preview = state
                .feed_api
                .preview(&source.url, source.format, &source.format_options())
                .await?;
            print_json(&state.feed_api.auto_map(&preview.fields))?;
        }
        Command::Feed(command) => run_feed_command(&state, command)?,
        Command::Import(ImportCommand::Run { feed_id, poll_ms }) => {
            run_import(&state, &feed_id, Duration::from_millis(poll_ms.max(100))).await?
        }
        Command::Import(ImportCommand::History { feed_id }) => {
            print_json(&state.import_api.get_import_history(&feed_id)?)?;
        }
        Command::Config(command) => match command {
            ConfigCommand::List => print_json(&state.config_api.list_configs()?)?,
            ConfigCommand::Set { key, value } => state.config_api.update_config(&key, &value)?,
            ConfigCommand::Reset { key } => {
                if !state.config_api.reset_config(&key)? {
                    eprintln!("{} was not set", key);
                }
            }
        },
    }

    Ok(())
}

fn run_feed_command(state: &AppState, command: FeedCommand) -> anyhow::Result<()> {
    match command {
        FeedCommand::Create { config } => {
            let feed = state.feed_api.create_feed(read_config(&config)?)?;
            print_json(&feed)?;
        }
        FeedCommand::Update { feed_id, config } => {
            let feed = state.feed_api.update_feed(&feed_id, read_config(&config)?)?;
            print_json(&feed)?;
        }
        FeedCommand::List { merchant } => {
            print_json(&state.feed_api.list_feeds(merchant.as_deref())?)?;
        }
        FeedCommand::Show { feed_id } => print_json(&state.feed_api.get_feed(&feed_id)?)?,
        FeedCommand::Delete { feed_id } => state.feed_api.delete_feed(&feed_id)?,
        FeedCommand::Fields => print_json(&state.feed_api.target_fields())?,
    }
    Ok(())
}

async fn run_import(state: &AppState, feed_id: &str, poll: Duration) -> anyhow::Result<()> {
    let run = state.import_api.start_import(feed_id).await?;
    eprintln!("run {} started", run.id);

    let finished = state.import_api.wait_for_import(feed_id);
    tokio::pin!(finished);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(poll);
    let mut stop_requested = false;

    let last = loop {
        tokio::select! {
            progress = &mut finished => break progress?,
            _ = ticker.tick() => {
                let progress = state.import_api.get_import_progress(feed_id)?;
                print_progress(&progress);
            }
            signal = &mut ctrl_c, if !stop_requested => {
                signal.context("cannot listen for Ctrl-C")?;
                stop_requested = true;
                eprintln!("stopping after the current item...");
                match state.import_api.stop_import(feed_id) {
                    Ok(()) | Err(ApiError::NotRunning(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    };

    for line in &last.logs {
        eprintln!("{} [{}] {}", line.time.format("%H:%M:%S"), line.level, line.message);
    }
    print_json(&*last)?;
    if last.status == RunStatus::Failed {
        bail!(
            "import failed: {}",
            last.error_message.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_progress(progress: &ImportProgress) {
    let percent = progress
        .percent
        .map(|p| format!("{:>5.1}%", p))
        .unwrap_or_else(|| "    ?%".to_string());
    eprintln!(
        "{} {} | created {} updated {} skipped {} errors {} | {:.0} items/s",
        percent,
        progress.message,
        progress.counters.created,
        progress.counters.updated,
        progress.counters.skipped,
        progress.counters.errors,
        progress.speed,
    );
}

fn read_config(path: &PathBuf) -> anyhow::Result<FeedConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a valid feed configuration", path.display()))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
