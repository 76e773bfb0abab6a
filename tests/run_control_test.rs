// ==========================================
// Run control integration tests
// ==========================================
// Cancellation, one-run-per-feed, edit locking, restart
// reconciliation and concurrent feeds writing the same product.
// ==========================================


use chrono::Utc;
use feed_import::api::ApiError;
use feed_import::config::PipelineSettings;
use feed_import::domain::feed::Feed;
use feed_import::domain::import_run::ImportRun;
use feed_import::domain::types::RunStatus;
use feed_import::domain::target_schema::TargetField;
use feed_import::importer::error::ImportError;
use feed_import::importer::import_orchestrator::ABANDONED_MESSAGE;
use feed_import::importer::CatalogStore;
use feed_import::logging;
use feed_import::repository::import_run_repo::INTERRUPTED_MESSAGE;
use feed_import::repository::ImportRunRepository;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use test_helpers::*;

const URL: &str = "https://supplier.example.com/feed.csv";

#[tokio::test]
async fn test_stop_takes_effect_after_the_record_in_flight() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(URL, numbered_csv_body(5000, 10));

    let mut gate = None;
    let pipeline = create_pipeline(
        &db_path,
        fetcher,
        |catalog| {
            let gated = GatedCatalog::new(catalog, 3);
            gate = Some(gated.clone());
            gated as Arc<dyn CatalogStore>
        },
        PipelineSettings::default(),
    );
    let gate = gate.expect("catalog was not built");

    let feed = Feed::from_config("feed-1".to_string(), csv_feed(URL), Utc::now());
    pipeline.feeds.insert(&feed).unwrap();

    let run = pipeline.orchestrator.start(&feed.id).await.unwrap();
    assert_eq!(run.status, RunStatus::Running);

    // third write is in flight
    gate.reached.notified().await;
    pipeline.orchestrator.stop(&feed.id).unwrap();
    gate.resume.notify_one();

    let progress = pipeline.orchestrator.wait_for_completion(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Cancelled);
    assert_eq!(progress.counters.processed, 3);
    assert_eq!(progress.counters.created, 3);
    assert_eq!(progress.total, Some(10));
    assert!(progress.logs.iter().any(|l| l.message.contains("cancelled after 3 items")));

    let stored = pipeline.runs.find_by_id(&run.id).unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Cancelled);
    assert_eq!(stored.counters.processed, 3);
    assert!(stored.finished_at.is_some());
    assert!(stored.error_message.is_none());
    assert_eq!(pipeline.catalog.count_products().unwrap(), 3);

    // a new run starts from the first record
    pipeline.orchestrator.start(&feed.id).await.unwrap();
    let progress = pipeline.orchestrator.wait_for_completion(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.counters.processed, 10);
    assert_eq!(progress.counters.updated, 3);
    assert_eq!(progress.counters.created, 7);
    assert_eq!(pipeline.catalog.count_products().unwrap(), 10);
}

#[tokio::test]
async fn test_checkpoints_are_published_while_running() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(URL, numbered_csv_body(6000, 10));

    let mut gate = None;
    let pipeline = create_pipeline(
        &db_path,
        fetcher,
        |catalog| {
            let gated = GatedCatalog::new(catalog, 3);
            gate = Some(gated.clone());
            gated as Arc<dyn CatalogStore>
        },
        PipelineSettings {
            checkpoint_interval: Duration::ZERO,
            ..PipelineSettings::default()
        },
    );
    let gate = gate.expect("catalog was not built");

    let feed = Feed::from_config("feed-1".to_string(), csv_feed(URL), Utc::now());
    pipeline.feeds.insert(&feed).unwrap();
    let run = pipeline.orchestrator.start(&feed.id).await.unwrap();

    // third write is in flight, the first two are checkpointed
    gate.reached.notified().await;
    let progress = pipeline.orchestrator.progress(&feed.id).unwrap();
    assert_eq!(progress.status, RunStatus::Running);
    assert_eq!(progress.run_id.as_deref(), Some(run.id.as_str()));
    assert_eq!(progress.total, Some(10));
    assert_eq!(progress.counters.processed, 2);
    assert_eq!(progress.counters.created, 2);
    assert_eq!(progress.percent, Some(20.0));
    assert_eq!(progress.message, "Importing 2 / 10");
    assert!(progress.logs.iter().any(|l| l.message == "Found 10 items"));
    assert!(progress.error_message.is_none());

    let stored = pipeline.runs.find_by_id(&run.id).unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Running);
    assert_eq!(stored.total_items, Some(10));
    assert_eq!(stored.counters, progress.counters);
    assert!(stored.finished_at.is_none());

    gate.resume.notify_one();
    let progress = pipeline.orchestrator.wait_for_completion(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.counters.created, 10);
}

#[tokio::test]
async fn test_start_waits_for_an_edit_in_progress() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(URL, numbered_csv_body(7000, 2));
    let pipeline = create_pipeline(
        &db_path,
        fetcher,
        |catalog| catalog as Arc<dyn CatalogStore>,
        PipelineSettings::default(),
    );
    let feed = Feed::from_config("feed-1".to_string(), csv_feed(URL), Utc::now());
    pipeline.feeds.insert(&feed).unwrap();

    // an edit has written a half-finished mapping list and still holds the feed
    let edit = pipeline.orchestrator.try_lock_feed_for_edit(&feed.id).unwrap();
    let mut half_edited = feed.clone();
    half_edited
        .field_mappings
        .retain(|m| m.target_field != TargetField::Title);
    pipeline.feeds.update(&half_edited).unwrap();

    match pipeline.orchestrator.start(&feed.id).await {
        Err(ImportError::FeedBusy(id)) => assert_eq!(id, feed.id),
        other => panic!("Expected FeedBusy, got {:?}", other),
    }
    assert!(pipeline.runs.list_by_feed(&feed.id, None).unwrap().is_empty());

    pipeline.feeds.update(&feed).unwrap();
    drop(edit);

    pipeline.orchestrator.start(&feed.id).await.unwrap();
    let progress = pipeline.orchestrator.wait_for_completion(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.counters.created, 2);
}

#[tokio::test]
async fn test_panicking_run_releases_the_feed() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(URL, numbered_csv_body(8000, 3));
    let pipeline = create_pipeline(
        &db_path,
        fetcher,
        |_| Arc::new(PanickingCatalog) as Arc<dyn CatalogStore>,
        PipelineSettings::default(),
    );
    let feed = Feed::from_config("feed-1".to_string(), csv_feed(URL), Utc::now());
    pipeline.feeds.insert(&feed).unwrap();

    let run = pipeline.orchestrator.start(&feed.id).await.unwrap();
    let progress = pipeline.orchestrator.wait_for_completion(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Failed);
    assert_eq!(progress.error_message.as_deref(), Some(ABANDONED_MESSAGE));
    assert!(!pipeline.orchestrator.is_running(&feed.id).unwrap());

    let stored = pipeline.runs.find_by_id(&run.id).unwrap().unwrap();
    assert_eq!(stored.status, RunStatus::Failed);
    assert_eq!(stored.error_message.as_deref(), Some(ABANDONED_MESSAGE));
    assert!(stored.finished_at.is_some());

    // the feed can be started again
    let second = pipeline.orchestrator.start(&feed.id).await.unwrap();
    assert_ne!(second.id, run.id);
    pipeline.orchestrator.wait_for_completion(&feed.id).await.unwrap();
    assert_eq!(pipeline.runs.list_by_feed(&feed.id, None).unwrap().len(), 2);
}

#[tokio::test]
async fn test_stop_before_download_cancels_with_nothing_processed() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let memory = MemoryFetcher::new();
    memory.insert(URL, numbered_csv_body(100, 4));
    let fetcher = GatedFetcher::new(memory);
    let app = create_app(&db_path, fetcher.clone()).await;

    let feed = app.feed_api.create_feed(csv_feed(URL)).unwrap();
    app.import_api.start_import(&feed.id).await.unwrap();
    assert_eq!(
        app.import_api.get_import_progress(&feed.id).unwrap().status,
        RunStatus::Running
    );

    app.import_api.stop_import(&feed.id).unwrap();
    fetcher.release();

    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Cancelled);
    assert_eq!(progress.counters.processed, 0);
    assert_eq!(app.catalog.count_products().unwrap(), 0);

    let history = app.import_api.get_import_history(&feed.id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Cancelled);

    // nothing left to stop
    assert!(matches!(
        app.import_api.stop_import(&feed.id),
        Err(ApiError::NotRunning(_))
    ));
}

#[tokio::test]
async fn test_running_feed_rejects_second_start_and_edits() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let memory = MemoryFetcher::new();
    memory.insert(URL, numbered_csv_body(200, 5));
    let fetcher = GatedFetcher::new(memory.clone());
    let app = create_app(&db_path, fetcher.clone()).await;

    let feed = app.feed_api.create_feed(csv_feed(URL)).unwrap();
    assert!(matches!(
        app.import_api.stop_import(&feed.id),
        Err(ApiError::NotRunning(_))
    ));

    let run = app.import_api.start_import(&feed.id).await.unwrap();

    assert!(matches!(
        app.import_api.start_import(&feed.id).await,
        Err(ApiError::AlreadyRunning(_))
    ));
    let mut edited = csv_feed(URL);
    edited.name = "Edited while running".to_string();
    assert!(matches!(
        app.feed_api.update_feed(&feed.id, edited.clone()),
        Err(ApiError::FeedBusy(_))
    ));
    assert!(matches!(
        app.feed_api.delete_feed(&feed.id),
        Err(ApiError::FeedBusy(_))
    ));

    fetcher.release();
    let progress = app.import_api.wait_for_import(&feed.id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.run_id.as_deref(), Some(run.id.as_str()));
    assert_eq!(progress.counters.created, 5);
    assert_eq!(memory.fetch_count(), 1);

    // the run only ever saw the configuration it started with
    let history = app.import_api.get_import_history(&feed.id).unwrap();
    assert_eq!(history.len(), 1);

    let updated = app.feed_api.update_feed(&feed.id, edited).unwrap();
    assert_eq!(updated.name, "Edited while running");
}

#[tokio::test]
async fn test_inactive_and_unknown_feeds_cannot_start() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let app = create_app(&db_path, MemoryFetcher::new()).await;

    let mut config = csv_feed(URL);
    config.active = false;
    let feed = app.feed_api.create_feed(config).unwrap();

    assert!(matches!(
        app.import_api.start_import(&feed.id).await,
        Err(ApiError::ValidationError(_))
    ));
    assert!(matches!(
        app.import_api.start_import("no-such-feed").await,
        Err(ApiError::NotFound(_))
    ));
    assert!(app.import_api.get_import_history(&feed.id).unwrap().is_empty());
}

#[tokio::test]
async fn test_orchestrator_errors_carry_the_feed_id() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let pipeline = create_pipeline(
        &db_path,
        MemoryFetcher::new(),
        |catalog| catalog as Arc<dyn CatalogStore>,
        PipelineSettings::default(),
    );

    match pipeline.orchestrator.stop("feed-x") {
        Err(ImportError::NotRunning(id)) => assert_eq!(id, "feed-x"),
        other => panic!("Expected NotRunning, got {:?}", other),
    }
    match pipeline.orchestrator.start("feed-x").await {
        Err(ImportError::FeedNotFound(id)) => assert_eq!(id, "feed-x"),
        other => panic!("Expected FeedNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_runs_left_running_are_closed_on_startup() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    fetcher.insert(URL, numbered_csv_body(300, 3));

    let feed_id = {
        let app = create_app(&db_path, fetcher.clone()).await;
        app.feed_api.create_feed(csv_feed(URL)).unwrap().id
    };

    // a run the previous process never finished
    let runs = ImportRunRepository::new(&db_path).unwrap();
    let orphan = ImportRun::start("orphan-run".to_string(), feed_id.clone(), Utc::now());
    runs.insert(&orphan).unwrap();

    let app = create_app(&db_path, fetcher).await;
    assert_eq!(app.reconciled_runs, vec!["orphan-run".to_string()]);

    let history = app.import_api.get_import_history(&feed_id).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, RunStatus::Failed);
    assert_eq!(history[0].error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
    assert!(history[0].finished_at.is_some());

    let progress = app.import_api.get_import_progress(&feed_id).unwrap();
    assert_eq!(progress.status, RunStatus::Idle);

    // the feed is usable again
    app.import_api.start_import(&feed_id).await.unwrap();
    let progress = app.import_api.wait_for_import(&feed_id).await.unwrap();
    assert_eq!(progress.status, RunStatus::Completed);
    assert_eq!(progress.counters.created, 3);
    assert_eq!(app.import_api.get_import_history(&feed_id).unwrap().len(), 2);

    // a clean database has nothing to reconcile
    let app = create_app(&db_path, MemoryFetcher::new()).await;
    assert!(app.reconciled_runs.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_feeds_sharing_an_ean_create_one_product() {
    logging::init_test();
    let (_db, db_path) = create_test_db().expect("Failed to create test db");
    let fetcher = MemoryFetcher::new();
    let app = create_app(&db_path, fetcher.clone()).await;

    let mut feed_ids = Vec::new();
    for i in 0..4 {
        let url = format!("https://supplier-{}.example.com/feed.csv", i);
        let shared_name = format!("Shared from {}", i);
        let own_ean = format!("40000000001{}0", i);
        fetcher.insert(
            &url,
            csv_body(&[
                ("4000000000001", shared_name.as_str(), "10,00"),
                (own_ean.as_str(), "Own product", "5,00"),
            ]),
        );
        let mut config = csv_feed(&url);
        config.merchant_id = format!("merchant-{}", i);
        feed_ids.push(app.feed_api.create_feed(config).unwrap().id);
    }

    for id in &feed_ids {
        app.import_api.start_import(id).await.unwrap();
    }
    let results = join_all(feed_ids.iter().map(|id| app.import_api.wait_for_import(id))).await;

    let mut created = 0;
    let mut updated = 0;
    for progress in results {
        let progress = progress.unwrap();
        assert_eq!(progress.status, RunStatus::Completed);
        assert_eq!(progress.counters.errors, 0);
        created += progress.counters.created;
        updated += progress.counters.updated;
    }
    // 4 own products + 1 shared; the other 3 shared rows update it
    assert_eq!(created, 5);
    assert_eq!(updated, 3);

    let products = app.catalog.list_products().unwrap();
    let shared: Vec<_> = products
        .iter()
        .filter(|p| p.ean.as_deref() == Some("4000000000001"))
        .collect();
    assert_eq!(shared.len(), 1);
    assert_eq!(products.len(), 5);
}
