// ==========================================
// Product Feed Import - SQLite connection and schema
// ==========================================
// Every connection goes through open_sqlite_connection so that
// foreign keys and busy_timeout are set the same way everywhere.
// ==========================================

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default busy_timeout (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema version created by `init_schema`.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// Per-connection PRAGMAs (foreign_keys and busy_timeout are not persistent).
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Opens the database, creates missing tables and wraps it for sharing.
pub fn open_shared(db_path: &str) -> rusqlite::Result<Arc<Mutex<Connection>>> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Stored timestamp format (RFC 3339, microseconds, `Z`); sorts lexically.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Reads schema_version (None when the table does not exist yet).
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// Creates every table the pipeline uses. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS feed (
            id TEXT PRIMARY KEY,
            merchant_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            source_url TEXT NOT NULL,
            format TEXT NOT NULL,
            xml_item_path TEXT,
            csv_delimiter TEXT NOT NULL DEFAULT ';',
            csv_has_header INTEGER NOT NULL DEFAULT 1,
            import_mode TEXT NOT NULL,
            match_by TEXT NOT NULL,
            import_images INTEGER NOT NULL DEFAULT 1,
            active INTEGER NOT NULL DEFAULT 1,
            last_run_at TEXT,
            product_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_feed_merchant ON feed(merchant_id);

        CREATE TABLE IF NOT EXISTS feed_field_mapping (
            feed_id TEXT NOT NULL REFERENCES feed(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            source_field TEXT NOT NULL,
            target_field TEXT NOT NULL,
            transform_type TEXT NOT NULL DEFAULT 'none',
            transform_value TEXT NOT NULL DEFAULT '',
            default_value TEXT NOT NULL DEFAULT '',
            is_required INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (feed_id, position)
        );

        CREATE TABLE IF NOT EXISTS import_run (
            id TEXT PRIMARY KEY,
            feed_id TEXT NOT NULL REFERENCES feed(id) ON DELETE CASCADE,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            status TEXT NOT NULL,
            total_items INTEGER,
            processed INTEGER NOT NULL DEFAULT 0,
            created INTEGER NOT NULL DEFAULT 0,
            updated INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0,
            error_message TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_import_run_feed ON import_run(feed_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_import_run_status ON import_run(status);

        CREATE TABLE IF NOT EXISTS catalog_product (
            id TEXT PRIMARY KEY,
            title TEXT,
            title_key TEXT,
            description TEXT,
            short_description TEXT,
            price TEXT,
            regular_price TEXT,
            sale_price TEXT,
            ean TEXT,
            sku TEXT,
            external_id TEXT,
            image_url TEXT,
            gallery_images TEXT NOT NULL DEFAULT '[]',
            category TEXT,
            brand TEXT,
            manufacturer TEXT,
            stock_status INTEGER,
            stock_quantity INTEGER,
            affiliate_url TEXT,
            button_text TEXT,
            delivery_time TEXT,
            source_feed_id TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_catalog_ean ON catalog_product(ean);
        CREATE INDEX IF NOT EXISTS idx_catalog_sku ON catalog_product(sku);
        CREATE INDEX IF NOT EXISTS idx_catalog_external_id ON catalog_product(external_id);
        CREATE INDEX IF NOT EXISTS idx_catalog_title_key ON catalog_product(title_key);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
