// ==========================================
// Product Feed Import - feed repository
// ==========================================
// Tables: feed, feed_field_mapping (ordered by position)
// Mappings are always replaced as a whole together with their feed.
// ==========================================

use crate::db::{format_ts, open_sqlite_connection, parse_ts};
use crate::domain::feed::{Feed, FieldMapping, FormatOptions, DEFAULT_CSV_DELIMITER};
use crate::domain::types::UnknownVariant;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

const FEED_COLUMNS: &str = r#"
    id, merchant_id, name, description, source_url, format,
    xml_item_path, csv_delimiter, csv_has_header,
    import_mode, match_by, import_images, active,
    last_run_at, product_count, created_at, updated_at
"#;

/// Parses an enum column, reporting the column index on failure.
fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    Ok(parse_ts(&raw).unwrap_or_else(Utc::now))
}

fn map_feed_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
    let delimiter: String = row.get(7)?;
    Ok(Feed {
        id: row.get(0)?,
        merchant_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        source_url: row.get(4)?,
        format: parse_col(row, 5)?,
        format_options: FormatOptions {
            xml_item_path: row.get(6)?,
            csv_delimiter: delimiter.chars().next().unwrap_or(DEFAULT_CSV_DELIMITER),
            csv_has_header: row.get(8)?,
        },
        import_mode: parse_col(row, 9)?,
        match_by: parse_col(row, 10)?,
        import_images: row.get(11)?,
        active: row.get(12)?,
        last_run_at: row
            .get::<_, Option<String>>(13)?
            .and_then(|s| parse_ts(&s)),
        product_count: row.get(14)?,
        created_at: parse_ts_col(row, 15)?,
        updated_at: parse_ts_col(row, 16)?,
        field_mappings: Vec::new(),
    })
}

fn map_mapping_row(row: &Row<'_>) -> rusqlite::Result<FieldMapping> {
    Ok(FieldMapping {
        source_field: row.get(0)?,
        target_field: parse_col(row, 1)?,
        transform_type: parse_col(row, 2)?,
        transform_value: row.get(3)?,
        default_value: row.get(4)?,
        is_required: row.get(5)?,
    })
}

// ==========================================
// FeedRepository
// ==========================================
pub struct FeedRepository {
    conn: Arc<Mutex<Connection>>,
}

impl FeedRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(RepositoryError::lock)
    }

    fn write_mappings(conn: &Connection, feed: &Feed) -> RepositoryResult<()> {
        conn.execute(
            "DELETE FROM feed_field_mapping WHERE feed_id = ?1",
            params![feed.id],
        )?;
        let mut stmt = conn.prepare(
            r#"
            INSERT INTO feed_field_mapping (
                feed_id, position, source_field, target_field,
                transform_type, transform_value, default_value, is_required
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;
        for (position, m) in feed.field_mappings.iter().enumerate() {
            stmt.execute(params![
                feed.id,
                position as i64,
                m.source_field,
                m.target_field.as_str(),
                m.transform_type.as_str(),
                m.transform_value,
                m.default_value,
                m.is_required,
            ])?;
        }
        Ok(())
    }

    fn load_mappings(conn: &Connection, feed_id: &str) -> RepositoryResult<Vec<FieldMapping>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT source_field, target_field, transform_type,
                   transform_value, default_value, is_required
            FROM feed_field_mapping
            WHERE feed_id = ?1
            ORDER BY position
            "#,
        )?;
        let mappings = stmt
            .query_map(params![feed_id], map_mapping_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(mappings)
    }

    pub fn insert(&self, feed: &Feed) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            &format!(
                "INSERT INTO feed ({}) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17
                )",
                FEED_COLUMNS
            ),
            params![
                feed.id,
                feed.merchant_id,
                feed.name,
                feed.description,
                feed.source_url,
                feed.format.as_str(),
                feed.format_options.xml_item_path,
                feed.format_options.csv_delimiter.to_string(),
                feed.format_options.csv_has_header,
                feed.import_mode.as_str(),
                feed.match_by.as_str(),
                feed.import_images,
                feed.active,
                feed.last_run_at.map(format_ts),
                feed.product_count,
                format_ts(feed.created_at),
                format_ts(feed.updated_at),
            ],
        )?;
        Self::write_mappings(&tx, feed)?;
        tx.commit()?;
        Ok(())
    }

    /// Saves an edited configuration. Run statistics are left as stored.
    pub fn update(&self, feed: &Feed) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction()?;
        let changed = tx.execute(
            r#"
            UPDATE feed SET
                merchant_id = ?2, name = ?3, description = ?4, source_url = ?5,
                format = ?6, xml_item_path = ?7, csv_delimiter = ?8, csv_has_header = ?9,
                import_mode = ?10, match_by = ?11, import_images = ?12, active = ?13,
                updated_at = ?14
            WHERE id = ?1
            "#,
            params![
                feed.id,
                feed.merchant_id,
                feed.name,
                feed.description,
                feed.source_url,
                feed.format.as_str(),
                feed.format_options.xml_item_path,
                feed.format_options.csv_delimiter.to_string(),
                feed.format_options.csv_has_header,
                feed.import_mode.as_str(),
                feed.match_by.as_str(),
                feed.import_images,
                feed.active,
                format_ts(feed.updated_at),
            ],
        )?;
        if changed == 0 {
            return Err(RepositoryError::not_found("Feed", &feed.id));
        }
        Self::write_mappings(&tx, feed)?;
        tx.commit()?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> RepositoryResult<Option<Feed>> {
        let conn = self.get_conn()?;
        let feed = conn
            .query_row(
                &format!("SELECT {} FROM feed WHERE id = ?1", FEED_COLUMNS),
                params![id],
                map_feed_row,
            )
            .optional()?;
        match feed {
            Some(mut feed) => {
                feed.field_mappings = Self::load_mappings(&conn, &feed.id)?;
                Ok(Some(feed))
            }
            None => Ok(None),
        }
    }

    /// Feeds ordered by name; all merchants when `merchant_id` is None.
    pub fn list(&self, merchant_id: Option<&str>) -> RepositoryResult<Vec<Feed>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM feed WHERE (?1 IS NULL OR merchant_id = ?1) ORDER BY name, id",
            FEED_COLUMNS
        ))?;
        let mut feeds = stmt
            .query_map(params![merchant_id], map_feed_row)?
            .collect::<Result<Vec<_>, _>>()?;
        for feed in &mut feeds {
            feed.field_mappings = Self::load_mappings(&conn, &feed.id)?;
        }
        Ok(feeds)
    }

    /// Deletes the feed, its mappings and its run history.
    pub fn delete(&self, id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM feed WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(RepositoryError::not_found("Feed", id));
        }
        Ok(())
    }

    /// Stamps a finished run: last_run_at and the created-products tally.
    pub fn record_run(&self, id: &str, at: DateTime<Utc>, created: u64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE feed SET last_run_at = ?2, product_count = product_count + ?3 WHERE id = ?1",
            params![id, format_ts(at), created as i64],
        )?;
        if changed == 0 {
            return Err(RepositoryError::not_found("Feed", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use crate::domain::feed::FeedConfig;
    use crate::domain::target_schema::TargetField;
    use crate::domain::types::{FeedFormat, ImportMode, MatchKey, TransformType};

    fn repo() -> FeedRepository {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        FeedRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn feed(id: &str, merchant: &str, name: &str) -> Feed {
        let config = FeedConfig {
            merchant_id: merchant.into(),
            name: name.into(),
            description: String::new(),
            source_url: "https://example.com/feed.csv".into(),
            format: FeedFormat::Csv,
            format_options: FormatOptions::default(),
            import_mode: ImportMode::CreateOnly,
            match_by: MatchKey::Sku,
            import_images: false,
            active: true,
            field_mappings: vec![
                FieldMapping::new("name", TargetField::Title),
                FieldMapping::new("price", TargetField::Price)
                    .with_transform(TransformType::Price, ""),
            ],
        };
        Feed::from_config(id.into(), config, Utc::now())
    }

    #[test]
    fn test_insert_and_load_round_trip() {
        let repo = repo();
        repo.insert(&feed("f1", "m1", "Supplier")).unwrap();

        let loaded = repo.find_by_id("f1").unwrap().unwrap();
        assert_eq!(loaded.import_mode, ImportMode::CreateOnly);
        assert_eq!(loaded.match_by, MatchKey::Sku);
        assert!(!loaded.import_images);
        assert_eq!(loaded.format_options.csv_delimiter, ';');
        assert_eq!(loaded.field_mappings.len(), 2);
        assert_eq!(loaded.field_mappings[1].transform_type, TransformType::Price);
        assert!(loaded.field_mappings[0].is_required);
    }

    #[test]
    fn test_update_replaces_mappings() {
        let repo = repo();
        let mut f = feed("f1", "m1", "Supplier");
        repo.insert(&f).unwrap();

        f.name = "Renamed".into();
        f.field_mappings.push(FieldMapping::new("ean", TargetField::Ean));
        repo.update(&f).unwrap();

        let loaded = repo.find_by_id("f1").unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(loaded.field_mappings.len(), 3);
        assert_eq!(loaded.field_mappings[2].target_field, TargetField::Ean);
    }

    #[test]
    fn test_list_by_merchant_and_delete() {
        let repo = repo();
        repo.insert(&feed("f1", "m1", "B")).unwrap();
        repo.insert(&feed("f2", "m1", "A")).unwrap();
        repo.insert(&feed("f3", "m2", "C")).unwrap();

        let names: Vec<_> = repo
            .list(Some("m1"))
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(repo.list(None).unwrap().len(), 3);

        repo.delete("f1").unwrap();
        assert!(repo.find_by_id("f1").unwrap().is_none());
        assert!(matches!(
            repo.delete("f1"),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_record_run_accumulates_product_count() {
        let repo = repo();
        repo.insert(&feed("f1", "m1", "Supplier")).unwrap();
        repo.record_run("f1", Utc::now(), 3).unwrap();
        repo.record_run("f1", Utc::now(), 2).unwrap();

        let loaded = repo.find_by_id("f1").unwrap().unwrap();
        assert_eq!(loaded.product_count, 5);
        assert!(loaded.last_run_at.is_some());
    }
}
