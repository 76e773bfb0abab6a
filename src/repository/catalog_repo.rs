// ==========================================
// Product Feed Import - catalog repository
// ==========================================
// SQLite implementation of CatalogStore over `catalog_product`.
// Stands in for the surrounding product catalog; no business rules.
// Key columns (ean/sku/external_id) are stored trimmed and titles
// get a normalized `title_key`, so lookups hit an index.
// ==========================================

use crate::db::{format_ts, open_sqlite_connection, parse_ts};
use crate::domain::product::CatalogProduct;
use crate::domain::record::NormalizedRecord;
use crate::domain::types::{normalize_title, MatchKey};
use crate::importer::error::ImportResult;
use crate::importer::importer_trait::CatalogStore;
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

const PRODUCT_COLUMNS: &str = r#"
    id, title, description, short_description,
    price, regular_price, sale_price,
    ean, sku, external_id,
    image_url, gallery_images,
    category, brand, manufacturer,
    stock_status, stock_quantity,
    affiliate_url, button_text, delivery_time,
    source_feed_id, created_at, updated_at
"#;

fn parse_decimal(raw: Option<String>) -> Option<Decimal> {
    raw.and_then(|s| s.parse::<Decimal>().ok())
}

fn map_product_row(row: &Row<'_>) -> rusqlite::Result<CatalogProduct> {
    let gallery: String = row.get(11)?;
    Ok(CatalogProduct {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        short_description: row.get(3)?,
        price: parse_decimal(row.get(4)?),
        regular_price: parse_decimal(row.get(5)?),
        sale_price: parse_decimal(row.get(6)?),
        ean: row.get(7)?,
        sku: row.get(8)?,
        external_id: row.get(9)?,
        image_url: row.get(10)?,
        gallery_images: serde_json::from_str(&gallery).unwrap_or_default(),
        category: row.get(12)?,
        brand: row.get(13)?,
        manufacturer: row.get(14)?,
        stock_status: row.get(15)?,
        stock_quantity: row.get(16)?,
        affiliate_url: row.get(17)?,
        button_text: row.get(18)?,
        delivery_time: row.get(19)?,
        source_feed_id: row.get(20)?,
        created_at: row.get::<_, String>(21).ok().and_then(|s| parse_ts(&s)),
        updated_at: row.get::<_, String>(22).ok().and_then(|s| parse_ts(&s)),
    })
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim)
}

// ==========================================
// SqliteCatalogRepository
// ==========================================
pub struct SqliteCatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogRepository {
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

    /// Writes every column of `product` (insert or full replace).
    fn save(conn: &Connection, product: &CatalogProduct) -> RepositoryResult<()> {
        let now = Utc::now();
        let gallery = serde_json::to_string(&product.gallery_images)?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO catalog_product ({}, title_key) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                    ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24
                )",
                PRODUCT_COLUMNS
            ),
            params![
                product.id,
                product.title,
                product.description,
                product.short_description,
                product.price.map(|d| d.to_string()),
                product.regular_price.map(|d| d.to_string()),
                product.sale_price.map(|d| d.to_string()),
                trimmed(&product.ean),
                trimmed(&product.sku),
                trimmed(&product.external_id),
                product.image_url,
                gallery,
                product.category,
                product.brand,
                product.manufacturer,
                product.stock_status,
                product.stock_quantity,
                product.affiliate_url,
                product.button_text,
                product.delivery_time,
                product.source_feed_id,
                format_ts(product.created_at.unwrap_or(now)),
                format_ts(product.updated_at.unwrap_or(now)),
                product.title.as_deref().map(normalize_title),
            ],
        )?;
        Ok(())
    }

    fn load(conn: &Connection, id: &str) -> RepositoryResult<Option<CatalogProduct>> {
        let product = conn
            .query_row(
                &format!("SELECT {} FROM catalog_product WHERE id = ?1", PRODUCT_COLUMNS),
                params![id],
                map_product_row,
            )
            .optional()?;
        Ok(product)
    }

    /// Inserts a ready-made product (catalog seeding).
    pub fn insert_product(&self, product: &CatalogProduct) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        Self::save(&conn, product)
    }

    pub fn get_product(&self, id: &str) -> RepositoryResult<Option<CatalogProduct>> {
        let conn = self.get_conn()?;
        Self::load(&conn, id)
    }

    pub fn list_products(&self) -> RepositoryResult<Vec<CatalogProduct>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM catalog_product ORDER BY created_at, id",
            PRODUCT_COLUMNS
        ))?;
        let products = stmt
            .query_map([], map_product_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    pub fn count_products(&self) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM catalog_product", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn find_by_match_key(&self, key: MatchKey, value: &str) -> RepositoryResult<Vec<CatalogProduct>> {
        let column = match key {
            MatchKey::Ean => "ean",
            MatchKey::Sku => "sku",
            MatchKey::ExternalId => "external_id",
            MatchKey::Title => "title_key",
        };
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM catalog_product WHERE {} = ?1 ORDER BY updated_at DESC, rowid DESC",
            PRODUCT_COLUMNS, column
        ))?;
        let products = stmt
            .query_map(params![value], map_product_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogRepository {
    async fn find_products_by_match_key(
        &self,
        key: MatchKey,
        value: &str,
    ) -> ImportResult<Vec<CatalogProduct>> {
        Ok(self.find_by_match_key(key, value)?)
    }

    async fn create_product(
        &self,
        record: &NormalizedRecord,
        source_feed_id: &str,
    ) -> ImportResult<String> {
        let now = Utc::now();
        let mut product = CatalogProduct::from_record(Uuid::new_v4().to_string(), record);
        product.source_feed_id = Some(source_feed_id.to_string());
        product.created_at = Some(now);
        product.updated_at = Some(now);

        let conn = self.get_conn()?;
        Self::save(&conn, &product)?;
        Ok(product.id)
    }

    async fn update_product(&self, id: &str, record: &NormalizedRecord) -> ImportResult<()> {
        let conn = self.get_conn()?;
        let tx = conn.unchecked_transaction().map_err(RepositoryError::from)?;
        let mut product =
            Self::load(&tx, id)?.ok_or_else(|| RepositoryError::not_found("CatalogProduct", id))?;
        product.apply(record);
        product.updated_at = Some(Utc::now());
        Self::save(&tx, &product)?;
        tx.commit().map_err(RepositoryError::from)?;
        Ok(())
    }
}
