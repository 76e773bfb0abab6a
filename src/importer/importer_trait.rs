// ==========================================
// Product Feed Import - importer seams
// ==========================================
// Interfaces the pipeline depends on but does not own:
// - FeedFetcher:   bytes of a feed URL
// - CatalogStore:  the product catalog the pipeline writes into
// ==========================================

use crate::domain::product::CatalogProduct;
use crate::domain::record::NormalizedRecord;
use crate::domain::types::MatchKey;
use crate::importer::error::ImportResult;
use async_trait::async_trait;

// ==========================================
// FeedFetcher Trait
// ==========================================
// Implementors: HttpFeedFetcher (http/https/file), test stubs
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Downloads the complete feed body.
    ///
    /// # Errors
    /// - `FeedUnreachable` on connect/timeout failures, non-success
    ///   status, oversized or empty bodies
    async fn fetch(&self, url: &str) -> ImportResult<Vec<u8>>;
}

// ==========================================
// CatalogStore Trait
// ==========================================
// Implementors: SqliteCatalogRepository
//
// The store does its own field validation; the pipeline only hands
// it normalized records.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every product whose `key` column equals `value`.
    ///
    /// `value` arrives already normalized through `MatchKey::normalize`.
    /// Most recently updated first.
    async fn find_products_by_match_key(
        &self,
        key: MatchKey,
        value: &str,
    ) -> ImportResult<Vec<CatalogProduct>>;

    /// Creates a product from the mapped fields, returns its id.
    async fn create_product(
        &self,
        record: &NormalizedRecord,
        source_feed_id: &str,
    ) -> ImportResult<String>;

    /// Overwrites only the fields present in `record`.
    async fn update_product(&self, id: &str, record: &NormalizedRecord) -> ImportResult<()>;
}
