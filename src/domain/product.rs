// ==========================================
// Product Feed Import - catalog product
// ==========================================
// Row of the catalog the pipeline writes into. Every target field
// is optional; a product only carries what some feed mapped.
// ==========================================

use crate::domain::record::{FieldValue, NormalizedRecord};
use crate::domain::target_schema::TargetField;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub price: Option<Decimal>,
    pub regular_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub ean: Option<String>,
    pub sku: Option<String>,
    pub external_id: Option<String>,
    pub image_url: Option<String>,
    pub gallery_images: Vec<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub manufacturer: Option<String>,
    pub stock_status: Option<bool>,
    pub stock_quantity: Option<i64>,
    pub affiliate_url: Option<String>,
    pub button_text: Option<String>,
    pub delivery_time: Option<String>,
    /// Feed that created the product.
    pub source_feed_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CatalogProduct {
    pub fn from_record(id: String, record: &NormalizedRecord) -> Self {
        let mut product = Self {
            id,
            ..Self::default()
        };
        product.apply(record);
        product
    }

    /// Overwrites only the fields present in `record`.
    pub fn apply(&mut self, record: &NormalizedRecord) {
        for (field, value) in &record.fields {
            self.set(*field, value);
        }
    }

    fn set(&mut self, field: TargetField, value: &FieldValue) {
        let text = || Some(value.to_string());
        match field {
            TargetField::Title => self.title = text(),
            TargetField::Description => self.description = text(),
            TargetField::ShortDescription => self.short_description = text(),
            TargetField::Price => self.price = value.as_price(),
            TargetField::RegularPrice => self.regular_price = value.as_price(),
            TargetField::SalePrice => self.sale_price = value.as_price(),
            TargetField::Ean => self.ean = text(),
            TargetField::Sku => self.sku = text(),
            TargetField::ExternalId => self.external_id = text(),
            TargetField::ImageUrl => self.image_url = text(),
            TargetField::GalleryImages => {
                self.gallery_images = value.as_list().map(<[String]>::to_vec).unwrap_or_default()
            }
            TargetField::Category => self.category = text(),
            TargetField::Brand => self.brand = text(),
            TargetField::Manufacturer => self.manufacturer = text(),
            TargetField::StockStatus => self.stock_status = value.as_flag(),
            TargetField::StockQuantity => self.stock_quantity = value.as_integer(),
            TargetField::AffiliateUrl => self.affiliate_url = text(),
            TargetField::ButtonText => self.button_text = text(),
            TargetField::DeliveryTime => self.delivery_time = text(),
        }
    }

    /// Raw value of the column a match key looks at.
    pub fn key_value(&self, field: TargetField) -> Option<&str> {
        match field {
            TargetField::Ean => self.ean.as_deref(),
            TargetField::Sku => self.sku.as_deref(),
            TargetField::ExternalId => self.external_id.as_deref(),
            TargetField::Title => self.title.as_deref(),
            _ => None,
        }
    }
}
