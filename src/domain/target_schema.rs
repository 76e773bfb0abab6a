// ==========================================
// Product Feed Import - target schema registry
// ==========================================
// Fixed, versioned list of catalog fields a feed can be mapped onto.
// Shared by the mapping editor (key/label/group/required) and by
// the mapping engine (value kind, required validation).
// ==========================================

use crate::domain::types::UnknownVariant;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version of the target field list below. Bump when fields change.
pub const TARGET_SCHEMA_VERSION: u32 = 1;

/// Catalog field a source field can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetField {
    Title,
    Description,
    ShortDescription,
    Price,
    RegularPrice,
    SalePrice,
    Ean,
    Sku,
    ExternalId,
    ImageUrl,
    GalleryImages,
    Category,
    Brand,
    Manufacturer,
    StockStatus,
    StockQuantity,
    AffiliateUrl,
    ButtonText,
    DeliveryTime,
}

/// Typed shape a target field's value is coerced into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Price,
    Integer,
    List,
    Flag,
}

/// Registry entry, as shown to the mapping editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetFieldSpec {
    pub key: TargetField,
    pub label: &'static str,
    pub group: &'static str,
    pub required: bool,
    pub kind: ValueKind,
}

const fn spec(
    key: TargetField,
    label: &'static str,
    group: &'static str,
    required: bool,
    kind: ValueKind,
) -> TargetFieldSpec {
    TargetFieldSpec {
        key,
        label,
        group,
        required,
        kind,
    }
}

/// Registry in display order.
pub static TARGET_FIELDS: [TargetFieldSpec; 19] = [
    spec(TargetField::Title, "Product Name", "basic", true, ValueKind::Text),
    spec(TargetField::Description, "Description", "basic", false, ValueKind::Text),
    spec(TargetField::ShortDescription, "Short Description", "basic", false, ValueKind::Text),
    spec(TargetField::Price, "Price", "pricing", true, ValueKind::Price),
    spec(TargetField::RegularPrice, "Regular Price", "pricing", false, ValueKind::Price),
    spec(TargetField::SalePrice, "Sale Price", "pricing", false, ValueKind::Price),
    spec(TargetField::Ean, "EAN / GTIN", "identifiers", false, ValueKind::Text),
    spec(TargetField::Sku, "SKU", "identifiers", false, ValueKind::Text),
    spec(TargetField::ExternalId, "External ID", "identifiers", false, ValueKind::Text),
    spec(TargetField::ImageUrl, "Main Image URL", "media", false, ValueKind::Text),
    spec(TargetField::GalleryImages, "Gallery Images", "media", false, ValueKind::List),
    spec(TargetField::Category, "Category Path", "taxonomy", false, ValueKind::Text),
    spec(TargetField::Brand, "Brand", "attributes", false, ValueKind::Text),
    spec(TargetField::Manufacturer, "Manufacturer", "attributes", false, ValueKind::Text),
    spec(TargetField::StockStatus, "Stock Status", "inventory", false, ValueKind::Flag),
    spec(TargetField::StockQuantity, "Stock Quantity", "inventory", false, ValueKind::Integer),
    spec(TargetField::AffiliateUrl, "Affiliate URL", "affiliate", false, ValueKind::Text),
    spec(TargetField::ButtonText, "Button Text", "affiliate", false, ValueKind::Text),
    spec(TargetField::DeliveryTime, "Delivery Time", "other", false, ValueKind::Text),
];

impl TargetField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetField::Title => "title",
            TargetField::Description => "description",
            TargetField::ShortDescription => "short_description",
            TargetField::Price => "price",
            TargetField::RegularPrice => "regular_price",
            TargetField::SalePrice => "sale_price",
            TargetField::Ean => "ean",
            TargetField::Sku => "sku",
            TargetField::ExternalId => "external_id",
            TargetField::ImageUrl => "image_url",
            TargetField::GalleryImages => "gallery_images",
            TargetField::Category => "category",
            TargetField::Brand => "brand",
            TargetField::Manufacturer => "manufacturer",
            TargetField::StockStatus => "stock_status",
            TargetField::StockQuantity => "stock_quantity",
            TargetField::AffiliateUrl => "affiliate_url",
            TargetField::ButtonText => "button_text",
            TargetField::DeliveryTime => "delivery_time",
        }
    }

    pub fn spec(&self) -> &'static TargetFieldSpec {
        // TARGET_FIELDS lists every variant exactly once, in declaration order
        &TARGET_FIELDS[*self as usize]
    }

    pub fn is_required(&self) -> bool {
        self.spec().required
    }

    pub fn kind(&self) -> ValueKind {
        self.spec().kind
    }

    pub fn all() -> impl Iterator<Item = TargetField> {
        TARGET_FIELDS.iter().map(|s| s.key)
    }

    pub fn required_fields() -> impl Iterator<Item = TargetField> {
        TARGET_FIELDS.iter().filter(|s| s.required).map(|s| s.key)
    }
}

impl FromStr for TargetField {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        TargetField::all()
            .find(|f| f.as_str() == key)
            .ok_or_else(|| UnknownVariant {
                kind: "target field",
                value: key.to_string(),
            })
    }
}

impl fmt::Display for TargetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_enum_order() {
        for (idx, spec) in TARGET_FIELDS.iter().enumerate() {
            assert_eq!(spec.key as usize, idx, "{} out of order", spec.key);
            assert_eq!(spec.key.as_str().parse::<TargetField>().unwrap(), spec.key);
        }
    }

    #[test]
    fn test_required_fields() {
        let required: Vec<_> = TargetField::required_fields().collect();
        assert_eq!(required, vec![TargetField::Title, TargetField::Price]);
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(TargetField::SalePrice.kind(), ValueKind::Price);
        assert_eq!(TargetField::StockQuantity.kind(), ValueKind::Integer);
        assert_eq!(TargetField::GalleryImages.kind(), ValueKind::List);
        assert_eq!(TargetField::Brand.kind(), ValueKind::Text);
    }
}
