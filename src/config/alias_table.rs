// ==========================================
// Product Feed Import - auto-mapping alias table
// ==========================================
// Pure data: target field -> source field names that usually mean it.
// Stored as JSON under config key `auto_mapping.alias_table`;
// the built-in table below is used when no override is stored.
// Earlier aliases are preferred on ties.
// ==========================================

use crate::domain::target_schema::TargetField;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BUILTIN_ALIASES: &[(TargetField, &[&str])] = &[
    (
        TargetField::Title,
        &["productname", "product_name", "title", "name", "nazov", "nazev", "product"],
    ),
    (
        TargetField::Description,
        &["description", "desc", "popis", "long_description"],
    ),
    (
        TargetField::ShortDescription,
        &["short_description", "shortdesc", "summary", "kratky_popis", "perex"],
    ),
    (
        TargetField::Price,
        &["price_vat", "price", "cena", "cena_s_dph", "price_with_vat", "amount"],
    ),
    (
        TargetField::RegularPrice,
        &["regular_price", "original_price", "old_price", "list_price", "price_before", "msrp", "povodna_cena"],
    ),
    (
        TargetField::SalePrice,
        &["sale_price", "discount_price", "special_price", "akciova_cena", "zlavnena_cena"],
    ),
    (TargetField::Ean, &["ean", "gtin", "barcode", "ean13", "upc"]),
    (
        TargetField::Sku,
        &["sku", "productno", "product_code", "code", "kod", "mpn", "part_number"],
    ),
    (
        TargetField::ExternalId,
        &["item_id", "external_id", "id", "product_id", "itemid"],
    ),
    (
        TargetField::ImageUrl,
        &["imgurl", "image_url", "image", "img", "picture", "obrazok", "foto"],
    ),
    (
        TargetField::GalleryImages,
        &["imgurl_alternative", "gallery", "images", "additional_images", "gallery_images"],
    ),
    (
        TargetField::Category,
        &["categorytext", "category", "kategoria", "kategorie", "category_path"],
    ),
    (TargetField::Brand, &["brand", "znacka", "značka"]),
    (
        TargetField::Manufacturer,
        &["manufacturer", "vyrobca", "vyrobce", "producer"],
    ),
    (
        TargetField::StockStatus,
        &["stock_status", "availability", "in_stock", "dostupnost", "skladom"],
    ),
    (
        TargetField::StockQuantity,
        &["stock_quantity", "quantity", "qty", "stock", "pocet_kusov"],
    ),
    (
        TargetField::AffiliateUrl,
        &["affiliate_url", "url", "link", "product_url", "deeplink"],
    ),
    (TargetField::ButtonText, &["button_text", "cta", "button"]),
    (
        TargetField::DeliveryTime,
        &["delivery_time", "delivery_date", "delivery", "dodanie", "doprava"],
    ),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AliasTable {
    entries: BTreeMap<TargetField, Vec<String>>,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AliasTable {
    pub fn builtin() -> Self {
        let entries = BUILTIN_ALIASES
            .iter()
            .map(|(target, aliases)| {
                (*target, aliases.iter().map(|a| a.to_string()).collect())
            })
            .collect();
        Self { entries }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn aliases(&self, target: TargetField) -> &[String] {
        self.entries.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Targets in registry order with their aliases.
    pub fn iter(&self) -> impl Iterator<Item = (TargetField, &[String])> {
        self.entries.iter().map(|(t, a)| (*t, a.as_slice()))
    }

    /// Adds aliases to a target, keeping existing ones first.
    pub fn extend(&mut self, target: TargetField, aliases: impl IntoIterator<Item = String>) {
        let entry = self.entries.entry(target).or_default();
        for alias in aliases {
            if !entry.contains(&alias) {
                entry.push(alias);
            }
        }
    }
}
