//! Product data model: stubs, records, categories and flattening.

use partscout_core::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A discovered category grouping; immutable once discovered within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name of the category link
    pub name: String,
    /// Absolute navigation target
    pub url: String,
    /// The search term (query or synonym) that matched it
    pub matched_term: String,
}

/// Listing-page stub for a product, carrying what is needed to visit the
/// detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStub {
    /// Absolute URL of the detail view
    pub detail_url: String,
    /// On-page title
    pub title: String,
    /// Raw on-page price text
    pub price_text: String,
    /// Marketplace product id, when the listing exposes one
    pub product_id: Option<String>,
}

/// Non-fatal extraction problem attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    /// The field the warning relates to
    pub field: String,
    /// Human-readable description
    pub message: String,
}

/// A fully extracted product; created once per detail page visited and never
/// mutated afterwards. Uniquely identified by `source_url` within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Marketplace product id, when exposed
    pub product_id: Option<String>,
    /// Product title
    pub title: String,
    /// Kind of part as displayed on the detail page
    pub part_kind: String,
    /// Numeric price in euros; `None` denotes "price on request"
    pub price: Option<f64>,
    /// The raw price display string
    pub price_display: String,
    /// Warranty text, when displayed
    pub warranty: String,
    /// Supplier name
    pub supplier: String,
    /// Product image URL
    pub image_url: String,
    /// Source detail-page URL; unique within a session
    pub source_url: String,
    /// Name of the category the product was found under
    pub category: String,
    /// Listing page number the product appeared on
    pub page: u32,
    /// When the record was extracted
    pub scraped_at: Timestamp,
    /// Open specification map; keys are discovered dynamically per product
    pub specifications: BTreeMap<String, String>,
    /// Non-fatal extraction warnings
    pub warnings: Vec<ExtractionWarning>,
}

impl ProductRecord {
    /// Flatten the record into a single-level map, merging the open
    /// specification map under normalized `spec_`-prefixed keys.
    #[must_use]
    pub fn flatten(&self) -> BTreeMap<String, String> {
        let mut flat = BTreeMap::new();
        if let Some(id) = &self.product_id {
            flat.insert("product_id".to_string(), id.clone());
        }
        flat.insert("title".to_string(), self.title.clone());
        flat.insert("part_kind".to_string(), self.part_kind.clone());
        if let Some(price) = self.price {
            flat.insert("price".to_string(), format!("{price:.2}"));
        }
        flat.insert("price_display".to_string(), self.price_display.clone());
        flat.insert("warranty".to_string(), self.warranty.clone());
        flat.insert("supplier".to_string(), self.supplier.clone());
        flat.insert("image_url".to_string(), self.image_url.clone());
        flat.insert("source_url".to_string(), self.source_url.clone());
        flat.insert("category".to_string(), self.category.clone());
        flat.insert("page".to_string(), self.page.to_string());
        flat.insert("scraped_at".to_string(), self.scraped_at.to_rfc3339());

        flatten_into(flat, &self.specifications)
    }
}

/// Normalize a specification label into a flat map key.
#[must_use]
pub fn normalize_spec_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .replace([' ', '/', '-'], "_")
}

/// Merge a specification map into an already-flat map.
///
/// Specification keys are namespaced with a `spec_` prefix so they cannot
/// collide with the record's fixed fields. The merge is idempotent: an entry
/// that is already present with the same value is left untouched, and a
/// genuinely colliding key (same name, different value) is namespaced further
/// rather than overwritten.
#[must_use]
pub fn flatten_into(
    mut flat: BTreeMap<String, String>,
    specifications: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    for (key, value) in specifications {
        let mut flat_key = format!("spec_{}", normalize_spec_key(key));
        loop {
            match flat.get(&flat_key) {
                None => {
                    flat.insert(flat_key, value.clone());
                    break;
                }
                Some(existing) if existing == value => break,
                Some(_) => flat_key = format!("spec_{flat_key}"),
            }
        }
    }
    flat
}
