//! Extraction pipeline: listing and detail page parsing.
//!
//! Both entry points take raw page HTML so they stay pure and testable
//! against fixtures; the navigation layer is responsible for obtaining the
//! content at the right moment.

use crate::price::{parse_price, ParsedPrice};
use crate::record::{ExtractionWarning, ProductRecord, ProductStub};
use once_cell::sync::Lazy;
use partscout_core::Timestamp;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;

static LISTING_ITEMS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul#result-list > li").expect("valid selector"));
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("span.bold").expect("valid selector"));
static PRICE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.price").expect("valid selector"));
static PART_KIND: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.description p").expect("valid selector"));
static PRICING_NOTE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.pricing p").expect("valid selector"));
static SUPPLIER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.pricing .block").expect("valid selector"));
static IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img.img-responsive").expect("valid selector"));
static SPEC_ITEMS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.description p span.item").expect("valid selector"));
static SPEC_KEY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.grey").expect("valid selector"));
static SPEC_VALUE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.grey + span").expect("valid selector"));

/// The site renders listing rows as clickable blocks; the detail URL lives in
/// an inline `onclick` handler rather than an anchor.
static ONCLICK_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"window\.location\.href='([^']+)'").expect("valid regex"));

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn select_text(element: &ElementRef<'_>, selector: &Selector) -> Option<String> {
    element.select(selector).next().map(|el| element_text(&el))
}

fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    }
}

/// Parse a listing page into product stubs, in on-page display order.
///
/// Rows without a resolvable detail URL are skipped: without it a product
/// cannot be visited nor deduplicated.
#[must_use]
pub fn parse_listing_page(html: &str, base_url: &str) -> Vec<ProductStub> {
    let document = Html::parse_document(html);
    let mut stubs = Vec::new();

    for item in document.select(&LISTING_ITEMS) {
        let Some(onclick) = item.value().attr("onclick") else {
            continue;
        };
        let Some(captures) = ONCLICK_URL.captures(onclick) else {
            continue;
        };
        let detail_url = absolutize(base_url, &captures[1]);

        let product_id = item
            .value()
            .attr("data-gtm-id")
            .map(|id| id.trim_start_matches('P').to_string());

        stubs.push(ProductStub {
            detail_url,
            title: select_text(&item, &TITLE).unwrap_or_default(),
            price_text: select_text(&item, &PRICE).unwrap_or_default(),
            product_id,
        });
    }

    tracing::debug!("Parsed {} product stubs from listing page", stubs.len());
    stubs
}

/// Parse a product detail view into a flattened record.
///
/// Specification discovery scans the description item containers for
/// adjacent label/value pairs; whatever pairs are found are preserved
/// verbatim in the open map, so site-added fields survive automatically.
/// Unparseable prices become a record-level warning, never an abort.
#[must_use]
pub fn parse_detail_page(
    html: &str,
    stub: &ProductStub,
    category: &str,
    page: u32,
) -> ProductRecord {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut warnings = Vec::new();

    let title = select_text(&root, &TITLE).unwrap_or_else(|| stub.title.clone());
    let part_kind = select_text(&root, &PART_KIND).unwrap_or_default();

    let price_display = select_text(&root, &PRICE).unwrap_or_else(|| stub.price_text.clone());
    let price = match parse_price(&price_display) {
        ParsedPrice::Amount(value) => Some(value),
        ParsedPrice::OnRequest => None,
        ParsedPrice::Unparsed => {
            warnings.push(ExtractionWarning {
                field: "price".to_string(),
                message: format!("unparseable price text: '{price_display}'"),
            });
            None
        }
    };

    let warranty = root
        .select(&PRICING_NOTE)
        .map(|el| element_text(&el))
        .find(|text| text.contains("Garantie"))
        .map(|text| text.replace("Garantie:", "").replace("Garantie", "").trim().to_string())
        .unwrap_or_default();

    let supplier = select_text(&root, &SUPPLIER).unwrap_or_default();
    if supplier.is_empty() {
        warnings.push(ExtractionWarning {
            field: "supplier".to_string(),
            message: "no supplier block found on detail page".to_string(),
        });
    }

    let image_url = document
        .select(&IMAGE)
        .next()
        .and_then(|el| el.value().attr("src"))
        .unwrap_or_default()
        .to_string();

    ProductRecord {
        product_id: stub.product_id.clone(),
        title,
        part_kind,
        price,
        price_display,
        warranty,
        supplier,
        image_url,
        source_url: stub.detail_url.clone(),
        category: category.to_string(),
        page,
        scraped_at: Timestamp::now(),
        specifications: parse_specifications(&root),
        warnings,
    }
}

/// Scan the description item containers for label/value specification pairs.
///
/// The set of labels is not known ahead of time and varies per product; any
/// pair found is included as-is.
fn parse_specifications(root: &ElementRef<'_>) -> BTreeMap<String, String> {
    let mut specifications = BTreeMap::new();

    for container in root.select(&SPEC_ITEMS) {
        let Some(key) = select_text(&container, &SPEC_KEY) else {
            continue;
        };

        // Prefer the adjacent sibling span; fall back to the container text
        // with the label stripped off
        let value = select_text(&container, &SPEC_VALUE).unwrap_or_else(|| {
            element_text(&container)
                .replacen(&key, "", 1)
                .trim()
                .to_string()
        });

        if !key.is_empty() && !value.is_empty() {
            specifications.insert(key, value);
        }
    }

    specifications
}
