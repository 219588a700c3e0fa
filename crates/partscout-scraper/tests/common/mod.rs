//! Scripted in-memory site and driver for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use partscout_browser::{
    content_fingerprint, BrowserError, Driver, ElementHandle, Result as BrowserResult,
    WaitCondition,
};
use partscout_scraper::{DriverFactory, ProductRecord, ProductSink};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

pub const BASE_URL: &str = "https://www.onderdelenlijn.nl";

const PLATE_INPUT_HANDLE: u64 = 1;
const SUBMIT_HANDLE: u64 = 2;
const NEXT_HANDLE: u64 = 3;
const CATEGORY_HANDLE_BASE: u64 = 10;

/// A category link as rendered on the parts panel.
#[derive(Debug, Clone)]
pub struct MockCategory {
    pub text: String,
    pub href: String,
    pub title: Option<String>,
    pub data_category: Option<String>,
}

/// Static description of the scripted site.
#[derive(Debug, Default)]
struct MockSite {
    plate_found: bool,
    categories: Vec<MockCategory>,
    /// category href -> listing page HTML, in pagination order
    listing_pages: HashMap<String, Vec<String>>,
    /// absolute detail URL -> detail page HTML
    detail_pages: HashMap<String, String>,
    /// detail URLs whose first fetch fails with a stale reference
    stale_once: HashSet<String>,
    /// first read of a category link fails with a stale reference
    stale_discovery_once: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Form,
    Parts,
    Listing,
}

#[derive(Debug, Default)]
struct MockState {
    phase: Phase,
    filled_plate: Option<String>,
    current_category: Option<String>,
    page_index: usize,
    stale_consumed: HashSet<String>,
    discovery_stale_consumed: bool,
    navigations: Vec<String>,
}

/// Driver over the scripted site. Cloning shares all state, so a factory can
/// hand out "new" drivers that tests still observe.
#[derive(Clone)]
pub struct MockDriver {
    site: Arc<MockSite>,
    state: Arc<Mutex<MockState>>,
    fetch_counter: Arc<AtomicU32>,
    pagination_gate: Option<Arc<Notify>>,
    cancel_after_fetches: Option<(u32, CancellationToken)>,
}

pub struct MockDriverBuilder {
    site: MockSite,
    pagination_gate: Option<Arc<Notify>>,
    cancel_after_fetches: Option<(u32, CancellationToken)>,
}

impl MockDriverBuilder {
    pub fn new() -> Self {
        Self {
            site: MockSite {
                plate_found: true,
                ..MockSite::default()
            },
            pagination_gate: None,
            cancel_after_fetches: None,
        }
    }

    /// The plate form submits but no parts panel ever renders.
    pub fn vehicle_not_found(mut self) -> Self {
        self.site.plate_found = false;
        self
    }

    pub fn category(mut self, text: &str, href: &str) -> Self {
        self.site.categories.push(MockCategory {
            text: text.to_string(),
            href: href.to_string(),
            title: None,
            data_category: None,
        });
        self
    }

    pub fn listing(mut self, href: &str, pages: Vec<String>) -> Self {
        self.site.listing_pages.insert(href.to_string(), pages);
        self
    }

    pub fn detail(mut self, url: &str, html: &str) -> Self {
        self.site
            .detail_pages
            .insert(url.to_string(), html.to_string());
        self
    }

    /// The first fetch of this detail URL fails with a stale reference.
    pub fn stale_once(mut self, url: &str) -> Self {
        self.site.stale_once.insert(url.to_string());
        self
    }

    /// The first attribute read on a category link fails with a stale
    /// reference, as if the parts panel re-rendered after the lookup.
    pub fn stale_discovery_once(mut self) -> Self {
        self.site.stale_discovery_once = true;
        self
    }

    /// Block pagination settlement until the notify fires.
    pub fn pagination_gate(mut self, gate: Arc<Notify>) -> Self {
        self.pagination_gate = Some(gate);
        self
    }

    /// Cancel the token once this many detail fetches have started.
    pub fn cancel_after_fetches(mut self, count: u32, token: CancellationToken) -> Self {
        self.cancel_after_fetches = Some((count, token));
        self
    }

    pub fn build(self) -> MockDriver {
        MockDriver {
            site: Arc::new(self.site),
            state: Arc::new(Mutex::new(MockState::default())),
            fetch_counter: Arc::new(AtomicU32::new(0)),
            pagination_gate: self.pagination_gate,
            cancel_after_fetches: self.cancel_after_fetches,
        }
    }
}

impl MockDriver {
    pub fn fetch_count(&self) -> u32 {
        self.fetch_counter.load(Ordering::SeqCst)
    }

    pub fn filled_plate(&self) -> Option<String> {
        self.state.lock().unwrap().filled_plate.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().navigations.clone()
    }

    fn category_by_url(&self, url: &str) -> Option<&MockCategory> {
        self.site
            .categories
            .iter()
            .find(|c| format!("{BASE_URL}{}", c.href) == url)
    }

    fn current_listing_html(&self) -> Option<String> {
        let state = self.state.lock().unwrap();
        let href = state.current_category.as_ref()?;
        let pages = self.site.listing_pages.get(href)?;
        pages.get(state.page_index).cloned()
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        let category_href = self.category_by_url(url).map(|c| c.href.clone());
        let mut state = self.state.lock().unwrap();
        state.navigations.push(url.to_string());
        match category_href {
            Some(href) => {
                state.phase = Phase::Listing;
                state.current_category = Some(href);
                state.page_index = 0;
            }
            None => {
                state.phase = Phase::Form;
            }
        }
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> BrowserResult<Option<ElementHandle>> {
        let state = self.state.lock().unwrap();
        if selector == "#objlicenseplate" {
            return Ok(Some(ElementHandle::new(PLATE_INPUT_HANDLE)));
        }
        if selector.contains("ctl17") {
            return Ok(Some(ElementHandle::new(SUBMIT_HANDLE)));
        }
        if selector.starts_with("span.pagination") {
            if state.phase == Phase::Listing {
                if let Some(href) = &state.current_category {
                    let pages = self.site.listing_pages.get(href).map_or(0, Vec::len);
                    if state.page_index + 1 < pages {
                        return Ok(Some(ElementHandle::new(NEXT_HANDLE)));
                    }
                }
            }
            return Ok(None);
        }
        Ok(None)
    }

    async fn find_elements(&self, selector: &str) -> BrowserResult<Vec<ElementHandle>> {
        let state = self.state.lock().unwrap();
        if selector == "div.search-results-list a" && state.phase == Phase::Parts {
            return Ok((0..self.site.categories.len())
                .map(|i| ElementHandle::new(CATEGORY_HANDLE_BASE + i as u64))
                .collect());
        }
        Ok(Vec::new())
    }

    async fn click(&self, element: ElementHandle) -> BrowserResult<()> {
        let mut state = self.state.lock().unwrap();
        match element.id() {
            SUBMIT_HANDLE => {
                if self.site.plate_found {
                    state.phase = Phase::Parts;
                }
                Ok(())
            }
            NEXT_HANDLE => {
                state.page_index += 1;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn fill(&self, element: ElementHandle, value: &str) -> BrowserResult<()> {
        if element.id() == PLATE_INPUT_HANDLE {
            self.state.lock().unwrap().filled_plate = Some(value.to_string());
        }
        Ok(())
    }

    async fn read_text(&self, element: ElementHandle) -> BrowserResult<String> {
        let Some(index) = element.id().checked_sub(CATEGORY_HANDLE_BASE) else {
            return Ok(String::new());
        };
        Ok(self
            .site
            .categories
            .get(index as usize)
            .map(|c| c.text.clone())
            .unwrap_or_default())
    }

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> BrowserResult<Option<String>> {
        let Some(index) = element.id().checked_sub(CATEGORY_HANDLE_BASE) else {
            return Ok(None);
        };
        {
            let mut state = self.state.lock().unwrap();
            if self.site.stale_discovery_once && !state.discovery_stale_consumed {
                state.discovery_stale_consumed = true;
                return Err(BrowserError::StaleElement(
                    "category link detached after re-render".to_string(),
                ));
            }
        }
        let Some(category) = self.site.categories.get(index as usize) else {
            return Ok(None);
        };
        Ok(match name {
            "href" => Some(category.href.clone()),
            "title" => category.title.clone(),
            "data-category" => category.data_category.clone(),
            _ => None,
        })
    }

    async fn wait_until(
        &self,
        condition: WaitCondition,
        _timeout: Duration,
    ) -> BrowserResult<()> {
        match condition {
            WaitCondition::SelectorPresent(selector) => {
                let phase = self.state.lock().unwrap().phase;
                let ok = match selector.as_str() {
                    "#objlicenseplate" => true,
                    "#parts" => phase == Phase::Parts,
                    "#result-list" => {
                        phase == Phase::Listing && self.current_listing_html().is_some()
                    }
                    _ => true,
                };
                if ok {
                    Ok(())
                } else {
                    Err(BrowserError::Timeout(format!("waiting for {selector}")))
                }
            }
            WaitCondition::SelectorAbsent(_) => Ok(()),
            WaitCondition::ContentChangedFrom(fingerprint) => {
                if let Some(gate) = &self.pagination_gate {
                    gate.notified().await;
                }
                let html = self.current_listing_html().unwrap_or_default();
                if content_fingerprint(&html) == fingerprint {
                    Err(BrowserError::Timeout("content did not change".to_string()))
                } else {
                    Ok(())
                }
            }
        }
    }

    async fn page_content(&self) -> BrowserResult<String> {
        Ok(self
            .current_listing_html()
            .unwrap_or_else(|| "<html><body>form</body></html>".to_string()))
    }

    async fn fetch_page(&self, url: &str) -> BrowserResult<String> {
        let count = self.fetch_counter.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after_fetches {
            if count >= *limit {
                token.cancel();
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            if self.site.stale_once.contains(url) && !state.stale_consumed.contains(url) {
                state.stale_consumed.insert(url.to_string());
                return Err(BrowserError::StaleElement(format!(
                    "node detached while fetching {url}"
                )));
            }
        }

        self.site
            .detail_pages
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::NavigationError(format!("no page scripted for {url}")))
    }
}

/// Factory handing out clones of one shared mock driver.
pub struct MockFactory {
    driver: MockDriver,
    created: Arc<AtomicU32>,
}

impl MockFactory {
    pub fn new(driver: MockDriver) -> Self {
        Self {
            driver,
            created: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    async fn create(&self) -> BrowserResult<Box<dyn Driver>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(self.driver.clone()))
    }
}

/// Factory whose browser never launches.
pub struct FailingFactory;

#[async_trait]
impl DriverFactory for FailingFactory {
    async fn create(&self) -> BrowserResult<Box<dyn Driver>> {
        Err(BrowserError::ChromiumError(
            "chromium binary not found".to_string(),
        ))
    }
}

/// Sink that accumulates everything it is fed.
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<ProductRecord>>,
    pages: Mutex<Vec<(String, u32)>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<ProductRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn pages(&self) -> Vec<(String, u32)> {
        self.pages.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProductSink for CollectingSink {
    async fn record(&self, record: ProductRecord) {
        self.records.lock().unwrap().push(record);
    }

    async fn page_started(&self, category: &str, page: u32) {
        self.pages
            .lock()
            .unwrap()
            .push((category.to_string(), page));
    }
}

/// Listing page HTML for `(product_id, title, price)` rows.
pub fn listing_html(items: &[(&str, &str, &str)]) -> String {
    let rows: String = items
        .iter()
        .map(|(id, title, price)| {
            format!(
                "<li data-gtm-id=\"P{id}\" \
                 onclick=\"window.location.href='/onderdeel/{id}/'\">\
                 <span class=\"bold\">{title}</span>\
                 <span class=\"price\">{price}</span></li>"
            )
        })
        .collect();
    format!("<ul id=\"result-list\">{rows}</ul>")
}

/// Detail page HTML with a fixed supplier and one specification.
pub fn detail_html(title: &str, price: &str) -> String {
    format!(
        "<div><span class=\"bold\">{title}</span>\
         <div class=\"description\"><p>Onderdeel</p>\
         <p><span class=\"item\"><span class=\"grey\">Bouwjaar</span><span>2014</span></span></p>\
         </div>\
         <div class=\"pricing\"><span class=\"price\">{price}</span>\
         <p>Garantie: 3 maanden</p>\
         <div class=\"block\">Demontage Test BV</div></div></div>"
    )
}

/// Absolute detail URL for a scripted product id.
pub fn detail_url(id: &str) -> String {
    format!("{BASE_URL}/onderdeel/{id}/")
}
