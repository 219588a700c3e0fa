//! Navigation state machine: plate entry, category discovery and paginated
//! listing traversal.
//!
//! The target site is script-rendered and paginates through postbacks that
//! replace DOM content without a URL change, so every step waits on an
//! explicit render condition instead of assuming navigation settled.

use crate::error::{Result, ScrapeError};
use crate::extract::{parse_detail_page, parse_listing_page};
use crate::matcher::{CategoryMatcher, SynonymMatcher};
use crate::record::{Category, ProductRecord};
use partscout_browser::{
    content_fingerprint, dismiss_cookie_banner, retry_dom, BrowserError, Driver, RetryPolicy,
    WaitCondition,
};
use partscout_core::{AppConfig, LicensePlate, ScraperConfig, SiteConfig};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PLATE_INPUT: &str = "#objlicenseplate";
const SUBMIT_BUTTON: &str = "input[name=\"m$mpc$ctl17\"]";
const PARTS_PANEL: &str = "#parts";
const CATEGORY_LINKS: &str = "div.search-results-list a";
const RESULT_LIST: &str = "#result-list";
const NEXT_BUTTON: &str = "span.pagination input[value=\">\"]:not([disabled])";

/// Where the navigator currently is in a scrape.
///
/// Transitions only move forward within a category; a terminal `Failed` is
/// never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavState {
    /// Nothing done yet
    Init,
    /// Plate submitted, parts panel rendered
    PlateEntered,
    /// Category links matched against the query
    CategoriesDiscovered,
    /// Navigating to a category listing
    CategoryLoading,
    /// A listing page has been parsed
    PageParsed,
    /// Next-page postback fired, waiting for settlement
    Paginating,
    /// Current category exhausted
    CategoryDone,
    /// Every selected category traversed
    AllCategoriesDone,
    /// Unrecoverable navigation failure
    Failed,
}

/// Receiver for extracted records, fed incrementally as pages are visited.
#[async_trait::async_trait]
pub trait ProductSink: Send + Sync {
    /// A detail page was extracted.
    async fn record(&self, record: ProductRecord);

    /// A listing page is about to be processed.
    async fn page_started(&self, category: &str, page: u32);
}

/// Drives a [`Driver`] through the plate-search flow and feeds extracted
/// records to a [`ProductSink`].
pub struct Navigator {
    driver: Box<dyn Driver>,
    scraper: ScraperConfig,
    site: SiteConfig,
    matcher: Box<dyn CategoryMatcher>,
    retry: RetryPolicy,
    state: NavState,
    seen_urls: HashSet<String>,
}

impl Navigator {
    /// Create a navigator over a driver with the default synonym matcher.
    #[must_use]
    pub fn new(driver: Box<dyn Driver>, config: &AppConfig) -> Self {
        Self {
            driver,
            scraper: config.scraper.clone(),
            site: config.site.clone(),
            matcher: Box::new(SynonymMatcher::new()),
            retry: RetryPolicy::new(
                config.scraper.dom_retry_attempts,
                Duration::from_millis(config.scraper.dom_retry_delay_ms),
            ),
            state: NavState::Init,
            seen_urls: HashSet::new(),
        }
    }

    /// Replace the category matching strategy.
    #[must_use]
    pub fn with_matcher(mut self, matcher: Box<dyn CategoryMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// The navigator's current position in the flow.
    #[must_use]
    pub fn state(&self) -> NavState {
        self.state
    }

    fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.scraper.wait_timeout_ms)
    }

    /// Full scrape: plate entry, category discovery, traversal of every
    /// selected category. Returns the number of records extracted.
    pub async fn run(
        &mut self,
        plate: &LicensePlate,
        query: &str,
        category_filter: Option<&str>,
        sink: &dyn ProductSink,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        match self.run_inner(plate, query, category_filter, sink, cancel).await {
            Ok(total) => Ok(total),
            Err(ScrapeError::Cancelled) => Err(ScrapeError::Cancelled),
            Err(e) => {
                self.state = NavState::Failed;
                Err(e)
            }
        }
    }

    async fn run_inner(
        &mut self,
        plate: &LicensePlate,
        query: &str,
        category_filter: Option<&str>,
        sink: &dyn ProductSink,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        self.enter_plate_and_search(plate).await?;
        let categories = filter_categories(self.discover_categories(query).await?, category_filter);
        tracing::info!(
            "Traversing {} categories for query '{}'",
            categories.len(),
            query
        );

        let mut total = 0;
        for category in &categories {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            total += self.traverse_category(category, sink, cancel).await?;
        }

        self.state = NavState::AllCategoriesDone;
        tracing::info!("Scrape complete, {} records extracted", total);
        Ok(total)
    }

    /// Enter the license plate and submit the vehicle search.
    pub async fn enter_plate_and_search(&mut self, plate: &LicensePlate) -> Result<()> {
        let start_url = self.site.start_url();
        tracing::info!("Opening {} for plate {}", start_url, plate);
        self.driver.navigate(&start_url).await?;
        dismiss_cookie_banner(self.driver.as_ref()).await?;

        self.driver
            .wait_until(
                WaitCondition::SelectorPresent(PLATE_INPUT.to_string()),
                self.wait_timeout(),
            )
            .await
            .map_err(|e| nav_error(e, "plate search form did not render"))?;

        let plate_value = plate.dashed();
        let driver = self.driver.as_ref();
        let value = plate_value.as_str();
        retry_dom(&self.retry, || async move {
            let handle = driver
                .find_element(PLATE_INPUT)
                .await?
                .ok_or_else(|| BrowserError::SelectorNotFound(PLATE_INPUT.to_string()))?;
            driver.fill(handle, value).await
        })
        .await?;

        retry_dom(&self.retry, || async move {
            let handle = driver
                .find_element(SUBMIT_BUTTON)
                .await?
                .ok_or_else(|| BrowserError::SelectorNotFound(SUBMIT_BUTTON.to_string()))?;
            driver.click(handle).await
        })
        .await?;

        self.driver
            .wait_until(
                WaitCondition::SelectorPresent(PARTS_PANEL.to_string()),
                self.wait_timeout(),
            )
            .await
            .map_err(|e| {
                nav_error(
                    e,
                    "parts panel did not render after plate submit; vehicle not found or site changed",
                )
            })?;

        self.state = NavState::PlateEntered;
        Ok(())
    }

    /// Match the rendered category links against the part query.
    ///
    /// Order follows on-page display order; duplicate targets are dropped.
    /// The whole read pass sits behind the stale retry: a re-render between
    /// lookup and attribute reads invalidates the handles, and the recovery
    /// is a fresh lookup.
    pub async fn discover_categories(&mut self, query: &str) -> Result<Vec<Category>> {
        let driver = self.driver.as_ref();
        let links = retry_dom(&self.retry, || async move {
            let handles = driver.find_elements(CATEGORY_LINKS).await?;
            let mut links = Vec::with_capacity(handles.len());
            for handle in handles {
                let Some(href) = driver.read_attribute(handle, "href").await? else {
                    continue;
                };
                let text = driver.read_text(handle).await?;
                let title = driver.read_attribute(handle, "title").await?;
                let data_category = driver.read_attribute(handle, "data-category").await?;
                links.push((href, text, title, data_category));
            }
            Ok(links)
        })
        .await?;
        tracing::debug!("Found {} category links on parts panel", links.len());

        let mut seen = HashSet::new();
        let mut categories = Vec::new();

        for (href, text, title, data_category) in links {
            let candidates = [
                Some(text.as_str()),
                title.as_deref(),
                data_category.as_deref(),
            ];
            let matched = candidates
                .into_iter()
                .flatten()
                .find_map(|candidate| self.matcher.match_term(query, candidate));
            let Some(matched_term) = matched else {
                continue;
            };

            let url = self.site.absolute_url(&href);
            if !seen.insert(url.clone()) {
                continue;
            }

            let name = if text.trim().is_empty() {
                title.unwrap_or_else(|| matched_term.clone())
            } else {
                text.trim().to_string()
            };
            tracing::debug!("Category '{}' matched via term '{}'", name, matched_term);
            categories.push(Category {
                name,
                url,
                matched_term,
            });
        }

        if categories.is_empty() {
            return Err(ScrapeError::NoCategoriesFound {
                query: query.to_string(),
            });
        }

        self.state = NavState::CategoriesDiscovered;
        Ok(categories)
    }

    /// Walk one category's listing pages, visiting each unseen product's
    /// detail view. Returns the number of records extracted.
    ///
    /// A page that fails to settle ends the category; records extracted up to
    /// that point are already delivered to the sink and are kept.
    pub async fn traverse_category(
        &mut self,
        category: &Category,
        sink: &dyn ProductSink,
        cancel: &CancellationToken,
    ) -> Result<u32> {
        tracing::info!("Entering category '{}' at {}", category.name, category.url);
        self.state = NavState::CategoryLoading;
        self.driver.navigate(&category.url).await?;

        let mut page_no: u32 = 1;
        let mut records: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            match self
                .driver
                .wait_until(
                    WaitCondition::SelectorPresent(RESULT_LIST.to_string()),
                    self.wait_timeout(),
                )
                .await
            {
                Ok(()) => {}
                Err(BrowserError::Timeout(_)) => {
                    tracing::warn!(
                        "Result list did not render on page {} of '{}', ending category",
                        page_no,
                        category.name
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            sink.page_started(&category.name, page_no).await;
            let html = self.driver.page_content().await?;
            let fingerprint = content_fingerprint(&html);
            let stubs = parse_listing_page(&html, &self.site.base_url);
            self.state = NavState::PageParsed;
            tracing::debug!(
                "Page {} of '{}': {} stubs",
                page_no,
                category.name,
                stubs.len()
            );

            for stub in &stubs {
                if !self.seen_urls.insert(stub.detail_url.clone()) {
                    tracing::debug!("Skipping already-visited {}", stub.detail_url);
                    continue;
                }

                let driver = self.driver.as_ref();
                let url = stub.detail_url.as_str();
                let detail_html =
                    retry_dom(&self.retry, || async move { driver.fetch_page(url).await })
                        .await?;

                let record = parse_detail_page(&detail_html, stub, &category.name, page_no);
                sink.record(record).await;
                records += 1;
            }

            if page_no >= self.scraper.max_pages_per_category {
                tracing::warn!(
                    "Page ceiling of {} reached in '{}', ending category",
                    self.scraper.max_pages_per_category,
                    category.name
                );
                break;
            }

            dismiss_cookie_banner(self.driver.as_ref()).await?;

            // Re-locate the control inside the retry so a stale reference is
            // recovered by a fresh lookup
            let driver = self.driver.as_ref();
            let clicked = retry_dom(&self.retry, || async move {
                match driver.find_element(NEXT_BUTTON).await? {
                    Some(handle) => driver.click(handle).await.map(|()| true),
                    None => Ok(false),
                }
            })
            .await?;
            if !clicked {
                break;
            }

            self.state = NavState::Paginating;
            match self
                .driver
                .wait_until(
                    WaitCondition::ContentChangedFrom(fingerprint),
                    self.wait_timeout(),
                )
                .await
            {
                Ok(()) => {}
                Err(BrowserError::Timeout(_)) => {
                    tracing::warn!(
                        "Pagination did not settle after page {} of '{}', ending category",
                        page_no,
                        category.name
                    );
                    break;
                }
                Err(e) => return Err(e.into()),
            }
            page_no += 1;
        }

        self.state = NavState::CategoryDone;
        tracing::info!(
            "Category '{}' done: {} records over {} pages",
            category.name,
            records,
            page_no
        );
        Ok(records)
    }
}

/// Keep only categories whose display name contains the filter,
/// case-insensitively. No filter keeps everything.
fn filter_categories(categories: Vec<Category>, filter: Option<&str>) -> Vec<Category> {
    let Some(filter) = filter else {
        return categories;
    };
    let filter = filter.to_lowercase();
    categories
        .into_iter()
        .filter(|c| c.name.to_lowercase().contains(&filter))
        .collect()
}

fn nav_error(error: BrowserError, context: &str) -> ScrapeError {
    match error {
        BrowserError::Timeout(detail) => {
            ScrapeError::Navigation(format!("{context}: {detail}"))
        }
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str) -> Category {
        Category {
            name: name.to_string(),
            url: format!("https://example.com/{}", name.to_lowercase()),
            matched_term: name.to_lowercase(),
        }
    }

    #[test]
    fn test_filter_categories_case_insensitive() {
        let categories = vec![category("Accubak"), category("Remschijf")];
        let filtered = filter_categories(categories, Some("accu"));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "Accubak");
    }

    #[test]
    fn test_no_filter_keeps_all() {
        let categories = vec![category("Accubak"), category("Remschijf")];
        assert_eq!(filter_categories(categories, None).len(), 2);
    }

    #[test]
    fn test_timeout_maps_to_navigation_error() {
        let err = nav_error(
            BrowserError::Timeout("20s elapsed".to_string()),
            "parts panel did not render",
        );
        assert!(matches!(err, ScrapeError::Navigation(_)));
        assert!(err.to_string().contains("parts panel"));
    }

    #[test]
    fn test_non_timeout_stays_browser_error() {
        let err = nav_error(
            BrowserError::ChromiumError("ws closed".to_string()),
            "plate search form did not render",
        );
        assert!(matches!(err, ScrapeError::Browser(_)));
    }
}
