//! chromiumoxide-backed implementation of the [`Driver`] capability.

use crate::driver::{content_fingerprint, Driver, ElementHandle, WaitCondition};
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Interval between condition polls inside `wait_until`.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launch options for the browser engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Run without a visible window
    pub headless: bool,
    /// User agent presented to the site
    pub user_agent: String,
    /// Viewport width in pixels
    pub window_width: u32,
    /// Viewport height in pixels
    pub window_height: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Browser automation engine.
///
/// Each engine owns its own browser instance and one interactive page;
/// instances are never shared across scrape sessions so that one session's
/// postbacks cannot invalidate another session's DOM references.
pub struct BrowserEngine {
    browser: Browser,
    page: Page,
    elements: Mutex<HashMap<u64, Element>>,
    next_handle: AtomicU64,
}

impl BrowserEngine {
    /// Launch a browser and open the interactive page.
    pub async fn launch(options: &EngineOptions) -> Result<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(options.window_width, options.window_height)
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", options.user_agent));

        if !options.headless {
            builder = builder.with_head();
        }

        let config = builder
            .build()
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        // Drive the CDP event loop for the lifetime of the browser
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

        tracing::debug!("Browser engine launched (headless: {})", options.headless);

        Ok(Self {
            browser,
            page,
            elements: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Register a located element and hand out an opaque token for it.
    async fn register(&self, element: Element) -> ElementHandle {
        let id = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.elements.lock().await.insert(id, element);
        ElementHandle::new(id)
    }

    /// Map a CDP failure to the browser error taxonomy.
    ///
    /// The site re-renders via script-driven postbacks, which detaches
    /// previously located nodes; those failures must surface as stale
    /// references so the resilience layer can retry them.
    fn map_cdp_error(err: &chromiumoxide::error::CdpError) -> BrowserError {
        let msg = err.to_string();
        let lowered = msg.to_lowercase();
        if lowered.contains("node") || lowered.contains("detached") {
            BrowserError::StaleElement(msg)
        } else {
            BrowserError::ChromiumError(msg)
        }
    }

    async fn check_condition(&self, condition: &WaitCondition) -> Result<bool> {
        match condition {
            WaitCondition::SelectorPresent(selector) => {
                Ok(!self.find_elements(selector).await?.is_empty())
            }
            WaitCondition::SelectorAbsent(selector) => {
                Ok(self.find_elements(selector).await?.is_empty())
            }
            WaitCondition::ContentChangedFrom(old) => {
                let html = self.page_content().await?;
                Ok(content_fingerprint(&html) != *old)
            }
        }
    }
}

#[async_trait::async_trait]
impl Driver for BrowserEngine {
    async fn navigate(&self, url: &str) -> Result<()> {
        // A navigation invalidates every previously handed-out handle
        self.elements.lock().await.clear();

        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;

        tracing::debug!("Navigated to {}", url);
        Ok(())
    }

    async fn find_element(&self, selector: &str) -> Result<Option<ElementHandle>> {
        Ok(self.find_elements(selector).await?.into_iter().next())
    }

    async fn find_elements(&self, selector: &str) -> Result<Vec<ElementHandle>> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .unwrap_or_default();

        let mut handles = Vec::with_capacity(found.len());
        for element in found {
            handles.push(self.register(element).await);
        }
        Ok(handles)
    }

    async fn click(&self, element: ElementHandle) -> Result<()> {
        let guard = self.elements.lock().await;
        let el = guard.get(&element.id()).ok_or_else(|| {
            BrowserError::StaleElement(format!("handle {} no longer tracked", element.id()))
        })?;
        el.click().await.map_err(|e| Self::map_cdp_error(&e))?;
        Ok(())
    }

    async fn fill(&self, element: ElementHandle, value: &str) -> Result<()> {
        let guard = self.elements.lock().await;
        let el = guard.get(&element.id()).ok_or_else(|| {
            BrowserError::StaleElement(format!("handle {} no longer tracked", element.id()))
        })?;
        el.click().await.map_err(|e| Self::map_cdp_error(&e))?;
        el.type_str(value)
            .await
            .map_err(|e| Self::map_cdp_error(&e))?;
        Ok(())
    }

    async fn read_text(&self, element: ElementHandle) -> Result<String> {
        let guard = self.elements.lock().await;
        let el = guard.get(&element.id()).ok_or_else(|| {
            BrowserError::StaleElement(format!("handle {} no longer tracked", element.id()))
        })?;
        let text = el
            .inner_text()
            .await
            .map_err(|e| Self::map_cdp_error(&e))?;
        Ok(text.unwrap_or_default())
    }

    async fn read_attribute(
        &self,
        element: ElementHandle,
        name: &str,
    ) -> Result<Option<String>> {
        let guard = self.elements.lock().await;
        let el = guard.get(&element.id()).ok_or_else(|| {
            BrowserError::StaleElement(format!("handle {} no longer tracked", element.id()))
        })?;
        el.attribute(name)
            .await
            .map_err(|e| Self::map_cdp_error(&e))
    }

    async fn wait_until(&self, condition: WaitCondition, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.check_condition(&condition).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "condition not met within {timeout:?}: {condition:?}"
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn page_content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        let html = page
            .content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        if let Err(e) = page.close().await {
            tracing::warn!("Failed to close detail tab for {}: {}", url, e);
        }
        Ok(html)
    }
}
