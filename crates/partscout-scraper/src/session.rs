//! Session manager: concurrent scrape jobs over a shared registry.
//!
//! Each session owns its own browser and runs in a background task; callers
//! poll snapshots and drain results through the manager. All reads go through
//! point-in-time snapshots so a session mutating mid-read is never observed.

use crate::error::ScrapeError;
use crate::navigator::{Navigator, ProductSink};
use crate::record::ProductRecord;
use async_trait::async_trait;
use partscout_browser::{BrowserEngine, Driver, EngineOptions};
use partscout_core::{AppConfig, LicensePlate, SessionId, Timestamp};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a scrape session.
///
/// `Completed`, `Failed` and `Cancelled` are terminal; a terminal session
/// never changes status again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Accepted, worker not yet running
    Pending,
    /// Worker is scraping
    Running,
    /// Finished normally; an empty result set is still a completion
    Completed,
    /// Unrecoverable failure; see the snapshot's `error`
    Failed,
    /// Stopped at a safe boundary after a cancellation request
    Cancelled,
}

impl SessionStatus {
    /// Whether the status is final.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Failed | SessionStatus::Cancelled
        )
    }
}

/// Point-in-time view of a session, safe to hold while the worker runs on.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Session identifier
    pub id: SessionId,
    /// License plate being scraped, in dashed form
    pub plate: String,
    /// Part query
    pub query: String,
    /// Lifecycle status at snapshot time
    pub status: SessionStatus,
    /// Records extracted so far
    pub product_count: usize,
    /// Category currently being traversed, while running
    pub current_category: Option<String>,
    /// Listing page currently being processed, while running
    pub current_page: Option<u32>,
    /// Failure detail; only set on `Failed`
    pub error: Option<String>,
    /// When the session was created
    pub created_at: Timestamp,
    /// When the session reached a terminal status
    pub completed_at: Option<Timestamp>,
}

struct SessionState {
    status: SessionStatus,
    products: Vec<ProductRecord>,
    current_category: Option<String>,
    current_page: Option<u32>,
    error: Option<String>,
    completed_at: Option<Timestamp>,
}

/// One scrape job: identity, accumulated results and a cancellation token.
pub struct Session {
    id: SessionId,
    plate: LicensePlate,
    query: String,
    created_at: Timestamp,
    state: RwLock<SessionState>,
    cancel: CancellationToken,
}

impl Session {
    fn new(plate: LicensePlate, query: String) -> Arc<Self> {
        let created_at = Timestamp::now();
        Arc::new(Self {
            id: SessionId::compose(&plate, &query, &created_at),
            plate,
            query,
            created_at,
            state: RwLock::new(SessionState {
                status: SessionStatus::Pending,
                products: Vec::new(),
                current_category: None,
                current_page: None,
                error: None,
                completed_at: None,
            }),
            cancel: CancellationToken::new(),
        })
    }

    /// The session's identifier.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Request cooperative cancellation; the worker stops at the next page
    /// or category boundary.
    pub fn request_cancel(&self) {
        tracing::info!("Cancellation requested for session {}", self.id);
        self.cancel.cancel();
    }

    fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Take a point-in-time snapshot.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            id: self.id.clone(),
            plate: self.plate.dashed(),
            query: self.query.clone(),
            status: state.status,
            product_count: state.products.len(),
            current_category: state.current_category.clone(),
            current_page: state.current_page,
            error: state.error.clone(),
            created_at: self.created_at,
            completed_at: state.completed_at,
        }
    }

    /// The records extracted so far. Safe to call while the worker runs;
    /// partial results of a failed or cancelled session are kept.
    pub async fn products(&self) -> Vec<ProductRecord> {
        self.state.read().await.products.clone()
    }

    /// Move to a new status. Terminal states are never left; a transition
    /// attempted on a terminal session is dropped.
    async fn transition(&self, status: SessionStatus) -> bool {
        let mut state = self.state.write().await;
        if state.status.is_terminal() {
            tracing::debug!(
                "Session {} already terminal, dropping transition to {:?}",
                self.id,
                status
            );
            return false;
        }
        tracing::info!("Session {} -> {:?}", self.id, status);
        state.status = status;
        if status.is_terminal() {
            state.completed_at = Some(Timestamp::now());
        }
        true
    }

    async fn fail(&self, message: String) {
        let mut state = self.state.write().await;
        if state.status.is_terminal() {
            return;
        }
        tracing::error!("Session {} failed: {}", self.id, message);
        state.status = SessionStatus::Failed;
        state.error = Some(message);
        state.completed_at = Some(Timestamp::now());
    }
}

#[async_trait]
impl ProductSink for Session {
    async fn record(&self, record: ProductRecord) {
        let mut state = self.state.write().await;
        if state.status.is_terminal() {
            return;
        }
        state.products.push(record);
    }

    async fn page_started(&self, category: &str, page: u32) {
        let mut state = self.state.write().await;
        state.current_category = Some(category.to_string());
        state.current_page = Some(page);
    }
}

/// Produces the browser driver a session worker runs against.
///
/// A seam for tests; production uses [`EngineFactory`], which launches a
/// dedicated browser per session.
#[async_trait]
pub trait DriverFactory: Send + Sync {
    /// Create a fresh driver for one session.
    async fn create(&self) -> partscout_browser::Result<Box<dyn Driver>>;
}

/// Launches a dedicated chromium instance per session.
pub struct EngineFactory {
    options: EngineOptions,
}

impl EngineFactory {
    /// Build a factory from application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            options: EngineOptions {
                headless: config.browser.headless,
                user_agent: config.browser.user_agent.clone(),
                window_width: config.browser.window_width,
                window_height: config.browser.window_height,
            },
        }
    }
}

#[async_trait]
impl DriverFactory for EngineFactory {
    async fn create(&self) -> partscout_browser::Result<Box<dyn Driver>> {
        let engine = BrowserEngine::launch(&self.options).await?;
        Ok(Box::new(engine))
    }
}

/// Registry of scrape sessions with background workers.
pub struct SessionManager {
    config: AppConfig,
    factory: Arc<dyn DriverFactory>,
    registry: Arc<RwLock<HashMap<SessionId, Arc<Session>>>>,
}

impl SessionManager {
    /// Manager that launches a real browser per session.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let factory = Arc::new(EngineFactory::from_config(&config));
        Self::with_factory(config, factory)
    }

    /// Manager with a custom driver factory.
    #[must_use]
    pub fn with_factory(config: AppConfig, factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            config,
            factory,
            registry: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a scrape session, or return the id of an already-active one.
    ///
    /// At most one non-terminal session exists per (plate, query) pair; a
    /// duplicate request joins the running session instead of spawning a
    /// second browser. Terminal sessions do not block a rerun.
    pub async fn start_session(
        &self,
        plate: LicensePlate,
        query: &str,
        category_filter: Option<String>,
    ) -> SessionId {
        let mut registry = self.registry.write().await;

        for session in registry.values() {
            if session.plate == plate && session.query == query {
                let snapshot = session.snapshot().await;
                if !snapshot.status.is_terminal() {
                    tracing::info!(
                        "Joining active session {} for plate {} query '{}'",
                        session.id,
                        plate,
                        query
                    );
                    return session.id.clone();
                }
            }
        }

        let session = Session::new(plate, query.to_string());
        let id = session.id.clone();
        registry.insert(id.clone(), session.clone());
        drop(registry);

        tracing::info!("Starting session {}", id);
        let factory = self.factory.clone();
        let config = self.config.clone();
        tokio::spawn(async move {
            run_session(factory, config, session, category_filter).await;
        });

        id
    }

    /// Snapshot of a session, if it exists.
    pub async fn get_status(&self, id: &SessionId) -> Option<SessionSnapshot> {
        let registry = self.registry.read().await;
        match registry.get(id) {
            Some(session) => Some(session.snapshot().await),
            None => None,
        }
    }

    /// Records extracted so far by a session, if it exists.
    pub async fn get_results(&self, id: &SessionId) -> Option<Vec<ProductRecord>> {
        let registry = self.registry.read().await;
        match registry.get(id) {
            Some(session) => Some(session.products().await),
            None => None,
        }
    }

    /// Snapshots of every known session, most recent first.
    pub async fn list_sessions(&self) -> Vec<SessionSnapshot> {
        let registry = self.registry.read().await;
        let mut snapshots = Vec::with_capacity(registry.len());
        for session in registry.values() {
            snapshots.push(session.snapshot().await);
        }
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    /// Request cancellation of a session. Returns `false` for unknown or
    /// already-terminal sessions.
    pub async fn cancel(&self, id: &SessionId) -> bool {
        let registry = self.registry.read().await;
        let Some(session) = registry.get(id) else {
            return false;
        };
        if session.snapshot().await.status.is_terminal() {
            return false;
        }
        session.request_cancel();
        true
    }

    /// Drop terminal sessions from the registry, returning how many were
    /// removed. Running sessions are untouched.
    pub async fn prune_finished(&self) -> usize {
        let mut registry = self.registry.write().await;
        let mut finished = Vec::new();
        for (id, session) in registry.iter() {
            if session.snapshot().await.status.is_terminal() {
                finished.push(id.clone());
            }
        }
        for id in &finished {
            registry.remove(id);
        }
        finished.len()
    }
}

/// Session worker body. Never panics the process: every outcome, including a
/// failed browser launch, lands in a terminal status on the session.
async fn run_session(
    factory: Arc<dyn DriverFactory>,
    config: AppConfig,
    session: Arc<Session>,
    category_filter: Option<String>,
) {
    let driver = match factory.create().await {
        Ok(driver) => driver,
        Err(e) => {
            session.fail(format!("browser launch failed: {e}")).await;
            return;
        }
    };

    session.transition(SessionStatus::Running).await;

    let mut navigator = Navigator::new(driver, &config);
    let cancel = session.cancel_token().clone();
    let sink: &dyn ProductSink = session.as_ref();
    let result = navigator
        .run(
            &session.plate,
            &session.query,
            category_filter.as_deref(),
            sink,
            &cancel,
        )
        .await;

    match result {
        Ok(total) => {
            tracing::info!("Session {} completed with {} records", session.id, total);
            session.transition(SessionStatus::Completed).await;
        }
        Err(ScrapeError::Cancelled) => {
            session.transition(SessionStatus::Cancelled).await;
        }
        Err(ScrapeError::NoCategoriesFound { query }) => {
            // Expected outcome for a query the site has nothing for;
            // reported as an empty completion, never a failure
            tracing::warn!(
                "Session {} found no categories for query '{}'",
                session.id,
                query
            );
            session.transition(SessionStatus::Completed).await;
        }
        Err(e) => {
            session.fail(e.to_string()).await;
        }
    }
}
