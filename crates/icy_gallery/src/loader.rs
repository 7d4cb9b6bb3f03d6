//! Incremental page loader
//!
//! Fetches run as tokio tasks. Their results come back through a channel that
//! the UI side polls every frame, so the loader state itself is only touched
//! from one thread. Overlapping requests are told apart by request id: after
//! a reset every response still in flight is stale and gets dropped.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::FetchError;
use crate::grid::SentinelProbe;
use crate::record::{GridRecord, Items, RecordKey};

/// Upper bound for a single page request
pub const MAX_PAGE_SIZE: usize = 500;

/// What to list: the scope (folder, collection) and a filter expression.
/// Interpreted by the source only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    pub scope: String,
    pub filter: String,
}

impl PageQuery {
    pub fn new(scope: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            filter: filter.into(),
        }
    }
}

/// Per-request data handed to the source
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: u64,
    pub cancel: CancellationToken,
}

/// One page as returned by the source
#[derive(Debug, Clone)]
pub struct Page<R> {
    pub records: Vec<R>,
    /// Advisory total; never used to stop loading
    pub total: Option<usize>,
    /// Number of records the source says it returned
    pub count: usize,
}

impl<R> Page<R> {
    pub fn new(records: Vec<R>, total: Option<usize>) -> Self {
        let count = records.len();
        Self { records, total, count }
    }
}

/// Paged data source (network client, local index ...)
#[async_trait]
pub trait PageSource<R>: Send + Sync + 'static {
    async fn fetch_page(&self, query: &PageQuery, limit: usize, offset: usize, ctx: RequestContext) -> Result<Page<R>, FetchError>;
}

/// When the loader may fetch without an intervening user scroll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootstrapPolicy {
    /// Keep loading until the first screen is full, then require a scroll per page
    #[default]
    UntilFilled,
    /// Load whenever the sentinel is near
    Always,
    /// Every page after the first needs a scroll
    RequireScroll,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    pub page_size: usize,
    /// Distance in pixels below the viewport at which the next page is requested
    pub lookahead: f32,
    pub bootstrap: BootstrapPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            lookahead: 800.0,
            bootstrap: BootstrapPolicy::UntilFilled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Idle,
    Loading,
    /// A page came back empty; nothing more to load for this query
    Done,
    /// Last fetch failed; waits for [`PageLoader::retry`]
    Failed,
}

/// User-visible state of the panel. "No records" and "error loading" are
/// never the same thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Ready,
    /// All pages loaded
    Exhausted,
    /// Loading finished without a single record
    Empty,
    Error(String),
}

#[derive(Debug)]
pub enum LoaderEvent<R> {
    /// A page was appended. `items` is the new full list; `inserted` may be 0
    /// if the page only contained duplicates, then `items` is the old list.
    Appended { items: Items<R>, inserted: usize },
    Exhausted,
    Failed(FetchError),
}

struct PageResponse<R> {
    request_id: u64,
    result: Result<Page<R>, FetchError>,
}

pub struct PageLoader<R: GridRecord, S: PageSource<R>> {
    source: Arc<S>,
    runtime: tokio::runtime::Handle,
    config: LoaderConfig,
    query: PageQuery,

    items: Items<R>,
    offset: usize,
    total: Option<usize>,
    state: LoaderState,
    last_error: Option<FetchError>,

    request_id: u64,
    session_token: CancellationToken,
    seen_keys: HashSet<RecordKey>,
    seen_ids: HashSet<String>,
    user_scrolled: bool,
    session_fetches: usize,
    total_fetches: usize,

    result_tx: mpsc::UnboundedSender<PageResponse<R>>,
    result_rx: mpsc::UnboundedReceiver<PageResponse<R>>,
    disposed: bool,
}

impl<R: GridRecord, S: PageSource<R>> PageLoader<R, S> {
    pub fn new(source: Arc<S>, runtime: tokio::runtime::Handle, config: LoaderConfig, query: PageQuery) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            source,
            runtime,
            config,
            query,
            items: Arc::new(Vec::new()),
            offset: 0,
            total: None,
            state: LoaderState::Idle,
            last_error: None,
            request_id: 0,
            session_token: CancellationToken::new(),
            seen_keys: HashSet::new(),
            seen_ids: HashSet::new(),
            user_scrolled: false,
            session_fetches: 0,
            total_fetches: 0,
            result_tx,
            result_rx,
            disposed: false,
        }
    }

    pub fn items(&self) -> &Items<R> {
        &self.items
    }

    pub fn query(&self) -> &PageQuery {
        &self.query
    }

    pub fn state(&self) -> LoaderState {
        self.state
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn total(&self) -> Option<usize> {
        self.total
    }

    pub fn is_done(&self) -> bool {
        self.state == LoaderState::Done
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoaderState::Loading
    }

    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    pub fn current_request_id(&self) -> u64 {
        self.request_id
    }

    /// Fetches started since construction
    pub fn fetch_count(&self) -> usize {
        self.total_fetches
    }

    pub fn status(&self) -> LoadStatus {
        match self.state {
            LoaderState::Failed => LoadStatus::Error(self.last_error.as_ref().map(ToString::to_string).unwrap_or_else(|| "unknown error".to_string())),
            LoaderState::Loading => LoadStatus::Loading,
            LoaderState::Done if self.items.is_empty() => LoadStatus::Empty,
            LoaderState::Done => LoadStatus::Exhausted,
            LoaderState::Idle => LoadStatus::Ready,
        }
    }

    /// The user scrolled; the next page may be fetched once the sentinel is near.
    pub fn note_user_scroll(&mut self) {
        self.user_scrolled = true;
    }

    fn page_size(&self) -> usize {
        self.config.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Starts a fetch if the sentinel is close enough and the policy allows it.
    pub fn maybe_load(&mut self, probe: SentinelProbe) -> bool {
        if self.disposed || matches!(self.state, LoaderState::Loading | LoaderState::Done | LoaderState::Failed) {
            return false;
        }
        if probe.distance > self.config.lookahead {
            return false;
        }
        let first_page = self.session_fetches == 0;
        let allowed = first_page
            || self.user_scrolled
            || match self.config.bootstrap {
                BootstrapPolicy::UntilFilled => !probe.viewport_filled,
                BootstrapPolicy::Always => true,
                BootstrapPolicy::RequireScroll => false,
            };
        if !allowed {
            return false;
        }
        self.load_next();
        true
    }

    /// Retries after a failed fetch
    pub fn retry(&mut self) -> bool {
        if self.disposed || self.state != LoaderState::Failed {
            return false;
        }
        self.state = LoaderState::Idle;
        self.load_next();
        true
    }

    fn load_next(&mut self) {
        self.state = LoaderState::Loading;
        self.last_error = None;
        self.user_scrolled = false;
        self.request_id += 1;
        self.session_fetches += 1;
        self.total_fetches += 1;

        let request_id = self.request_id;
        let offset = self.offset;
        let limit = self.page_size();
        let query = self.query.clone();
        let source = self.source.clone();
        let result_tx = self.result_tx.clone();
        let cancel = self.session_token.child_token();
        log::debug!("[PageLoader] request {request_id}: offset {offset}, limit {limit}, scope {:?}", query.scope);

        self.runtime.spawn(async move {
            let ctx = RequestContext {
                request_id,
                cancel: cancel.clone(),
            };
            let result = tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = source.fetch_page(&query, limit, offset, ctx) => result,
            };
            // receiver gone means the loader was dropped
            let _ = result_tx.send(PageResponse { request_id, result });
        });
    }

    /// Applies all responses that arrived so far
    pub fn poll(&mut self) -> Vec<LoaderEvent<R>> {
        let mut events = Vec::new();
        while let Ok(response) = self.result_rx.try_recv() {
            if let Some(event) = self.apply(response) {
                events.push(event);
            }
        }
        events
    }

    /// Waits for the next response that is not stale and applies it.
    /// Only await this while a request is in flight.
    pub async fn recv(&mut self) -> Option<LoaderEvent<R>> {
        while !self.disposed {
            let response = self.result_rx.recv().await?;
            if let Some(event) = self.apply(response) {
                return Some(event);
            }
            if self.state != LoaderState::Loading {
                return None;
            }
        }
        None
    }

    fn apply(&mut self, response: PageResponse<R>) -> Option<LoaderEvent<R>> {
        if self.disposed {
            return None;
        }
        if response.request_id != self.request_id || self.state != LoaderState::Loading {
            log::debug!("[PageLoader] dropping stale response {} (current {})", response.request_id, self.request_id);
            return None;
        }

        match response.result {
            Ok(page) => {
                let returned = page.records.len();
                if page.count != returned {
                    log::debug!("[PageLoader] page reports {} records but carries {returned}", page.count);
                }
                self.offset += returned;
                if page.total.is_some() {
                    self.total = page.total;
                }
                if returned == 0 {
                    self.state = LoaderState::Done;
                    log::debug!("[PageLoader] exhausted at offset {} with {} items", self.offset, self.items.len());
                    return Some(LoaderEvent::Exhausted);
                }

                let fresh: Vec<Arc<R>> = page.records.into_iter().filter(|record| self.remember(record.key())).map(Arc::new).collect();
                self.state = LoaderState::Idle;
                let inserted = fresh.len();
                if inserted > 0 {
                    let mut next = Vec::with_capacity(self.items.len() + inserted);
                    next.extend(self.items.iter().cloned());
                    next.extend(fresh);
                    self.items = Arc::new(next);
                }
                log::debug!("[PageLoader] page {}: {returned} returned, {inserted} new", response.request_id);
                Some(LoaderEvent::Appended {
                    items: self.items.clone(),
                    inserted,
                })
            }
            Err(err) if err.is_benign() => {
                self.state = LoaderState::Idle;
                None
            }
            Err(err) => {
                log::warn!("[PageLoader] fetch at offset {} failed: {err}", self.offset);
                self.state = LoaderState::Failed;
                self.last_error = Some(err.clone());
                Some(LoaderEvent::Failed(err))
            }
        }
    }

    /// Returns false if the key was seen before in this session
    fn remember(&mut self, key: RecordKey) -> bool {
        match key {
            RecordKey::Id(id) => self.seen_ids.insert(id),
            composite => self.seen_keys.insert(composite),
        }
    }

    /// New query or scope. In-flight requests are cancelled and their
    /// responses ignored. Returns the (empty) item list.
    pub fn reset(&mut self, query: PageQuery) -> Items<R> {
        self.session_token.cancel();
        self.session_token = CancellationToken::new();
        // bump so anything still in the channel is stale
        self.request_id += 1;
        self.query = query;
        self.items = Arc::new(Vec::new());
        self.offset = 0;
        self.total = None;
        self.state = LoaderState::Idle;
        self.last_error = None;
        self.seen_keys.clear();
        self.seen_ids.clear();
        self.user_scrolled = false;
        self.session_fetches = 0;
        self.items.clone()
    }

    /// Removes a record from the list. It stays in the seen sets so a later
    /// page can't bring it back.
    pub fn remove(&mut self, key: &RecordKey) -> Option<Items<R>> {
        let before = self.items.len();
        let next: Vec<Arc<R>> = self.items.iter().filter(|record| &record.key() != key).cloned().collect();
        if next.len() == before {
            return None;
        }
        self.items = Arc::new(next);
        Some(self.items.clone())
    }

    /// Cancels everything; late responses are ignored. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.session_token.cancel();
        if self.state == LoaderState::Loading {
            self.state = LoaderState::Idle;
        }
    }
}

/// In-memory source over a fixed record list.
pub struct VecSource<R> {
    records: Vec<R>,
    latency: std::time::Duration,
}

impl<R: Clone + Send + Sync + 'static> VecSource<R> {
    pub fn new(records: Vec<R>) -> Self {
        Self {
            records,
            latency: std::time::Duration::ZERO,
        }
    }

    pub fn with_latency(mut self, latency: std::time::Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl<R: Clone + Send + Sync + 'static> PageSource<R> for VecSource<R> {
    async fn fetch_page(&self, _query: &PageQuery, limit: usize, offset: usize, ctx: RequestContext) -> Result<Page<R>, FetchError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if ctx.cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        let start = offset.min(self.records.len());
        let end = offset.saturating_add(limit).min(self.records.len());
        Ok(Page::new(self.records[start..end].to_vec(), Some(self.records.len())))
    }
}
