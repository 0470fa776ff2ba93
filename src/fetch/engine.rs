//! Cached fetch engine
//!
//! A [`Query`] is one consumer's subscription to a remote value. It derives
//! a cache key from its name and dependencies, serves fresh cache hits
//! immediately, coalesces identical requests through the
//! [`InFlightRegistry`], and publishes results as [`QueryState`] over a
//! `watch` channel.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use super::cancel::CancellationToken;
use super::inflight::{FetchOutcome, InFlightRegistry};
use super::options::FetchOptions;
use super::state::QueryState;
use crate::cache::{CacheStore, Eviction, MemoryKvStore, cache_key};
use crate::error::FetchError;

/// The remote call behind a query
pub type Operation = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, FetchOutcome> + Send + Sync>;

/// Wrap an async closure as an [`Operation`]
pub fn operation<F, Fut>(f: F) -> Operation
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
{
    Arc::new(move |token| f(token).boxed())
}

/// Process-wide services shared by every query
#[derive(Clone)]
pub struct FetchContext {
    pub store: Arc<CacheStore>,
    pub inflight: Arc<InFlightRegistry>,
}

impl FetchContext {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self {
            store,
            inflight: Arc::new(InFlightRegistry::new()),
        }
    }

    /// Context whose persistent tier lives only in memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(CacheStore::new(Arc::new(MemoryKvStore::new()))))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Mount or dependency change: cache first, surfaces `is_loading`
    Initial,
    /// Explicit `refresh()`: skips the cache read, surfaces `is_refreshing`
    Refresh,
    /// Background refetch after a cache hit: skips the cache read, silent
    Revalidate,
}

/// This instance's claim on the most recent attempt
struct Attempt {
    generation: u64,
    token: CancellationToken,
}

/// One consumer's cached, deduplicated view of a remote value.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Query {
    inner: Arc<QueryInner>,
}

struct QueryInner {
    ctx: FetchContext,
    name: String,
    operation: Operation,
    options: FetchOptions,
    dependencies: Mutex<Vec<Value>>,
    state: watch::Sender<QueryState>,
    current: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
    mounted: AtomicBool,
}

impl Query {
    /// Create a query. Nothing is fetched until [`Query::mount`].
    pub fn new(
        ctx: FetchContext,
        name: impl Into<String>,
        dependencies: Vec<Value>,
        operation: Operation,
        options: FetchOptions,
    ) -> Self {
        let (state, _) = watch::channel(QueryState::default());
        Self {
            inner: Arc::new(QueryInner {
                ctx,
                name: name.into(),
                operation,
                options,
                dependencies: Mutex::new(dependencies),
                state,
                current: Mutex::new(None),
                generation: AtomicU64::new(0),
                mounted: AtomicBool::new(true),
            }),
        }
    }

    /// Cache key for the current dependencies
    pub fn key(&self) -> String {
        cache_key(&self.inner.name, &self.dependencies())
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn options(&self) -> &FetchOptions {
        &self.inner.options
    }

    pub fn dependencies(&self) -> Vec<Value> {
        self.inner
            .dependencies
            .lock()
            .map(|deps| deps.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the published state
    pub fn state(&self) -> QueryState {
        self.inner.state.borrow().clone()
    }

    /// Receive every state change from now on
    pub fn subscribe(&self) -> watch::Receiver<QueryState> {
        self.inner.state.subscribe()
    }

    /// Run the initial fetch. Does nothing when the query is disabled.
    pub async fn mount(&self) {
        if !self.inner.options.enabled || !self.is_mounted() {
            return;
        }
        let _ = self.run(Mode::Initial).await;
    }

    /// Replace the dependencies, superseding any attempt still in flight.
    pub async fn set_dependencies(&self, dependencies: Vec<Value>) {
        {
            let Ok(mut deps) = self.inner.dependencies.lock() else {
                return;
            };
            if *deps == dependencies {
                return;
            }
            *deps = dependencies;
        }

        if self.inner.options.enabled && self.is_mounted() {
            let _ = self.run(Mode::Initial).await;
        }
    }

    /// Fetch from the network, bypassing the cache read.
    ///
    /// The result is still written to the cache. Unlike the reactive path,
    /// failures are returned to the caller as well as published.
    pub async fn refresh(&self) -> Result<Value, FetchError> {
        if !self.inner.options.enabled {
            return Err(FetchError::Other("Query is disabled".to_string()));
        }
        if !self.is_mounted() {
            return Err(FetchError::Cancelled);
        }
        self.run(Mode::Refresh).await
    }

    /// Drop this query's cache entry; published data is left alone.
    pub async fn invalidate(&self) {
        let key = self.key();
        self.inner.ctx.store.evict(Eviction::Key(key)).await;
    }

    /// Alias of [`Query::invalidate`]
    pub async fn clear_cache(&self) {
        self.invalidate().await
    }

    /// Stop publishing and give up this instance's in-flight interest.
    pub fn unmount(&self) {
        self.inner.mounted.store(false, Ordering::SeqCst);
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut current) = self.inner.current.lock()
            && let Some(token) = current.take()
        {
            token.cancel();
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::SeqCst)
    }

    async fn run(&self, mode: Mode) -> Result<Value, FetchError> {
        let attempt = self.begin_attempt(mode);
        let key = self.key();
        let options = &self.inner.options;

        if mode == Mode::Initial
            && options.use_cache
            && let Some(entry) = self.inner.ctx.store.get(&key).await
        {
            if !self.is_current(&attempt) {
                return Err(FetchError::Cancelled);
            }
            let data = entry.data.clone();
            self.publish(|s| {
                s.data = Some(entry.data);
                s.is_loading = false;
                s.error = None;
            });

            if options.refetch_on_mount {
                // Claim the next attempt now so a later refresh supersedes it
                let revalidate = self.begin_attempt(Mode::Revalidate);
                let this = self.clone();
                tokio::spawn(async move {
                    let _ = this.fetch_network(Mode::Revalidate, revalidate).await;
                });
            }
            return Ok(data);
        }

        self.fetch_network(mode, attempt).await
    }

    async fn fetch_network(&self, mode: Mode, attempt: Attempt) -> Result<Value, FetchError> {
        if !self.is_current(&attempt) {
            return Err(FetchError::Cancelled);
        }
        match mode {
            Mode::Initial => self.publish(|s| s.is_loading = true),
            Mode::Refresh => self.publish(|s| s.is_refreshing = true),
            Mode::Revalidate => {}
        }

        let key = self.key();
        let ticket = self
            .inner
            .ctx
            .inflight
            .join_or_start(&key, |token| self.request(key.clone(), token));

        let outcome = tokio::select! {
            biased;
            _ = attempt.token.cancelled() => Err(FetchError::Cancelled),
            outcome = ticket.wait() => outcome,
        };
        drop(ticket);

        if !self.is_current(&attempt) {
            log::debug!("Discarding superseded result for {}", key);
            return Err(FetchError::Cancelled);
        }

        match &outcome {
            Ok(data) => self.publish(|s| {
                s.data = Some(data.clone());
                s.error = None;
                s.is_loading = false;
                s.is_refreshing = false;
            }),
            Err(e) if e.is_cancelled() => self.publish(|s| {
                s.is_loading = false;
                s.is_refreshing = false;
            }),
            Err(e) => {
                log::debug!("Fetch failed for {}: {}", key, e);
                let message = e.message();
                self.publish(|s| {
                    s.error = Some(message);
                    s.is_loading = false;
                    s.is_refreshing = false;
                });
            }
        }

        outcome
    }

    /// Build the shared request: operation raced against timeout and
    /// cancellation, cache write on success.
    fn request(&self, key: String, token: CancellationToken) -> BoxFuture<'static, FetchOutcome> {
        let operation = Arc::clone(&self.inner.operation);
        let store = Arc::clone(&self.inner.ctx.store);
        let FetchOptions {
            use_cache,
            cache_duration,
            timeout,
            ..
        } = self.inner.options.clone();

        async move {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => Err(FetchError::Cancelled),
                result = tokio::time::timeout(timeout, operation(token.clone())) => match result {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        log::debug!("Request timed out after {:?}: {}", timeout, key);
                        token.cancel();
                        Err(FetchError::Timeout(timeout))
                    }
                },
            };

            if use_cache && let Ok(data) = &outcome {
                store.set(&key, data.clone(), cache_duration).await;
            }
            outcome
        }
        .boxed()
    }

    /// Supersede the previous attempt of this instance and claim a new one
    fn begin_attempt(&self, mode: Mode) -> Attempt {
        let token = CancellationToken::new();
        let generation = {
            let mut current = self
                .inner
                .current
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        // A superseded refresh never gets to clear its own flag
        if mode != Mode::Refresh {
            self.inner.state.send_if_modified(|s| {
                let was_refreshing = s.is_refreshing;
                s.is_refreshing = false;
                was_refreshing
            });
        }

        Attempt { generation, token }
    }

    fn is_current(&self, attempt: &Attempt) -> bool {
        self.is_mounted() && self.inner.generation.load(Ordering::SeqCst) == attempt.generation
    }

    fn publish(&self, update: impl FnOnce(&mut QueryState)) {
        if self.is_mounted() {
            self.inner.state.send_modify(update);
        }
    }
}
