//! Process-wide single-flight registry
//!
//! At most one request per cache key is in flight. Later callers attach to
//! the same shared future. The request is spawned on the runtime, so it
//! settles even when nobody is awaiting it, and it removes itself from the
//! registry as soon as it does.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::cancel::CancellationToken;
use crate::error::FetchError;

/// Outcome every subscriber of a request receives
pub type FetchOutcome = Result<Value, FetchError>;

type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

struct PendingRequest {
    id: u64,
    future: SharedFetch,
    token: CancellationToken,
    subscribers: usize,
}

/// Registry of requests currently in flight, keyed by cache key
#[derive(Default)]
pub struct InFlightRegistry {
    pending: Mutex<HashMap<String, PendingRequest>>,
    next_id: AtomicU64,
}

/// One subscriber's interest in an in-flight request.
///
/// Dropping the ticket releases the interest. When the last ticket for a
/// still-running request goes away, the request is aborted.
pub struct Ticket {
    registry: Arc<InFlightRegistry>,
    key: String,
    id: u64,
    future: SharedFetch,
}

impl Ticket {
    /// Wait for the shared outcome
    pub async fn wait(&self) -> FetchOutcome {
        self.future.clone().await
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.id);
    }
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach to the request pending for `key`, or start one with `start`.
    ///
    /// `start` receives the request's cancellation token. Must be called
    /// from within a tokio runtime.
    pub fn join_or_start<F>(self: &Arc<Self>, key: &str, start: F) -> Ticket
    where
        F: FnOnce(CancellationToken) -> BoxFuture<'static, FetchOutcome>,
    {
        let mut pending = self.lock();

        if let Some(request) = pending.get_mut(key) {
            request.subscribers += 1;
            log::debug!(
                "Joining in-flight request: {} ({} subscribers)",
                key,
                request.subscribers
            );
            return Ticket {
                registry: Arc::clone(self),
                key: key.to_string(),
                id: request.id,
                future: request.future.clone(),
            };
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let request = start(token.clone());

        let registry = Arc::clone(self);
        let owned_key = key.to_string();
        let future = async move {
            let outcome = request.await;
            registry.finish(&owned_key, id);
            outcome
        }
        .boxed()
        .shared();

        pending.insert(
            key.to_string(),
            PendingRequest {
                id,
                future: future.clone(),
                token,
                subscribers: 1,
            },
        );
        drop(pending);

        log::debug!("Starting request: {}", key);
        tokio::spawn(future.clone());

        Ticket {
            registry: Arc::clone(self),
            key: key.to_string(),
            id,
            future,
        }
    }

    #[cfg(test)]
    pub(crate) fn is_pending(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove a settled request, unless a newer one already replaced it
    fn finish(&self, key: &str, id: u64) {
        let mut pending = self.lock();
        if pending.get(key).is_some_and(|r| r.id == id) {
            pending.remove(key);
        }
    }

    /// Drop one subscriber; abort and unregister the request if none remain
    fn release(&self, key: &str, id: u64) {
        let mut pending = self.lock();
        let Some(request) = pending.get_mut(key).filter(|r| r.id == id) else {
            return;
        };

        request.subscribers = request.subscribers.saturating_sub(1);
        if request.subscribers == 0 {
            log::debug!("Aborting request with no subscribers left: {}", key);
            request.token.cancel();
            pending.remove(key);
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PendingRequest>> {
        // The map stays consistent even if a holder panicked
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
