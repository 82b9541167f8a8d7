//! Stub registry and dispatch.
//!
//! The registry keeps active stubs in registration order. Registration order
//! is priority order: when several stubs accept a request, the one
//! registered first wins.
//!
//! Dispatch walks the stubs under a read lock. For each stub it first checks
//! the `stub-only-if` preconditions against the state store, then method,
//! path and query. The winner's `stub-set` variables are written to the
//! store before its response is built. Requests no stub accepts get a bare
//! 501.
//!
//! Two dispatches running at the same time may interleave their state reads
//! and writes. If request 1 wins a stub that sets `x` while request 2 is
//! checking a stub gated on `x`, whether request 2 sees the new value depends
//! on timing. Per key, the last writer wins.

use crate::config::GlobalSettings;
use crate::matcher::{self, IncomingRequest};
use crate::response::{ResponseBuilder, StubResponse};
use crate::state::{InMemoryStateStore, StateStore};
use crate::stub::{StubDefinition, StubKey};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Request counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub requests_total: u64,
    pub requests_matched: u64,
    pub requests_unmatched: u64,
}

/// Ordered collection of active stubs plus the state they share.
pub struct StubRegistry {
    stubs: RwLock<Vec<Arc<StubDefinition>>>,
    state: Arc<dyn StateStore>,
    responses: ResponseBuilder,
    log_matches: bool,
    log_unmatched: bool,
    requests_total: AtomicU64,
    requests_matched: AtomicU64,
    requests_unmatched: AtomicU64,
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StubRegistry {
    /// Create an empty registry with an in-memory state store and no default
    /// body delay.
    pub fn new() -> Self {
        Self {
            stubs: RwLock::new(Vec::new()),
            state: Arc::new(InMemoryStateStore::new()),
            responses: ResponseBuilder::default(),
            log_matches: true,
            log_unmatched: true,
            requests_total: AtomicU64::new(0),
            requests_matched: AtomicU64::new(0),
            requests_unmatched: AtomicU64::new(0),
        }
    }

    /// Create an empty registry configured from global settings.
    pub fn from_settings(settings: &GlobalSettings) -> Self {
        let mut registry = Self::new().with_default_delay(settings.default_delay());
        registry.log_matches = settings.log_matches;
        registry.log_unmatched = settings.log_unmatched;
        registry
    }

    /// Use `state` instead of a private in-memory store.
    pub fn with_state_store(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = state;
        self
    }

    /// Delay applied to stubs that do not declare `stub-delay`.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.responses = ResponseBuilder::new(delay);
        self
    }

    /// Append a stub. It takes part in dispatch after all earlier stubs.
    pub fn register(&self, stub: StubDefinition) {
        debug!(stub = %stub.key(), "Registering stub");
        self.stubs.write().push(Arc::new(stub));
    }

    /// Remove the first stub with the same method and path pattern as
    /// `stub`. Returns false (and does nothing) if there is none.
    pub fn remove(&self, stub: &StubDefinition) -> bool {
        self.remove_key(&stub.key())
    }

    /// Remove the first stub registered under `key`.
    pub fn remove_key(&self, key: &StubKey) -> bool {
        let mut stubs = self.stubs.write();
        match stubs.iter().position(|stub| stub.has_key(key)) {
            Some(index) => {
                stubs.remove(index);
                debug!(stub = %key, "Removed stub");
                true
            }
            None => {
                debug!(stub = %key, "Stub not registered, nothing to remove");
                false
            }
        }
    }

    /// Remove every stub. The state store is left untouched.
    pub fn clear(&self) {
        self.stubs.write().clear();
    }

    /// Snapshot of the active stubs in priority order.
    pub fn stubs(&self) -> Vec<Arc<StubDefinition>> {
        self.stubs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.stubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.read().is_empty()
    }

    /// The shared state store.
    pub fn state(&self) -> &Arc<dyn StateStore> {
        &self.state
    }

    /// Clear all state variables.
    pub fn reset_state(&self) {
        self.state.reset();
    }

    pub fn default_delay(&self) -> Duration {
        self.responses.default_delay()
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_matched: self.requests_matched.load(Ordering::Relaxed),
            requests_unmatched: self.requests_unmatched.load(Ordering::Relaxed),
        }
    }

    /// Find the first stub whose preconditions hold and which accepts
    /// `request`. Has no side effects.
    pub fn find_match(&self, request: &IncomingRequest) -> Option<Arc<StubDefinition>> {
        let stubs = self.stubs.read();
        stubs
            .iter()
            .find(|stub| {
                self.state.satisfies(stub.pre_conditions()) && matcher::matches(stub, request)
            })
            .cloned()
    }

    /// Pick the winning stub for `request`, apply its `stub-set` variables
    /// and build its response. Returns a bare 501 if no stub wins.
    pub fn dispatch(&self, request: &IncomingRequest) -> StubResponse {
        self.requests_total.fetch_add(1, Ordering::Relaxed);

        let Some(stub) = self.find_match(request) else {
            self.requests_unmatched.fetch_add(1, Ordering::Relaxed);
            if self.log_unmatched {
                info!(
                    method = %request.method,
                    path = %request.path,
                    "No matching stub found"
                );
            }
            return StubResponse::not_implemented();
        };

        self.requests_matched.fetch_add(1, Ordering::Relaxed);
        self.state.apply(stub.post_conditions());

        if self.log_matches {
            info!(
                stub = %stub.key(),
                method = %request.method,
                path = %request.path,
                "Request matched stub"
            );
        }
        if !stub.post_conditions().is_empty() {
            debug!(variables = ?stub.post_conditions(), "Updated stub state");
        }

        self.responses.build(&stub)
    }
}
