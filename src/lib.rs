//! ghostline — inline-completion suggestion cache and request coordination.
//!
//! Sits between an editor integration (above) and model-backend clients
//! (below). On each debounced keystroke the host queries the history
//! matcher first, then the request coordinator for a reusable in-flight
//! request, and only then dispatches a new generation through the prompt
//! strategy picked for the target model. The speculative bridge is an
//! optional parallel fast path whose previews are validated against the
//! authoritative model in the background.
//!
//! One [`EngineContext`] per editing session. All mutation flows through
//! the session's own callback chain; the internal locks only make that
//! single logical caller safe across await points, not a free-for-all.

pub mod backend;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod history;
pub mod matcher;
pub mod model;
pub mod prompt;
pub mod speculative;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use config::EngineConfig;
use coordinator::{PendingRequest, RequestCoordinator};
use history::{Suggestion, SuggestionHistory};
use matcher::{MatchEngine, MatchResult};
use speculative::SpeculativeBridge;

/// Result of the cheap lookup tier: a history match, a pending request the
/// caller can piggyback on, or nothing.
#[derive(Debug)]
pub enum LookupOutcome {
    Match(MatchResult),
    Pending(PendingRequest),
    Miss,
}

/// Hit/miss counters for the lookup tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    #[serde(rename = "historyHits")]
    pub history_hits: u64,
    #[serde(rename = "historyMisses")]
    pub history_misses: u64,
    #[serde(rename = "reusedRequests")]
    pub reused_requests: u64,
}

/// Per-session engine state: suggestion history, matcher, request
/// coordinator, and the optional speculative bridge.
///
/// Cheaply cloneable — all clones share the same state via `Arc`.
#[derive(Clone)]
pub struct EngineContext {
    pub config: Arc<EngineConfig>,
    matcher: Arc<MatchEngine>,
    history: Arc<Mutex<SuggestionHistory>>,
    coordinator: Arc<Mutex<RequestCoordinator>>,
    speculative: Option<Arc<SpeculativeBridge>>,
    stats: Arc<Mutex<EngineStats>>,
}

impl EngineContext {
    pub fn new(config: EngineConfig) -> Self {
        let history = SuggestionHistory::new(config.matcher.max_history);
        let matcher = MatchEngine::new(config.matcher.clone());
        Self {
            config: Arc::new(config),
            matcher: Arc::new(matcher),
            history: Arc::new(Mutex::new(history)),
            coordinator: Arc::new(Mutex::new(RequestCoordinator::new())),
            speculative: None,
            stats: Arc::new(Mutex::new(EngineStats::default())),
        }
    }

    /// Attach a speculative bridge (built separately — it owns backends).
    pub fn with_speculative(mut self, bridge: Arc<SpeculativeBridge>) -> Self {
        self.speculative = Some(bridge);
        self
    }

    pub fn speculative(&self) -> Option<&Arc<SpeculativeBridge>> {
        self.speculative.as_ref()
    }

    /// The cheap tier of the per-keystroke control flow: history match
    /// first, then a reusable pending request. Never dispatches anything.
    pub async fn lookup(&self, prefix: &str, suffix: &str) -> LookupOutcome {
        {
            let history = self.history.lock().await;
            if let Some(result) = self.matcher.find_best_match(prefix, suffix, &history) {
                self.stats.lock().await.history_hits += 1;
                return LookupOutcome::Match(result);
            }
        }
        self.stats.lock().await.history_misses += 1;

        if let Some(pending) = self.coordinator.lock().await.find_reusable(prefix, suffix) {
            self.stats.lock().await.reused_requests += 1;
            debug!("reusing in-flight request");
            return LookupOutcome::Pending(pending);
        }

        LookupOutcome::Miss
    }

    /// Record a produced (or accepted) completion into the history.
    pub async fn record_suggestion(&self, prefix: &str, suffix: &str, text: &str) {
        self.history
            .lock()
            .await
            .push(Suggestion::new(prefix, suffix, text));
    }

    /// Shared access to the request coordinator for dispatch bookkeeping.
    pub fn coordinator(&self) -> &Arc<Mutex<RequestCoordinator>> {
        &self.coordinator
    }

    pub async fn stats(&self) -> EngineStats {
        *self.stats.lock().await
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
