// SPDX-License-Identifier: MIT
// In-flight request tracking and reuse.
//
// One `PendingRequest` per `(prefix, suffix)` composite key. As the user
// types forward, an already-dispatched request for a shorter prefix can
// serve the longer query; requests whose context has truly diverged are
// cancelled cooperatively.
//
// Asymmetry, kept on purpose: `find_reusable` only reuses forward
// extensions of a stored prefix, while `cancel_obsolete` spares prefix
// relations in *both* directions — a backward-deletion query may still be
// answered by a request this method declines to cancel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::model::UsageInfo;

/// Cooperative cancellation flag.
///
/// Cancelling never aborts network I/O — it only marks the request so that a
/// late result is discarded. Callers must check `is_cancelled` before
/// applying any result that still arrives.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Final result of one generation request, shared between the dispatching
/// caller and any caller that reused the request.
#[derive(Debug)]
pub struct CompletionOutcome {
    pub text: String,
    pub usage: UsageInfo,
}

pub type SharedOutcome = Arc<anyhow::Result<CompletionOutcome>>;

/// One in-flight generation request.
///
/// The result slot is a `watch` channel: the dispatcher publishes exactly
/// once via [`ResultPublisher`]; every clone of the request can await it.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub prefix: String,
    pub suffix: String,
    cancel: CancelToken,
    result: watch::Receiver<Option<SharedOutcome>>,
}

/// Write side of a [`PendingRequest`]'s result slot.
pub struct ResultPublisher {
    tx: watch::Sender<Option<SharedOutcome>>,
}

impl ResultPublisher {
    /// Publish the outcome, waking every waiter. Consumes the publisher —
    /// a request resolves at most once.
    pub fn publish(self, outcome: anyhow::Result<CompletionOutcome>) {
        let _ = self.tx.send(Some(Arc::new(outcome)));
    }
}

impl PendingRequest {
    /// Create a request plus the publisher its dispatcher resolves it with.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> (Self, ResultPublisher) {
        let (tx, rx) = watch::channel(None);
        (
            Self {
                prefix: prefix.into(),
                suffix: suffix.into(),
                cancel: CancelToken::new(),
                result: rx,
            },
            ResultPublisher { tx },
        )
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Await the published outcome.
    ///
    /// Returns `None` if the publisher was dropped without publishing
    /// (dispatch abandoned).
    pub async fn wait(&self) -> Option<SharedOutcome> {
        let mut rx = self.result.clone();
        loop {
            if let Some(outcome) = rx.borrow().clone() {
                return Some(outcome);
            }
            if rx.changed().await.is_err() {
                // Sender dropped — surface whatever was last written.
                return rx.borrow().clone();
            }
        }
    }
}

/// Tracks at most one pending request per `(prefix, suffix)` key.
///
/// Lookups are pure, synchronous map operations. Thread-safety: wrap in
/// `Mutex<RequestCoordinator>` for shared use.
#[derive(Default)]
pub struct RequestCoordinator {
    pending: HashMap<(String, String), PendingRequest>,
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a request this query can piggyback on.
    ///
    /// Exact composite-key hit first; otherwise the first pending request
    /// whose suffix equals the query's and whose stored prefix is a prefix
    /// of the queried one (forward extension only).
    pub fn find_reusable(&self, prefix: &str, suffix: &str) -> Option<PendingRequest> {
        if let Some(req) = self
            .pending
            .get(&(prefix.to_string(), suffix.to_string()))
        {
            return Some(req.clone());
        }
        self.pending
            .values()
            .find(|req| req.suffix == suffix && prefix.starts_with(req.prefix.as_str()))
            .map(|req| {
                debug!(
                    stored_prefix_len = req.prefix.len(),
                    query_prefix_len = prefix.len(),
                    "reusing pending request for extended prefix"
                );
                req.clone()
            })
    }

    /// Track a dispatched request, replacing any previous one for the key.
    pub fn insert(&mut self, request: PendingRequest) {
        self.pending
            .insert((request.prefix.clone(), request.suffix.clone()), request);
    }

    /// Stop tracking the request for this key (completion or cancellation).
    pub fn remove(&mut self, prefix: &str, suffix: &str) -> Option<PendingRequest> {
        self.pending
            .remove(&(prefix.to_string(), suffix.to_string()))
    }

    /// Cancel and drop every request whose context has diverged from the
    /// query: differing suffix, or prefixes where neither side is a prefix
    /// of the other. Prefix-compatible requests in either direction are
    /// left running.
    pub fn cancel_obsolete(&mut self, prefix: &str, suffix: &str) {
        let before = self.pending.len();
        self.pending.retain(|(stored_prefix, stored_suffix), req| {
            let compatible = stored_suffix == suffix
                && (prefix.starts_with(stored_prefix.as_str())
                    || stored_prefix.starts_with(prefix));
            if !compatible {
                req.cancel_token().cancel();
            }
            compatible
        });
        let cancelled = before - self.pending.len();
        if cancelled > 0 {
            debug!(cancelled, remaining = self.pending.len(), "cancelled obsolete requests");
        }
    }

    /// Cancel and drop everything.
    pub fn clear(&mut self) {
        for req in self.pending.values() {
            req.cancel_token().cancel();
        }
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(prefix: &str, suffix: &str) -> (PendingRequest, ResultPublisher) {
        PendingRequest::new(prefix, suffix)
    }

    #[test]
    fn exact_key_lookup() {
        let mut coordinator = RequestCoordinator::new();
        let (req, _publisher) = pending("let x", ";");
        coordinator.insert(req);

        assert!(coordinator.find_reusable("let x", ";").is_some());
        assert!(coordinator.find_reusable("let x", "}").is_none());
    }

    #[test]
    fn forward_extension_is_reusable() {
        let mut coordinator = RequestCoordinator::new();
        let (req, _publisher) = pending("let x", ";");
        coordinator.insert(req);

        // The user typed ahead; the shorter stored request still serves.
        let reused = coordinator.find_reusable("let x = 4", ";").unwrap();
        assert_eq!(reused.prefix, "let x");
    }

    #[test]
    fn backward_extension_is_not_reused() {
        let mut coordinator = RequestCoordinator::new();
        let (req, _publisher) = pending("let x = 4", ";");
        coordinator.insert(req);

        assert!(coordinator.find_reusable("let x", ";").is_none());
    }

    #[test]
    fn cancel_obsolete_spares_prefix_relations_both_ways() {
        let mut coordinator = RequestCoordinator::new();
        let (diverged, _p1) = pending("xyz", ";");
        let (shorter, _p2) = pending("abc", ";");
        let (longer, _p3) = pending("abcdef", ";");
        let (wrong_suffix, _p4) = pending("abcd", "}");
        let diverged_token = diverged.cancel_token();
        let shorter_token = shorter.cancel_token();
        let longer_token = longer.cancel_token();
        let wrong_suffix_token = wrong_suffix.cancel_token();
        coordinator.insert(diverged);
        coordinator.insert(shorter);
        coordinator.insert(longer);
        coordinator.insert(wrong_suffix);

        coordinator.cancel_obsolete("abcd", ";");

        assert!(diverged_token.is_cancelled());
        assert!(wrong_suffix_token.is_cancelled());
        assert!(!shorter_token.is_cancelled());
        assert!(!longer_token.is_cancelled());
        assert_eq!(coordinator.len(), 2);
    }

    #[test]
    fn clear_cancels_everything() {
        let mut coordinator = RequestCoordinator::new();
        let (a, _pa) = pending("a", "");
        let (b, _pb) = pending("b", "");
        let token_a = a.cancel_token();
        let token_b = b.cancel_token();
        coordinator.insert(a);
        coordinator.insert(b);

        coordinator.clear();

        assert!(coordinator.is_empty());
        assert!(token_a.is_cancelled());
        assert!(token_b.is_cancelled());
    }

    #[tokio::test]
    async fn published_outcome_reaches_reusers() {
        let mut coordinator = RequestCoordinator::new();
        let (req, publisher) = pending("let x", ";");
        coordinator.insert(req);

        let reused = coordinator.find_reusable("let x = 1", ";").unwrap();
        publisher.publish(Ok(CompletionOutcome {
            text: "42;".to_string(),
            usage: UsageInfo::default(),
        }));

        let outcome = reused.wait().await.unwrap();
        let outcome = outcome.as_ref().as_ref().unwrap();
        assert_eq!(outcome.text, "42;");
    }

    #[tokio::test]
    async fn dropped_publisher_yields_none() {
        let (req, publisher) = pending("p", "s");
        drop(publisher);
        assert!(req.wait().await.is_none());
    }
}
