// SPDX-License-Identifier: MIT
// Speculative completion bridge.
//
// A fast/local model produces an instant low-confidence preview; the
// authoritative model validates or refines it in the background. The
// validation queue is a single consumer — strictly FIFO, one authoritative
// call in flight at a time — so speculation never multiplies provider cost.
//
// State machine per suggestion, enforced by the consumer:
//
// ```text
// Pending ──► Validated | Rejected | Refined    (terminal)
// ```
//
// A refinement can land after the user's cursor has moved on. Every cache
// update is keyed by the suggestion id; callers compare that id against the
// live cursor context and discard stale refinements.

pub mod heuristics;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::backend::ModelBackend;
use crate::config::{PromptConfig, SpeculativeConfig};
use crate::context::ContextRetriever;
use crate::model::CursorContext;
use crate::prompt::{fim, Strategy};

/// Which model produced a suggestion's current text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Fast,
    Main,
}

/// Lifecycle status of a speculative suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Shown to the user, authoritative verdict outstanding.
    Pending,
    /// The authoritative model produced the same completion.
    Validated,
    /// The authoritative model produced nothing usable.
    Rejected,
    /// The authoritative model produced a different completion.
    Refined,
}

/// A fast-model preview and its validation state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeculativeSuggestion {
    pub id: Uuid,
    pub prefix: String,
    pub suffix: String,
    pub completion: String,
    /// Heuristic confidence in `[0, 1]`.
    pub confidence: f64,
    /// Fast-model wall-clock latency.
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
    pub source: SuggestionSource,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "validationStatus")]
    pub validation_status: ValidationStatus,
    /// Authoritative replacement text, present iff status is `Refined`.
    #[serde(rename = "refinedCompletion", skip_serializing_if = "Option::is_none")]
    pub refined_completion: Option<String>,
}

/// Counters reported by [`SpeculativeBridge::stats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeculativeStats {
    /// Entries currently cached.
    pub cached: usize,
    pub pending: usize,
    pub validated: usize,
    pub rejected: usize,
    pub refined: usize,
    /// Suggestions produced since construction (or the last `clear`).
    pub generated: u64,
    /// Fast-model failures swallowed by the fail-open path.
    #[serde(rename = "fastFailures")]
    pub fast_failures: u64,
    /// Authoritative-model failures swallowed during validation.
    #[serde(rename = "validationErrors")]
    pub validation_errors: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

// ─── Bounded cache ────────────────────────────────────────────────────────────

/// Insertion-ordered bounded map. Not an LRU: lookups do not refresh an
/// entry's position; the oldest *insertion* is evicted on overflow.
struct SpecCache {
    capacity: usize,
    map: HashMap<String, SpeculativeSuggestion>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl SpecCache {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn insert(&mut self, key: String, suggestion: SpeculativeSuggestion) {
        if self.map.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
                self.evictions += 1;
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, suggestion);
    }

    fn get(&mut self, key: &str) -> Option<&SpeculativeSuggestion> {
        if self.map.contains_key(key) {
            self.hits += 1;
            self.map.get(key)
        } else {
            self.misses += 1;
            None
        }
    }

    /// Lookup that does not touch the hit/miss counters (validator use).
    fn peek(&self, key: &str) -> Option<&SpeculativeSuggestion> {
        self.map.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut SpeculativeSuggestion> {
        self.map.get_mut(key)
    }

    fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Cache key: SHA-256 over the full prefix and suffix. Exact-key lookups
/// only — tolerant matching belongs to the history matcher.
fn cache_key(prefix: &str, suffix: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(b"\0");
    hasher.update(suffix.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ─── Validation queue plumbing ───────────────────────────────────────────────

struct ValidationTicket {
    id: Uuid,
    key: String,
    ctx: CursorContext,
}

#[derive(Default)]
struct Counters {
    generated: u64,
    fast_failures: u64,
    validation_errors: u64,
}

// ─── Bridge ───────────────────────────────────────────────────────────────────

/// Fast-model preview generation plus background authoritative validation.
///
/// Must be constructed inside a Tokio runtime — the validation consumer is
/// spawned at construction and exits when the bridge is dropped (its queue
/// sender closes).
pub struct SpeculativeBridge {
    config: SpeculativeConfig,
    prompt_config: PromptConfig,
    fast: Arc<dyn ModelBackend>,
    cache: Arc<Mutex<SpecCache>>,
    counters: Arc<Mutex<Counters>>,
    queue_tx: UnboundedSender<ValidationTicket>,
}

impl SpeculativeBridge {
    pub fn new(
        fast: Arc<dyn ModelBackend>,
        main: Arc<dyn ModelBackend>,
        retriever: Arc<dyn ContextRetriever>,
        config: SpeculativeConfig,
        prompt_config: PromptConfig,
    ) -> Self {
        let cache = Arc::new(Mutex::new(SpecCache::new(config.max_cache_size)));
        let counters = Arc::new(Mutex::new(Counters::default()));
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_validator(
            main,
            retriever,
            prompt_config.clone(),
            Arc::clone(&cache),
            Arc::clone(&counters),
            queue_rx,
        ));

        Self {
            config,
            prompt_config,
            fast,
            cache,
            counters,
            queue_tx,
        }
    }

    /// Produce an instant preview for the current cursor position.
    ///
    /// Fail-open: any fast-model error or empty completion yields `None`
    /// and the caller falls through to the authoritative path. A returned
    /// suggestion is already cached and queued for validation.
    pub async fn generate_speculative_completion(
        &self,
        prefix: &str,
        suffix: &str,
        ctx: &CursorContext,
    ) -> Option<SpeculativeSuggestion> {
        let descriptor = self.fast.descriptor();
        let bundle = fim::build_bundle(prefix, suffix, &descriptor.name, &self.prompt_config);

        let started = Instant::now();
        let (tx, rx) = mpsc::unbounded_channel();
        let call = self
            .fast
            .generate_fill_in_middle(&bundle.formatted_prefix, &bundle.formatted_suffix, tx);
        let (result, raw) = tokio::join!(call, collect_text(rx));

        if let Err(err) = result {
            self.counters.lock().await.fast_failures += 1;
            warn!(model = %descriptor.name, error = %err, "fast model failed, skipping speculation");
            return None;
        }

        let completion = Strategy::Fim.parse_response(&raw, prefix, suffix).text;
        if completion.trim().is_empty() {
            debug!(model = %descriptor.name, "fast model produced empty completion");
            return None;
        }

        let latency_ms = started.elapsed().as_millis() as u64;
        let confidence =
            heuristics::score_completion(&completion, prefix, &ctx.language_id, &self.config);
        let suggestion = SpeculativeSuggestion {
            id: Uuid::new_v4(),
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            completion,
            confidence,
            latency_ms,
            source: SuggestionSource::Fast,
            timestamp: Utc::now(),
            validation_status: ValidationStatus::Pending,
            refined_completion: None,
        };

        let key = cache_key(prefix, suffix);
        self.cache.lock().await.insert(key.clone(), suggestion.clone());
        self.counters.lock().await.generated += 1;

        let ticket = ValidationTicket {
            id: suggestion.id,
            key,
            ctx: ctx.clone(),
        };
        if self.queue_tx.send(ticket).is_err() {
            debug!("validation consumer gone, suggestion stays pending");
        }

        debug!(
            latency_ms,
            confidence,
            "speculative completion generated"
        );
        Some(suggestion)
    }

    /// Exact-key cache lookup. No tolerant matching here.
    pub async fn get_cached_suggestion(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> Option<SpeculativeSuggestion> {
        self.cache
            .lock()
            .await
            .get(&cache_key(prefix, suffix))
            .cloned()
    }

    pub async fn stats(&self) -> SpeculativeStats {
        let cache = self.cache.lock().await;
        let counters = self.counters.lock().await;

        let mut stats = SpeculativeStats {
            cached: cache.len(),
            generated: counters.generated,
            fast_failures: counters.fast_failures,
            validation_errors: counters.validation_errors,
            hits: cache.hits,
            misses: cache.misses,
            evictions: cache.evictions,
            ..Default::default()
        };
        for suggestion in cache.map.values() {
            match suggestion.validation_status {
                ValidationStatus::Pending => stats.pending += 1,
                ValidationStatus::Validated => stats.validated += 1,
                ValidationStatus::Rejected => stats.rejected += 1,
                ValidationStatus::Refined => stats.refined += 1,
            }
        }
        stats
    }

    /// Drop every cached suggestion and reset counters.
    ///
    /// Queued validations are logically dropped: their cache entries are
    /// gone, so the consumer skips them. An authoritative call already in
    /// flight runs to completion and its result is discarded.
    pub async fn clear(&self) {
        self.cache.lock().await.clear();
        *self.counters.lock().await = Counters::default();
    }
}

/// Drain a chunk stream into a single string.
async fn collect_text(mut rx: UnboundedReceiver<String>) -> String {
    let mut text = String::new();
    while let Some(chunk) = rx.recv().await {
        text.push_str(&chunk);
    }
    text
}

/// Single-consumer validation loop: strictly FIFO, one authoritative call
/// in flight at a time. Exits when the bridge drops its queue sender.
async fn run_validator(
    main: Arc<dyn ModelBackend>,
    retriever: Arc<dyn ContextRetriever>,
    prompt_config: PromptConfig,
    cache: Arc<Mutex<SpecCache>>,
    counters: Arc<Mutex<Counters>>,
    mut queue_rx: UnboundedReceiver<ValidationTicket>,
) {
    while let Some(ticket) = queue_rx.recv().await {
        // Snapshot outside the authoritative call; skip entries that were
        // evicted, replaced by a newer suggestion, or already resolved.
        let snapshot = {
            let cache = cache.lock().await;
            cache.peek(&ticket.key).and_then(|s| {
                (s.id == ticket.id && s.validation_status == ValidationStatus::Pending)
                    .then(|| (s.prefix.clone(), s.suffix.clone(), s.completion.clone()))
            })
        };
        let Some((prefix, suffix, fast_completion)) = snapshot else {
            continue;
        };

        let descriptor = main.descriptor();
        let strategy = Strategy::for_model(&descriptor);
        let bundle =
            strategy.build_prompts(&ticket.ctx, retriever.as_ref(), &descriptor.name, &prompt_config);

        let (tx, rx) = mpsc::unbounded_channel();
        let call = strategy.generate(main.as_ref(), &bundle, tx);
        let (result, raw) = tokio::join!(call, collect_text(rx));

        if let Err(err) = result {
            counters.lock().await.validation_errors += 1;
            warn!(
                suggestion_id = %ticket.id,
                error = %err,
                "validation call failed, suggestion stays pending"
            );
            continue;
        }

        let text = strategy.parse_response(&raw, &prefix, &suffix).text;
        let (status, refined) = if text.trim().is_empty() {
            (ValidationStatus::Rejected, None)
        } else if text.trim() == fast_completion.trim() {
            (ValidationStatus::Validated, None)
        } else {
            (ValidationStatus::Refined, Some(text))
        };

        let mut cache = cache.lock().await;
        if let Some(entry) = cache.get_mut(&ticket.key) {
            // Pending is the only state a verdict may overwrite.
            if entry.id == ticket.id && entry.validation_status == ValidationStatus::Pending {
                debug!(suggestion_id = %ticket.id, status = ?status, "validation verdict");
                entry.validation_status = status;
                entry.refined_completion = refined;
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(text: &str) -> SpeculativeSuggestion {
        SpeculativeSuggestion {
            id: Uuid::new_v4(),
            prefix: "p".into(),
            suffix: "s".into(),
            completion: text.into(),
            confidence: 0.5,
            latency_ms: 1,
            source: SuggestionSource::Fast,
            timestamp: Utc::now(),
            validation_status: ValidationStatus::Pending,
            refined_completion: None,
        }
    }

    #[test]
    fn cache_evicts_oldest_insertion_first() {
        let mut cache = SpecCache::new(2);
        cache.insert("k1".into(), suggestion("a"));
        cache.insert("k2".into(), suggestion("b"));
        // Reading k1 must not save it from eviction — insertion order, not LRU.
        assert!(cache.get("k1").is_some());
        cache.insert("k3".into(), suggestion("c"));

        assert!(cache.peek("k1").is_none());
        assert!(cache.peek("k2").is_some());
        assert!(cache.peek("k3").is_some());
        assert_eq!(cache.evictions, 1);
    }

    #[test]
    fn cache_reinsert_refreshes_position() {
        let mut cache = SpecCache::new(2);
        cache.insert("k1".into(), suggestion("a"));
        cache.insert("k2".into(), suggestion("b"));
        cache.insert("k1".into(), suggestion("a2"));
        cache.insert("k3".into(), suggestion("c"));

        // k2 was the oldest insertion after k1 was refreshed.
        assert!(cache.peek("k2").is_none());
        assert_eq!(cache.peek("k1").unwrap().completion, "a2");
    }

    #[test]
    fn cache_counts_hits_and_misses() {
        let mut cache = SpecCache::new(4);
        assert!(cache.get("absent").is_none());
        cache.insert("k".into(), suggestion("a"));
        assert!(cache.get("k").is_some());
        assert_eq!(cache.hits, 1);
        assert_eq!(cache.misses, 1);
    }

    #[test]
    fn cache_key_is_exact() {
        assert_eq!(cache_key("a", "b"), cache_key("a", "b"));
        assert_ne!(cache_key("a", "b"), cache_key("a", "c"));
        // The separator keeps (ab, c) distinct from (a, bc).
        assert_ne!(cache_key("ab", "c"), cache_key("a", "bc"));
    }
}
