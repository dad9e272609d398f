// SPDX-License-Identifier: MIT
// Tolerant similarity search over the suggestion history.
//
// `MatchEngine::find_best_match` answers a completion request from recent
// history without contacting a model. Every enabled strategy is evaluated
// per entry; the highest-confidence candidate across all entries wins, and a
// result is only returned when it clears the configured minimum score.

pub mod similarity;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MatcherConfig;
use crate::history::{Suggestion, SuggestionHistory};
use similarity::{levenshtein, similarity};

/// How a history entry matched the queried cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Prefix and suffix are identical to the stored entry.
    Exact,
    /// The user typed ahead into the stored completion.
    PartialTyping,
    /// The user deleted characters the stored entry still covers.
    BackwardDeletion,
    /// Prefixes differ by a small edit distance.
    Fuzzy,
    /// The trailing lines of both prefixes are near-identical.
    MultiLine,
    /// Surrounding context is similar enough to reuse the completion.
    ContextSimilar,
}

/// Optional per-strategy diagnostics attached to a [`MatchResult`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    /// Edit distance between the prefixes (fuzzy matches).
    #[serde(rename = "editDistance", skip_serializing_if = "Option::is_none")]
    pub edit_distance: Option<usize>,
    /// Normalized similarity score that produced the match.
    #[serde(rename = "similarityScore", skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    /// Number of trailing prefix lines compared (multi-line matches).
    #[serde(rename = "linesMatched", skip_serializing_if = "Option::is_none")]
    pub lines_matched: Option<usize>,
}

/// A history hit: the text to show and how much to trust it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    /// Completion text to surface at the current cursor.
    pub text: String,
    #[serde(rename = "matchType")]
    pub match_type: MatchKind,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MatchMetadata>,
}

/// Pure, synchronous similarity search over a [`SuggestionHistory`].
pub struct MatchEngine {
    config: MatcherConfig,
}

impl MatchEngine {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    /// Find the best-scoring history match for the queried cursor position.
    ///
    /// Scans from most recent to oldest, keeping the maximum-confidence
    /// candidate. Scanning stops early only on a perfect (`1.0`) match. A
    /// miss is `None`, never an error, and no result below
    /// `min_similarity_score` is ever returned.
    pub fn find_best_match(
        &self,
        prefix: &str,
        suffix: &str,
        history: &SuggestionHistory,
    ) -> Option<MatchResult> {
        let mut best: Option<MatchResult> = None;

        for entry in history.iter_recent_first() {
            for candidate in self.evaluate_entry(prefix, suffix, entry) {
                let improves = best
                    .as_ref()
                    .map(|b| candidate.confidence > b.confidence)
                    .unwrap_or(true);
                if improves {
                    best = Some(candidate);
                }
            }
            if best.as_ref().map(|b| b.confidence >= 1.0).unwrap_or(false) {
                break;
            }
        }

        let best = best.filter(|m| m.confidence >= self.config.min_similarity_score);
        if let Some(m) = &best {
            debug!(
                match_type = ?m.match_type,
                confidence = m.confidence,
                "history match"
            );
        }
        best
    }

    /// All candidates a single history entry produces for this query.
    fn evaluate_entry(&self, prefix: &str, suffix: &str, entry: &Suggestion) -> Vec<MatchResult> {
        let mut candidates = Vec::new();

        if let Some(m) = exact(prefix, suffix, entry) {
            candidates.push(m);
        }
        if let Some(m) = partial_typing(prefix, suffix, entry) {
            candidates.push(m);
        }
        if let Some(m) = backward_deletion(prefix, suffix, entry) {
            candidates.push(m);
        }
        if self.config.fuzzy_enabled {
            if let Some(m) = self.fuzzy(prefix, suffix, entry) {
                candidates.push(m);
            }
        }
        if self.config.multi_line_enabled {
            if let Some(m) = self.multi_line(prefix, suffix, entry) {
                candidates.push(m);
            }
        }
        if self.config.context_similar_enabled {
            if let Some(m) = self.context_similar(prefix, suffix, entry) {
                candidates.push(m);
            }
        }

        candidates
    }

    /// Prefixes within `max_edit_distance` edits of each other reuse the
    /// stored text unchanged.
    fn fuzzy(&self, prefix: &str, suffix: &str, entry: &Suggestion) -> Option<MatchResult> {
        if suffix != entry.suffix || entry.text.is_empty() {
            return None;
        }
        let distance = levenshtein(prefix, entry.prefix.as_str());
        if distance == 0 || distance > self.config.max_edit_distance {
            return None;
        }
        let longest = prefix.chars().count().max(entry.prefix.chars().count());
        let confidence = (1.0 - distance as f64 / longest as f64).max(0.7);
        Some(MatchResult {
            text: entry.text.clone(),
            match_type: MatchKind::Fuzzy,
            confidence: confidence.clamp(0.0, 1.0),
            metadata: Some(MatchMetadata {
                edit_distance: Some(distance),
                ..Default::default()
            }),
        })
    }

    /// Compare the last three lines of both prefixes. Requires each prefix
    /// to span at least two lines.
    fn multi_line(&self, prefix: &str, suffix: &str, entry: &Suggestion) -> Option<MatchResult> {
        if entry.text.is_empty() {
            return None;
        }
        let prefix_lines = prefix.lines().count();
        if prefix_lines < 2 || entry.prefix.lines().count() < 2 {
            return None;
        }
        let score = similarity(&last_lines(prefix, 3), &last_lines(&entry.prefix, 3));
        if suffix != entry.suffix || score < self.config.multi_line_threshold {
            return None;
        }
        let confidence = (score * self.config.multi_line_weight).clamp(0.0, 1.0);
        Some(MatchResult {
            text: entry.text.clone(),
            match_type: MatchKind::MultiLine,
            confidence,
            metadata: Some(MatchMetadata {
                similarity_score: Some(score),
                lines_matched: Some(prefix_lines.min(3)),
                ..Default::default()
            }),
        })
    }

    /// Weighted similarity of the trailing prefix window and the full
    /// suffixes, with a small boost after common statement punctuation.
    fn context_similar(&self, prefix: &str, suffix: &str, entry: &Suggestion) -> Option<MatchResult> {
        if entry.text.is_empty() {
            return None;
        }
        let window = self.config.context_window_chars;
        let context_sim = similarity(&last_chars(prefix, window), &last_chars(&entry.prefix, window));
        let suffix_sim = similarity(suffix, &entry.suffix);
        if context_sim < self.config.context_threshold || suffix_sim < self.config.context_threshold {
            return None;
        }

        let prefix_weight = self.config.context_prefix_weight;
        let combined = context_sim * prefix_weight + suffix_sim * (1.0 - prefix_weight);
        let boost = if ends_with_open_punctuation(prefix) {
            self.config.punctuation_boost
        } else {
            0.0
        };
        let confidence = (combined + boost).min(0.95).clamp(0.0, 1.0);
        Some(MatchResult {
            text: entry.text.clone(),
            match_type: MatchKind::ContextSimilar,
            confidence,
            metadata: Some(MatchMetadata {
                similarity_score: Some(combined),
                ..Default::default()
            }),
        })
    }
}

/// Identical prefix and suffix: return the stored text verbatim.
fn exact(prefix: &str, suffix: &str, entry: &Suggestion) -> Option<MatchResult> {
    if prefix != entry.prefix || suffix != entry.suffix {
        return None;
    }
    Some(MatchResult {
        text: entry.text.clone(),
        match_type: MatchKind::Exact,
        confidence: 1.0,
        metadata: None,
    })
}

/// The user kept typing and what they typed agrees with the stored
/// completion: serve the remainder.
fn partial_typing(prefix: &str, suffix: &str, entry: &Suggestion) -> Option<MatchResult> {
    if entry.text.is_empty() || suffix != entry.suffix || !prefix.starts_with(&entry.prefix) {
        return None;
    }
    let typed = &prefix[entry.prefix.len()..];
    if !entry.text.starts_with(typed) {
        return None;
    }
    Some(MatchResult {
        text: entry.text[typed.len()..].to_string(),
        match_type: MatchKind::PartialTyping,
        confidence: 0.95,
        metadata: None,
    })
}

/// The user deleted backwards: re-serve the deleted characters plus the
/// stored completion.
fn backward_deletion(prefix: &str, suffix: &str, entry: &Suggestion) -> Option<MatchResult> {
    if entry.text.is_empty() || suffix != entry.suffix || !entry.prefix.starts_with(prefix) {
        return None;
    }
    let deleted = &entry.prefix[prefix.len()..];
    Some(MatchResult {
        text: format!("{deleted}{}", entry.text),
        match_type: MatchKind::BackwardDeletion,
        confidence: 0.9,
        metadata: None,
    })
}

/// Last `n` lines of `s`, joined by newlines.
fn last_lines(s: &str, n: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Last `n` chars of `s` (char-counted, UTF-8 safe).
fn last_chars(s: &str, n: usize) -> String {
    let count = s.chars().count();
    s.chars().skip(count.saturating_sub(n)).collect()
}

/// True when the prefix, trimmed of trailing whitespace, ends at a position
/// where a completion commonly continues a statement.
fn ends_with_open_punctuation(prefix: &str) -> bool {
    matches!(
        prefix.trim_end().chars().last(),
        Some('.' | '(' | '{' | ',' | ':' | '=' | '[')
    )
}

// ─── Tests ────────────────────────────────────────────────────────────────────
