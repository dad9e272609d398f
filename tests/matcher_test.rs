// SPDX-License-Identifier: MIT
// History-matcher contract tests.

use ghostline::config::MatcherConfig;
use ghostline::history::{Suggestion, SuggestionHistory};
use ghostline::matcher::{MatchEngine, MatchKind};

fn engine() -> MatchEngine {
    MatchEngine::new(MatcherConfig::default())
}

fn history_of(entries: &[(&str, &str, &str)]) -> SuggestionHistory {
    let mut history = SuggestionHistory::new(32);
    for (prefix, suffix, text) in entries {
        history.push(Suggestion::new(*prefix, *suffix, *text));
    }
    history
}

// ─── Exact ────────────────────────────────────────────────────────────────────

#[test]
fn exact_match_returns_stored_text_at_full_confidence() {
    let history = history_of(&[
        ("fn add(a: i32, b: i32) -> i32 {\n    ", "\n}", "a + b"),
        ("let name = ", ";", "\"ghost\""),
    ]);

    for (prefix, suffix, text) in [
        ("fn add(a: i32, b: i32) -> i32 {\n    ", "\n}", "a + b"),
        ("let name = ", ";", "\"ghost\""),
    ] {
        let m = engine().find_best_match(prefix, suffix, &history).unwrap();
        assert_eq!(m.match_type, MatchKind::Exact);
        assert_eq!(m.confidence, 1.0);
        assert_eq!(m.text, text);
    }
}

// ─── Partial typing ───────────────────────────────────────────────────────────

#[test]
fn typing_into_the_completion_serves_the_remainder() {
    let history = history_of(&[("const x = ", ";", "42")]);
    let m = engine().find_best_match("const x = 4", ";", &history).unwrap();
    assert_eq!(m.match_type, MatchKind::PartialTyping);
    assert_eq!(m.text, "2");
    assert_eq!(m.confidence, 0.95);
}

#[test]
fn typing_that_disagrees_with_the_completion_misses_partial() {
    let history = history_of(&[("const x = ", ";", "42")]);
    let m = engine().find_best_match("const x = 9", ";", &history);
    // "9" contradicts the stored "42" — partial typing must not fire.
    if let Some(m) = m {
        assert_ne!(m.match_type, MatchKind::PartialTyping);
    }
}

// ─── Backward deletion ────────────────────────────────────────────────────────

#[test]
fn entry_with_empty_text_never_matches_backward_deletion() {
    let history = history_of(&[("const x = 42", ";", "")]);
    assert!(engine().find_best_match("const x = 4", ";", &history).is_none());
}

#[test]
fn deleting_back_replays_deleted_text() {
    let history = history_of(&[("response.headers", ";", ".get(\"etag\")")]);
    let m = engine().find_best_match("response.he", ";", &history).unwrap();
    assert_eq!(m.match_type, MatchKind::BackwardDeletion);
    assert_eq!(m.text, "aders.get(\"etag\")");
}

// ─── Fuzzy ────────────────────────────────────────────────────────────────────

#[test]
fn fuzzy_confidence_floor_holds_for_small_edits() {
    let mut config = MatcherConfig::default();
    config.context_similar_enabled = false;
    let engine = MatchEngine::new(config);

    // One and two single-character edits of the stored prefix.
    let history = history_of(&[("let widget_count = ", ";", "widgets.len()")]);
    for query in ["let widget_coint = ", "let widgit_coint = "] {
        let m = engine.find_best_match(query, ";", &history).unwrap();
        assert_eq!(m.match_type, MatchKind::Fuzzy);
        assert!(m.confidence >= 0.7, "confidence {} below floor", m.confidence);
    }
}

// ─── Score gate ───────────────────────────────────────────────────────────────

#[test]
fn results_never_fall_below_the_minimum_score() {
    let history = history_of(&[
        ("fn render(&self) {", "}", "self.draw()"),
        ("import numpy as np\n", "", "np.zeros(10)"),
    ]);
    let queries = [
        ("completely unrelated text", "???"),
        ("fn rend", "}"),
        ("import numpy", ""),
        ("", ""),
    ];
    for (prefix, suffix) in queries {
        if let Some(m) = engine().find_best_match(prefix, suffix, &history) {
            assert!(m.confidence >= 0.7, "{prefix:?} produced {}", m.confidence);
        }
    }
}

#[test]
fn raising_the_minimum_hides_weaker_matches() {
    let mut config = MatcherConfig::default();
    config.min_similarity_score = 0.99;
    config.context_similar_enabled = false;
    let engine = MatchEngine::new(config);

    let history = history_of(&[("let count = ", ";", "xs.len()")]);
    // Fuzzy would score ~0.92 — below the raised bar.
    assert!(engine.find_best_match("let coint = ", ";", &history).is_none());
    // Exact still clears it.
    assert!(engine.find_best_match("let count = ", ";", &history).is_some());
}

// ─── Recency ──────────────────────────────────────────────────────────────────

#[test]
fn newer_entries_shadow_older_ones() {
    let history = history_of(&[
        ("let x = ", ";", "old_value"),
        ("let x = ", ";", "new_value"),
    ]);
    let m = engine().find_best_match("let x = ", ";", &history).unwrap();
    assert_eq!(m.text, "new_value");
}

#[test]
fn evicted_entries_no_longer_match() {
    let mut history = SuggestionHistory::new(2);
    history.push(Suggestion::new("alpha = ", ";", "1"));
    history.push(Suggestion::new("beta = ", ";", "2"));
    history.push(Suggestion::new("gamma = ", ";", "3"));

    assert!(engine().find_best_match("alpha = ", ";", &history).is_none());
    assert!(engine().find_best_match("gamma = ", ";", &history).is_some());
}
