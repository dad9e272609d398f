//! Criterion benchmarks for hot paths in the completion engine.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - Levenshtein distance / normalized similarity (fuzzy matching core)
//!   - MatchEngine::find_best_match over a full history
//!   - Speculative confidence heuristic

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ghostline::config::{MatcherConfig, SpeculativeConfig};
use ghostline::history::{Suggestion, SuggestionHistory};
use ghostline::matcher::similarity::{levenshtein, similarity};
use ghostline::matcher::MatchEngine;
use ghostline::speculative::heuristics::score_completion;

// ─── Similarity ──────────────────────────────────────────────────────────────

static PREFIX_A: &str = "fn handle_request(&mut self, req: Request) -> Result<Response> {\n    let session = self.sessions.get(&req.id)?;\n    session.dispatch(";
static PREFIX_B: &str = "fn handle_request(&mut self, req: Request) -> Result<Response> {\n    let session = self.sessions.get_mut(&req.id)?;\n    session.dispatch(";

fn bench_similarity(c: &mut Criterion) {
    c.bench_function("levenshtein_typical_prefixes", |b| {
        b.iter(|| black_box(levenshtein(black_box(PREFIX_A), black_box(PREFIX_B))));
    });

    c.bench_function("similarity_short_windows", |b| {
        b.iter(|| {
            black_box(similarity(
                black_box("session.dispatch(req, "),
                black_box("session.dispatch(res, "),
            ))
        });
    });
}

// ─── Match engine ────────────────────────────────────────────────────────────

fn full_history() -> SuggestionHistory {
    let mut history = SuggestionHistory::new(50);
    for i in 0..50 {
        history.push(Suggestion::new(
            format!("let binding_{i} = compute_{i}("),
            ");",
            format!("arg_{i}, arg_{}", i + 1),
        ));
    }
    history
}

fn bench_find_best_match(c: &mut Criterion) {
    let engine = MatchEngine::new(MatcherConfig::default());
    let history = full_history();

    c.bench_function("find_best_match_hit_newest", |b| {
        b.iter(|| {
            black_box(engine.find_best_match(
                black_box("let binding_49 = compute_49("),
                black_box(");"),
                &history,
            ))
        });
    });

    c.bench_function("find_best_match_full_scan_miss", |b| {
        b.iter(|| {
            black_box(engine.find_best_match(
                black_box("unrelated_query_text"),
                black_box("???"),
                &history,
            ))
        });
    });
}

// ─── Speculative heuristic ───────────────────────────────────────────────────

fn bench_confidence(c: &mut Criterion) {
    let config = SpeculativeConfig::default();
    let completion = "match self.state {\n        State::Idle => self.start(),\n        State::Running => self.tick(),\n    }";
    let prefix = "    fn advance(&mut self) {\n        ";

    c.bench_function("speculative_confidence_score", |b| {
        b.iter(|| {
            black_box(score_completion(
                black_box(completion),
                black_box(prefix),
                black_box("rust"),
                &config,
            ))
        });
    });
}

criterion_group!(benches, bench_similarity, bench_find_best_match, bench_confidence);
criterion_main!(benches);
