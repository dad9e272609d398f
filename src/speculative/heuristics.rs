// SPDX-License-Identifier: MIT
// Confidence heuristic for fast-model completions.
//
// The score never inspects semantics — it rewards completions that look
// structurally plausible (balanced delimiters, matching indentation) and
// penalizes degenerate lengths.

use crate::config::SpeculativeConfig;

/// Score a fast-model completion in `[0, 1]`.
///
/// Starts at `base_confidence`, adds `balance_bonus` for balanced
/// delimiters, adds `indent_bonus` when the completion's leading
/// indentation agrees with the surrounding code, subtracts
/// `length_penalty` for very short or very long completions.
pub fn score_completion(
    completion: &str,
    prefix: &str,
    language_id: &str,
    config: &SpeculativeConfig,
) -> f64 {
    let mut confidence = config.base_confidence;

    if is_balanced(completion, language_id) {
        confidence += config.balance_bonus;
    }
    if indentation_matches(completion, prefix) {
        confidence += config.indent_bonus;
    }
    let trimmed_len = completion.trim().chars().count();
    if trimmed_len < config.min_length || trimmed_len > config.max_length {
        confidence -= config.length_penalty;
    }

    confidence.clamp(0.0, 1.0)
}

/// Delimiter pairs opened and closed an equal number of times.
///
/// All languages check parens, brackets, and braces; markup languages also
/// check angle brackets.
pub fn is_balanced(completion: &str, language_id: &str) -> bool {
    let mut pairs: Vec<(char, char)> = vec![('(', ')'), ('[', ']'), ('{', '}')];
    if matches!(language_id, "html" | "xml" | "vue" | "svelte") {
        pairs.push(('<', '>'));
    }

    pairs.iter().all(|&(open, close)| {
        let opens = completion.chars().filter(|&c| c == open).count();
        let closes = completion.chars().filter(|&c| c == close).count();
        opens == closes
    })
}

/// Leading indentation of the completion agrees with the last non-empty
/// prefix line.
///
/// A single-line completion continuing the current line has no indentation
/// of its own and counts as a match. For multi-line completions the first
/// indented line is compared; when the prefix ends at a line start the
/// completion's first line is compared directly.
pub fn indentation_matches(completion: &str, prefix: &str) -> bool {
    let surrounding = prefix
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(leading_whitespace)
        .unwrap_or("");

    let completion_indent = if prefix.ends_with('\n') || prefix.is_empty() {
        completion.lines().next().map(leading_whitespace)
    } else {
        completion.lines().nth(1).map(leading_whitespace)
    };

    match completion_indent {
        // Continuation lines at least as deep as the surrounding line keep
        // the block structure plausible.
        Some(indent) => indent.starts_with(surrounding),
        None => true,
    }
}

fn leading_whitespace(line: &str) -> &str {
    let end = line.len() - line.trim_start().len();
    &line[..end]
}

// ─── Tests ────────────────────────────────────────────────────────────────────
