// SPDX-License-Identifier: MIT
// Bounded history of previously produced completions.
//
// Insertion order is recency: the newest entry sits at the back of the
// deque. There is no eviction policy beyond the maximum count — when the
// history is full the oldest entry is discarded.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A completion that was produced (or accepted) at some cursor position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    /// Text before the cursor at the time the completion was produced.
    pub prefix: String,
    /// Text after the cursor at the time the completion was produced.
    pub suffix: String,
    /// The completion text itself.
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Suggestion {
    pub fn new(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Size-bounded suggestion history.
///
/// Thread-safety: wrap in `Mutex<SuggestionHistory>` for shared use.
pub struct SuggestionHistory {
    capacity: usize,
    entries: VecDeque<Suggestion>,
}

impl SuggestionHistory {
    /// Create a history holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a suggestion, discarding the oldest entry when full.
    pub fn push(&mut self, suggestion: Suggestion) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(suggestion);
    }

    /// Iterate entries from most recent to oldest.
    pub fn iter_recent_first(&self) -> impl Iterator<Item = &Suggestion> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_discards_oldest_at_capacity() {
        let mut history = SuggestionHistory::new(2);
        history.push(Suggestion::new("a", "", "1"));
        history.push(Suggestion::new("b", "", "2"));
        history.push(Suggestion::new("c", "", "3"));

        assert_eq!(history.len(), 2);
        let prefixes: Vec<&str> = history
            .iter_recent_first()
            .map(|s| s.prefix.as_str())
            .collect();
        assert_eq!(prefixes, vec!["c", "b"]);
    }

    #[test]
    fn iteration_is_recency_ordered() {
        let mut history = SuggestionHistory::new(8);
        history.push(Suggestion::new("old", "", "x"));
        history.push(Suggestion::new("new", "", "y"));

        let first = history.iter_recent_first().next().unwrap();
        assert_eq!(first.prefix, "new");
    }

    #[test]
    fn zero_capacity_clamped_to_one() {
        let mut history = SuggestionHistory::new(0);
        history.push(Suggestion::new("a", "", "1"));
        history.push(Suggestion::new("b", "", "2"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.iter_recent_first().next().unwrap().prefix, "b");
    }
}
