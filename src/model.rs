// SPDX-License-Identifier: MIT
// Shared data model for the completion core.

use serde::{Deserialize, Serialize};

/// The editing position a completion is requested for.
///
/// The cursor splits the file content into a *prefix* (everything before the
/// cursor) and a *suffix* (everything after it). `language_id` and
/// `file_path` identify the file for context retrieval and language-aware
/// heuristics; neither is read from disk by this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorContext {
    /// Text immediately before the cursor.
    pub prefix: String,
    /// Text immediately after the cursor.
    pub suffix: String,
    /// Editor language identifier, e.g. `"rust"`, `"typescript"`.
    #[serde(rename = "languageId")]
    pub language_id: String,
    /// Absolute path of the file being edited.
    #[serde(rename = "filePath")]
    pub file_path: String,
}

impl CursorContext {
    pub fn new(
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        language_id: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
            language_id: language_id.into(),
            file_path: file_path.into(),
        }
    }
}

/// Token accounting for a single model call, passed through from the backend
/// unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Estimated cost in USD as reported by the provider (0.0 if unknown).
    pub cost: f64,
    #[serde(rename = "inputTokens")]
    pub input_tokens: u64,
    #[serde(rename = "outputTokens")]
    pub output_tokens: u64,
    #[serde(rename = "cacheWriteTokens")]
    pub cache_write_tokens: u64,
    #[serde(rename = "cacheReadTokens")]
    pub cache_read_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_context_serde_field_names() {
        let ctx = CursorContext::new("let x = ", ";", "rust", "/tmp/main.rs");
        let json = serde_json::to_value(&ctx).unwrap();
        assert!(json.get("languageId").is_some());
        assert!(json.get("filePath").is_some());
        assert_eq!(json["prefix"], "let x = ");
    }

    #[test]
    fn usage_info_defaults_to_zero() {
        let usage = UsageInfo::default();
        assert_eq!(usage.input_tokens, 0);
        assert_eq!(usage.cost, 0.0);
    }
}
