// SPDX-License-Identifier: MIT
// Engine configuration.
//
// All empirically-chosen thresholds live here as tunable defaults rather
// than constants. Priority: explicit value > config.toml > built-in
// default. A malformed file never fails engine construction — defaults
// apply and the error is logged.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

// ─── MatcherConfig ────────────────────────────────────────────────────────────

/// History-matching configuration (`[matcher]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum confidence a match must reach to be returned. Default: 0.7.
    pub min_similarity_score: f64,
    /// Maximum Levenshtein distance the fuzzy strategy accepts. Default: 2.
    pub max_edit_distance: usize,
    /// Maximum history entries kept (oldest discarded first). Default: 50.
    pub max_history: usize,
    /// Enable the fuzzy edit-distance strategy. Default: true.
    pub fuzzy_enabled: bool,
    /// Enable the trailing-lines strategy. Default: true.
    pub multi_line_enabled: bool,
    /// Enable the context-window strategy. Default: true.
    pub context_similar_enabled: bool,
    /// Similarity floor for the trailing-lines comparison. Default: 0.8.
    pub multi_line_threshold: f64,
    /// Confidence multiplier applied to the trailing-lines similarity.
    /// Default: 0.85.
    pub multi_line_weight: f64,
    /// Similarity floor for both context-window comparisons. Default: 0.85.
    pub context_threshold: f64,
    /// Weight of the prefix window in the combined context score (the
    /// suffix gets the remainder). Default: 0.7.
    pub context_prefix_weight: f64,
    /// Trailing prefix chars compared by the context strategy. Default: 50.
    pub context_window_chars: usize,
    /// Confidence boost after statement punctuation. Default: 0.05.
    pub punctuation_boost: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            min_similarity_score: 0.7,
            max_edit_distance: 2,
            max_history: 50,
            fuzzy_enabled: true,
            multi_line_enabled: true,
            context_similar_enabled: true,
            multi_line_threshold: 0.8,
            multi_line_weight: 0.85,
            context_threshold: 0.85,
            context_prefix_weight: 0.7,
            context_window_chars: 50,
            punctuation_boost: 0.05,
        }
    }
}

// ─── PromptConfig ─────────────────────────────────────────────────────────────

/// Prompt-construction limits (`[prompt]` in config.toml).
///
/// Conservative caps keep the payload well within any provider's context
/// window.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Maximum prefix bytes sent to the model (clipped from the left).
    /// Default: 4000.
    pub max_prefix_chars: usize,
    /// Maximum suffix bytes sent to the model (clipped from the right).
    /// Default: 2000.
    pub max_suffix_chars: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_prefix_chars: 4000,
            max_suffix_chars: 2000,
        }
    }
}

// ─── SpeculativeConfig ────────────────────────────────────────────────────────

/// Speculative-preview configuration (`[speculative]` in config.toml).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SpeculativeConfig {
    /// Enable the speculative fast-model path. Default: true.
    pub enabled: bool,
    /// Maximum cached suggestions (oldest insertion evicted). Default: 100.
    pub max_cache_size: usize,
    /// Starting confidence before heuristics. Default: 0.5.
    pub base_confidence: f64,
    /// Bonus for balanced delimiters. Default: 0.2.
    pub balance_bonus: f64,
    /// Bonus for matching indentation. Default: 0.15.
    pub indent_bonus: f64,
    /// Penalty for degenerate completion lengths. Default: 0.1.
    pub length_penalty: f64,
    /// Trimmed char count below which the penalty applies. Default: 5.
    pub min_length: usize,
    /// Trimmed char count above which the penalty applies. Default: 500.
    pub max_length: usize,
}

impl Default for SpeculativeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_cache_size: 100,
            base_confidence: 0.5,
            balance_bonus: 0.2,
            indent_bonus: 0.15,
            length_penalty: 0.1,
            min_length: 5,
            max_length: 500,
        }
    }
}

// ─── EngineConfig ─────────────────────────────────────────────────────────────

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    pub prompt: PromptConfig,
    pub speculative: SpeculativeConfig,
}

impl EngineConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let mut config: EngineConfig =
            toml::from_str(contents).context("failed to parse engine config")?;
        config.validate();
        Ok(config)
    }

    /// Load from a config.toml path. A missing or malformed file yields the
    /// defaults — the engine always starts.
    pub fn load(path: &Path) -> Self {
        let Ok(contents) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        match Self::from_toml_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), err = %e, "failed to parse config — using defaults");
                Self::default()
            }
        }
    }

    /// Clamp out-of-range values in place so a bad file never produces a
    /// panicking engine.
    pub fn validate(&mut self) {
        clamp_unit(&mut self.matcher.min_similarity_score, "matcher.min_similarity_score");
        clamp_unit(&mut self.matcher.multi_line_threshold, "matcher.multi_line_threshold");
        clamp_unit(&mut self.matcher.multi_line_weight, "matcher.multi_line_weight");
        clamp_unit(&mut self.matcher.context_threshold, "matcher.context_threshold");
        clamp_unit(&mut self.matcher.context_prefix_weight, "matcher.context_prefix_weight");
        clamp_unit(&mut self.matcher.punctuation_boost, "matcher.punctuation_boost");
        clamp_unit(&mut self.speculative.base_confidence, "speculative.base_confidence");
        clamp_unit(&mut self.speculative.balance_bonus, "speculative.balance_bonus");
        clamp_unit(&mut self.speculative.indent_bonus, "speculative.indent_bonus");
        clamp_unit(&mut self.speculative.length_penalty, "speculative.length_penalty");

        if self.matcher.max_history == 0 {
            warn!("matcher.max_history of 0 raised to 1");
            self.matcher.max_history = 1;
        }
        if self.speculative.max_cache_size == 0 {
            warn!("speculative.max_cache_size of 0 raised to 1");
            self.speculative.max_cache_size = 1;
        }
    }
}

fn clamp_unit(value: &mut f64, name: &str) {
    if !(0.0..=1.0).contains(value) || value.is_nan() {
        let clamped = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        warn!(field = name, from = *value, to = clamped, "config value clamped to [0, 1]");
        *value = clamped;
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.matcher.min_similarity_score, 0.7);
        assert_eq!(config.matcher.max_edit_distance, 2);
        assert_eq!(config.prompt.max_prefix_chars, 4000);
        assert_eq!(config.speculative.max_cache_size, 100);
        assert_eq!(config.speculative.base_confidence, 0.5);
    }

    #[test]
    fn partial_toml_keeps_defaults_elsewhere() {
        let config = EngineConfig::from_toml_str(
            "[matcher]\nmin_similarity_score = 0.8\n\n[speculative]\nmax_cache_size = 10\n",
        )
        .unwrap();
        assert_eq!(config.matcher.min_similarity_score, 0.8);
        assert_eq!(config.matcher.max_edit_distance, 2);
        assert_eq!(config.speculative.max_cache_size, 10);
        assert!(config.speculative.enabled);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = EngineConfig::from_toml_str(
            "[matcher]\nmin_similarity_score = 1.5\nmax_history = 0\n",
        )
        .unwrap();
        assert_eq!(config.matcher.min_similarity_score, 1.0);
        assert_eq!(config.matcher.max_history, 1);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(EngineConfig::from_toml_str("matcher = not valid").is_err());
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let config = EngineConfig::load(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.matcher.min_similarity_score, 0.7);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[prompt]\nmax_prefix_chars = 1234\n").unwrap();
        let config = EngineConfig::load(&path);
        assert_eq!(config.prompt.max_prefix_chars, 1234);
    }
}
