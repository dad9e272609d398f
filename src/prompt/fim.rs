// SPDX-License-Identifier: MIT
// Fill-in-middle prompt construction.
//
// FIM-capable models take no natural-language instructions — just the
// prefix and suffix wrapped in the delimiter tokens their family was
// trained on. The model's raw output is the completion verbatim (modulo
// markdown fences some providers insist on adding).

use crate::config::PromptConfig;
use crate::prompt::PromptBundle;

/// Delimiter set for one model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FimTemplate {
    pub prefix_token: &'static str,
    pub suffix_token: &'static str,
    pub middle_token: &'static str,
}

/// The convention most providers accept.
pub const DEFAULT_TEMPLATE: FimTemplate = FimTemplate {
    prefix_token: "<|fim_prefix|>",
    suffix_token: "<|fim_suffix|>",
    middle_token: "<|fim_middle|>",
};

const CODELLAMA_TEMPLATE: FimTemplate = FimTemplate {
    prefix_token: "<PRE> ",
    suffix_token: " <SUF>",
    middle_token: " <MID>",
};

const DEEPSEEK_TEMPLATE: FimTemplate = FimTemplate {
    prefix_token: "<｜fim▁begin｜>",
    suffix_token: "<｜fim▁hole｜>",
    middle_token: "<｜fim▁end｜>",
};

/// Pick the delimiter set for a model name.
///
/// Matching is substring-based on the lowercased name; unknown models get
/// [`DEFAULT_TEMPLATE`], which StarCoder, SantaCoder, Qwen, and the hosted
/// completion models all accept.
pub fn template_for_model(model_name: &str) -> FimTemplate {
    let name = model_name.to_lowercase();
    if name.contains("codellama") || name.contains("code-llama") {
        CODELLAMA_TEMPLATE
    } else if name.contains("deepseek") {
        DEEPSEEK_TEMPLATE
    } else {
        DEFAULT_TEMPLATE
    }
}

/// Build the FIM bundle: delimiter-wrapped prefix and suffix halves, no
/// system or user prompt.
pub fn build_bundle(
    prefix: &str,
    suffix: &str,
    model_name: &str,
    config: &PromptConfig,
) -> PromptBundle {
    let template = template_for_model(model_name);
    let prefix = truncate_prefix(prefix, config.max_prefix_chars);
    let suffix = truncate_suffix(suffix, config.max_suffix_chars);
    PromptBundle {
        system_prompt: None,
        user_prompt: None,
        formatted_prefix: format!("{}{prefix}", template.prefix_token),
        formatted_suffix: format!(
            "{}{suffix}{}",
            template.suffix_token, template.middle_token
        ),
    }
}

/// Truncate a prefix to at most `max` bytes, keeping the right end and
/// respecting char boundaries.
pub fn truncate_prefix(prefix: &str, max: usize) -> &str {
    if prefix.len() <= max {
        return prefix;
    }
    let mut start = prefix.len() - max;
    while !prefix.is_char_boundary(start) {
        start += 1;
    }
    &prefix[start..]
}

/// Truncate a suffix to at most `max` bytes, keeping the left end and
/// respecting char boundaries.
pub fn truncate_suffix(suffix: &str, max: usize) -> &str {
    if suffix.len() <= max {
        return suffix;
    }
    let mut end = max;
    while !suffix.is_char_boundary(end) {
        end -= 1;
    }
    &suffix[..end]
}

/// Strip markdown code fences from a model response, if present.
///
/// Providers sometimes wrap the completion in ``` fences with an optional
/// language label; the inner text is the completion. Unfenced output is
/// returned unchanged — FIM output is the completion verbatim, and its
/// leading whitespace is meaningful.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(after_fence) = trimmed.strip_prefix("```") {
        let body = if let Some(newline) = after_fence.find('\n') {
            &after_fence[newline + 1..]
        } else {
            after_fence
        };
        let stripped = if let Some(end) = body.rfind("\n```") {
            &body[..end]
        } else {
            body.strip_suffix("```").unwrap_or(body)
        };
        return stripped.to_string();
    }
    raw.to_string()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
