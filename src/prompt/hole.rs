// SPDX-License-Identifier: MIT
// Hole-filling prompt construction and tolerant response parsing.
//
// Models without fill-in-middle support get a natural-language system
// prompt plus a user prompt that embeds a {{FILL_HERE}} marker at the
// cursor, surrounded by context snippets. The model is asked to answer
// inside <COMPLETION> tags; parsing degrades gracefully when it doesn't.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::PromptConfig;
use crate::context::{ContextRetriever, Snippet};
use crate::model::CursorContext;
use crate::prompt::PromptBundle;
use crate::prompt::fim::{strip_code_fences, truncate_prefix, truncate_suffix};

pub const FILL_MARKER: &str = "{{FILL_HERE}}";

const SYSTEM_PROMPT: &str = "\
You are an inline code completion engine. The user's file is shown with a \
{{FILL_HERE}} marker at the cursor. Produce ONLY the text that belongs at \
the marker so the surrounding code stays syntactically valid. Do not repeat \
code that already appears before or after the marker. Answer inside a \
single <COMPLETION>...</COMPLETION> tag with no other commentary.";

/// Build the hole-filling bundle: system prompt, user prompt with context
/// snippets and the marker, and the raw (truncated) halves for callers that
/// need them.
pub fn build_bundle(
    ctx: &CursorContext,
    retriever: &dyn ContextRetriever,
    config: &PromptConfig,
) -> PromptBundle {
    let prefix = truncate_prefix(&ctx.prefix, config.max_prefix_chars);
    let suffix = truncate_suffix(&ctx.suffix, config.max_suffix_chars);

    let mut user_prompt = String::new();

    let directories = retriever.workspace_directories();
    if !directories.is_empty() {
        user_prompt.push_str("Workspace directories:\n");
        for dir in &directories {
            user_prompt.push_str("- ");
            user_prompt.push_str(dir);
            user_prompt.push('\n');
        }
        user_prompt.push('\n');
    }

    for Snippet { file_path, content } in retriever.related_snippets(ctx) {
        user_prompt.push_str(&format!("<SNIPPET file=\"{file_path}\">\n{content}\n</SNIPPET>\n\n"));
    }

    user_prompt.push_str(&format!(
        "<QUERY language=\"{}\" file=\"{}\">\n{prefix}{FILL_MARKER}{suffix}\n</QUERY>",
        ctx.language_id, ctx.file_path
    ));

    PromptBundle {
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        user_prompt: Some(user_prompt),
        formatted_prefix: prefix.to_string(),
        formatted_suffix: suffix.to_string(),
    }
}

/// Extract the completion from a tagged response. Never fails: a malformed
/// or missing tag falls back to the fence-stripped, trimmed raw text.
pub fn extract_completion(raw: &str) -> String {
    static CLOSED: OnceLock<Regex> = OnceLock::new();
    static OPEN: OnceLock<Regex> = OnceLock::new();
    let closed = CLOSED.get_or_init(|| {
        Regex::new(r"(?is)<COMPLETION>(.*?)</COMPLETION>").expect("closed completion-tag regex is valid")
    });
    let open = OPEN.get_or_init(|| {
        Regex::new(r"(?is)<COMPLETION>(.*)").expect("open completion-tag regex is valid")
    });

    if let Some(caps) = closed.captures(raw) {
        return caps[1].to_string();
    }
    // Streamed responses can end mid-tag; take everything after the opener.
    if let Some(caps) = open.captures(raw) {
        return caps[1].to_string();
    }
    strip_code_fences(raw).trim().to_string()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
