// SPDX-License-Identifier: MIT
// Prompt strategy selection and dispatch.
//
// Two prompt-construction conventions exist: fill-in-middle for models
// trained on delimiter tokens, hole-filling for everything else. Selection
// is a single capability check on the model descriptor — no fallback chain.

pub mod fim;
pub mod hole;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::backend::{ModelBackend, ModelDescriptor, StructuredChunk};
use crate::config::PromptConfig;
use crate::context::ContextRetriever;
use crate::model::{CursorContext, UsageInfo};

/// Output of prompt construction, consumed by the model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBundle {
    #[serde(rename = "systemPrompt", skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(rename = "userPrompt", skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    /// Prefix half, delimiter-wrapped for FIM, raw-truncated otherwise.
    #[serde(rename = "formattedPrefix")]
    pub formatted_prefix: String,
    /// Suffix half, delimiter-wrapped for FIM, raw-truncated otherwise.
    #[serde(rename = "formattedSuffix")]
    pub formatted_suffix: String,
}

/// Completion text recovered from a raw model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCompletion {
    pub text: String,
}

/// Prompt-construction convention, dispatched by pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Delimiter-token prompt; the model output is the completion verbatim.
    Fim,
    /// Instruction prompt with a fill marker; the model answers in tags.
    HoleFiller,
}

impl Strategy {
    /// Fill-in-middle iff the model supports it. Nothing else is consulted.
    pub fn for_model(descriptor: &ModelDescriptor) -> Self {
        if descriptor.supports_fill_in_middle() {
            Strategy::Fim
        } else {
            Strategy::HoleFiller
        }
    }

    /// Build the prompt bundle for this convention.
    pub fn build_prompts(
        &self,
        ctx: &CursorContext,
        retriever: &dyn ContextRetriever,
        model_name: &str,
        config: &PromptConfig,
    ) -> PromptBundle {
        match self {
            Strategy::Fim => fim::build_bundle(&ctx.prefix, &ctx.suffix, model_name, config),
            Strategy::HoleFiller => hole::build_bundle(ctx, retriever, config),
        }
    }

    /// Recover the completion text from a raw response. Total: malformed
    /// output degrades to trimmed raw text, never an error.
    ///
    /// Either variant also drops a verbatim echo of the surrounding
    /// prefix/suffix, which chatty models occasionally repeat.
    pub fn parse_response(&self, raw: &str, prefix: &str, suffix: &str) -> ParsedCompletion {
        let text = match self {
            Strategy::Fim => fim::strip_code_fences(raw),
            Strategy::HoleFiller => hole::extract_completion(raw),
        };
        ParsedCompletion {
            text: strip_echoes(text, prefix, suffix),
        }
    }

    /// Run the backend operation for this convention, forwarding chunks as
    /// plain text. Backend errors propagate unchanged.
    pub async fn generate(
        &self,
        backend: &dyn ModelBackend,
        bundle: &PromptBundle,
        chunks: UnboundedSender<String>,
    ) -> Result<UsageInfo> {
        match self {
            Strategy::Fim => {
                backend
                    .generate_fill_in_middle(
                        &bundle.formatted_prefix,
                        &bundle.formatted_suffix,
                        chunks,
                    )
                    .await
            }
            Strategy::HoleFiller => {
                // Normalize the structured chunk shape to the plain-text
                // accumulation contract the FIM path uses.
                let (tx, mut rx) = mpsc::unbounded_channel::<StructuredChunk>();
                let system = bundle.system_prompt.as_deref().unwrap_or("");
                let user = bundle.user_prompt.as_deref().unwrap_or("");
                let forward = async move {
                    while let Some(chunk) = rx.recv().await {
                        if chunks.send(chunk.delta).is_err() {
                            break;
                        }
                    }
                };
                let (usage, ()) = tokio::join!(backend.generate_structured(system, user, tx), forward);
                usage
            }
        }
    }
}

/// Drop a leading prefix echo and a trailing suffix echo, when present.
fn strip_echoes(text: String, prefix: &str, suffix: &str) -> String {
    let mut result = text.as_str();
    if !prefix.is_empty() {
        if let Some(stripped) = result.strip_prefix(prefix) {
            result = stripped;
        }
    }
    if !suffix.is_empty() && result.len() > suffix.len() {
        if let Some(stripped) = result.strip_suffix(suffix) {
            result = stripped;
        }
    }
    if result.len() == text.len() {
        text
    } else {
        result.to_string()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
