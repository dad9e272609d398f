// SPDX-License-Identifier: MIT
// Abstract model-backend contract.
//
// Provider HTTP clients live outside this crate; the completion core only
// sees this trait. Both operations stream chunks through an unbounded
// channel — a lazy, finite, non-restartable sequence that ends when the
// call returns — and resolve to the provider's token accounting.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::model::UsageInfo;

/// Capability description of a target model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Provider model identifier, e.g. `"codex-spark"`, `"claude-haiku-4-5"`.
    pub name: String,
    /// Whether the model natively consumes fill-in-middle delimiter tokens.
    #[serde(rename = "supportsFim")]
    pub fim: bool,
}

impl ModelDescriptor {
    pub fn new(name: impl Into<String>, fim: bool) -> Self {
        Self {
            name: name.into(),
            fim,
        }
    }

    pub fn supports_fill_in_middle(&self) -> bool {
        self.fim
    }
}

/// One streamed fragment of a structured-chat response.
///
/// Providers disagree on chunk shape; this is the least common denominator
/// the hole-filling strategy normalizes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredChunk {
    /// Incremental response text.
    pub delta: String,
    /// Role marker on the first chunk of a message, when the provider
    /// sends one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Typed failures a backend implementation can report.
///
/// Flows through `anyhow::Error` so callers that care can downcast; callers
/// that don't treat every variant as "no completion".
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("provider error: {0}")]
    Provider(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("request cancelled")]
    Cancelled,
}

/// Common interface for every model backend the engine can call.
///
/// Implementations own timeouts and retries; this crate imposes neither.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Describe the model behind this backend.
    fn descriptor(&self) -> ModelDescriptor;

    /// Fill-in-middle generation. Raw completion text is streamed through
    /// `chunks`; the sender is dropped when the stream ends.
    async fn generate_fill_in_middle(
        &self,
        prefix: &str,
        suffix: &str,
        chunks: UnboundedSender<String>,
    ) -> Result<UsageInfo>;

    /// Structured chat generation for models without fill-in-middle
    /// support.
    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        chunks: UnboundedSender<StructuredChunk>,
    ) -> Result<UsageInfo>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_capability_flag() {
        assert!(ModelDescriptor::new("starcoder2", true).supports_fill_in_middle());
        assert!(!ModelDescriptor::new("claude-haiku-4-5", false).supports_fill_in_middle());
    }

    #[test]
    fn backend_error_messages() {
        let err = BackendError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("timed out"));
        assert_eq!(BackendError::Cancelled.to_string(), "request cancelled");
    }
}
