//! # Acknowledgement Text
//!
//! Short human-readable reply returned to the submitter. Generation is
//! best-effort; any failure falls back to a canned reply.

use crate::Priority;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reply used whenever generation fails or returns nothing
pub const DEFAULT_ACKNOWLEDGEMENT: &str = "Your issue has been logged.";

/// Input to an acknowledgement generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgementRequest {
    /// Class-specific instruction
    pub prompt: String,

    /// Text supplied by the requester
    pub description: String,

    pub priority: Priority,
}

impl AcknowledgementRequest {
    /// Prompt and description joined as a single text input
    pub fn render(&self) -> String {
        format!(
            "{}\n\nPriority: {}\nRequest: {}",
            self.prompt, self.priority, self.description
        )
    }
}

/// Generative text service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AcknowledgementGenerator: Send + Sync {
    /// Produce acknowledgement text
    async fn acknowledge(&self, request: &AcknowledgementRequest)
        -> Result<String, AcknowledgementError>;
}

/// Errors raised by acknowledgement generators
#[derive(Debug, Error)]
pub enum AcknowledgementError {
    #[error("Text service unavailable: {message}")]
    Unavailable { message: String },

    #[error("Text service rejected request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Text service returned no usable text")]
    EmptyResponse,

    #[error("Text generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Generator that always returns a fixed reply
#[derive(Debug, Clone)]
pub struct CannedAcknowledgement {
    reply: String,
}

impl CannedAcknowledgement {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
        }
    }
}

impl Default for CannedAcknowledgement {
    fn default() -> Self {
        Self::new(DEFAULT_ACKNOWLEDGEMENT)
    }
}

#[async_trait]
impl AcknowledgementGenerator for CannedAcknowledgement {
    async fn acknowledge(
        &self,
        _request: &AcknowledgementRequest,
    ) -> Result<String, AcknowledgementError> {
        Ok(self.reply.clone())
    }
}
