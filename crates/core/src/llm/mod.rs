//! # Generation Service
//!
//! The seam between stage execution and whatever produces text.
//!
//! A [`GenerationService`] receives a fully bound prompt plus the JSON schema
//! the answer should follow, and returns raw text. Parsing that text is the
//! stage executor's job, so a backend only ever fails with a transport error.

mod gateway;

#[cfg(test)]
pub(crate) mod scripted;

pub use gateway::HttpGateway;

use crate::error::StageError;
use crate::models::ModelConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One call to the text-generation backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Agent key from the crew config (e.g. "architect")
    pub agent: String,
    /// Stage name, used for error attribution and logs
    pub stage: String,
    /// Provider and model to run against
    pub model: ModelConfig,
    /// Role definition (role, goal, backstory) plus output instructions
    pub system_prompt: String,
    /// Bound task template
    pub prompt: String,
    /// JSON schema of the expected output
    pub schema: serde_json::Value,
}

/// Text-generation backend
///
/// Implementations must be safe to call concurrently: the orchestrator shares
/// one instance across all engineer stages.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Run one generation and return the raw text.
    ///
    /// Errors are [`StageError::Transport`]; timeouts and cancellation are
    /// enforced by the caller.
    async fn generate(&self, request: GenerationRequest) -> Result<String, StageError>;
}
