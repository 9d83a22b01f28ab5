//! # Errors
//!
//! Typed failures for stage execution and orchestration runs.
//!
//! A [`StageError`] is scoped to a single stage: for the architect it aborts
//! the run, for an engineer it only marks that engineer's result slot.
//! [`OrchestrationError`] is what a caller sees when a run produces no
//! result set at all.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Failure of a single stage execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageError {
    /// Template declares a placeholder with no supplied value and no default
    #[error("stage '{stage}': no value bound for placeholder '{{{placeholder}}}'")]
    TemplateBinding { stage: String, placeholder: String },

    /// Generation output could not be coerced into the stage's output schema
    #[error("stage '{stage}': output does not match schema: {reason}")]
    SchemaViolation { stage: String, reason: String },

    /// The remote call did not complete in time
    #[error("stage '{stage}': timed out after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },

    /// The remote call failed (network, HTTP status, malformed envelope)
    #[error("stage '{stage}': transport failure: {message}")]
    Transport { stage: String, message: String },

    /// The caller cancelled the stage before it finished
    #[error("stage '{stage}': cancelled")]
    Cancelled { stage: String },
}

/// Discriminant of [`StageError`], for callers that only branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageErrorKind {
    TemplateBinding,
    SchemaViolation,
    Timeout,
    Transport,
    Cancelled,
}

impl fmt::Display for StageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageErrorKind::TemplateBinding => "TemplateBindingError",
            StageErrorKind::SchemaViolation => "SchemaViolationError",
            StageErrorKind::Timeout => "StageTimeoutError",
            StageErrorKind::Transport => "StageTransportError",
            StageErrorKind::Cancelled => "StageCancelled",
        };
        f.write_str(name)
    }
}

impl StageError {
    pub fn template_binding(stage: impl Into<String>, placeholder: impl Into<String>) -> Self {
        StageError::TemplateBinding {
            stage: stage.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn schema_violation(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        StageError::SchemaViolation {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(stage: impl Into<String>, after: Duration) -> Self {
        StageError::Timeout {
            stage: stage.into(),
            timeout_ms: after.as_millis() as u64,
        }
    }

    pub fn transport(stage: impl Into<String>, message: impl Into<String>) -> Self {
        StageError::Transport {
            stage: stage.into(),
            message: message.into(),
        }
    }

    pub fn cancelled(stage: impl Into<String>) -> Self {
        StageError::Cancelled {
            stage: stage.into(),
        }
    }

    pub fn kind(&self) -> StageErrorKind {
        match self {
            StageError::TemplateBinding { .. } => StageErrorKind::TemplateBinding,
            StageError::SchemaViolation { .. } => StageErrorKind::SchemaViolation,
            StageError::Timeout { .. } => StageErrorKind::Timeout,
            StageError::Transport { .. } => StageErrorKind::Transport,
            StageError::Cancelled { .. } => StageErrorKind::Cancelled,
        }
    }

    /// Name of the stage that failed
    pub fn stage(&self) -> &str {
        match self {
            StageError::TemplateBinding { stage, .. }
            | StageError::SchemaViolation { stage, .. }
            | StageError::Timeout { stage, .. }
            | StageError::Transport { stage, .. }
            | StageError::Cancelled { stage } => stage,
        }
    }

    /// Re-attribute the error to another stage name.
    ///
    /// Generation backends only know the agent id; the executor relabels
    /// their errors with the stage it was running.
    pub fn for_stage(self, stage: impl Into<String>) -> Self {
        let stage = stage.into();
        match self {
            StageError::TemplateBinding { placeholder, .. } => {
                StageError::TemplateBinding { stage, placeholder }
            }
            StageError::SchemaViolation { reason, .. } => {
                StageError::SchemaViolation { stage, reason }
            }
            StageError::Timeout { timeout_ms, .. } => StageError::Timeout { stage, timeout_ms },
            StageError::Transport { message, .. } => StageError::Transport { stage, message },
            StageError::Cancelled { .. } => StageError::Cancelled { stage },
        }
    }
}

/// Failure of a whole orchestration run (no result set produced)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestrationError {
    /// The architect stage failed
    #[error(transparent)]
    Stage(#[from] StageError),

    /// The architect proposed fewer directions than there are engineers
    #[error("architect proposed {actual} direction(s) but {expected} engineer stage(s) are configured")]
    InsufficientDirections { expected: usize, actual: usize },

    /// The caller aborted the run before any result set existed
    #[error("run cancelled before completion")]
    Cancelled,

    /// Crew or coordinator configuration cannot drive a run
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OrchestrationError {
    /// The stage error kind behind this failure, if it came from a stage
    pub fn stage_kind(&self) -> Option<StageErrorKind> {
        match self {
            OrchestrationError::Stage(e) => Some(e.kind()),
            _ => None,
        }
    }
}
