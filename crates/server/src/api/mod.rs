//! # HTTP API
//!
//! Route groups mounted under `/api/v1`, plus the response and error types
//! they share.

pub mod config;
pub mod runs;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use promptcrew_core::{OrchestrationError, StageErrorKind};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.into(),
        })
    }
}

/// Error payload returned with every non-2xx response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Failure class, e.g. `StageTimeoutError` or `InsufficientDirections`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, kind: Option<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                kind,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error, None)
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error, None)
    }

    pub fn conflict(error: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, error, None)
    }

    pub fn internal(error: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", error);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", error), None)
    }
}

/// Body of a failed run, as stored in the run registry
pub fn error_body(error: &OrchestrationError) -> ErrorBody {
    ErrorBody {
        error: error.to_string(),
        kind: Some(error_kind(error)),
    }
}

fn error_kind(error: &OrchestrationError) -> String {
    match error {
        OrchestrationError::Stage(e) => e.kind().to_string(),
        OrchestrationError::InsufficientDirections { .. } => "InsufficientDirections".to_string(),
        OrchestrationError::Cancelled => "Cancelled".to_string(),
        OrchestrationError::InvalidConfig(_) => "InvalidConfig".to_string(),
    }
}

fn status_for(error: &OrchestrationError) -> StatusCode {
    match error.stage_kind() {
        Some(StageErrorKind::TemplateBinding) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(StageErrorKind::Timeout) => StatusCode::GATEWAY_TIMEOUT,
        Some(StageErrorKind::SchemaViolation | StageErrorKind::Transport) => {
            StatusCode::BAD_GATEWAY
        }
        Some(StageErrorKind::Cancelled) => StatusCode::CONFLICT,
        None => match error {
            OrchestrationError::InsufficientDirections { .. } => StatusCode::BAD_GATEWAY,
            OrchestrationError::Cancelled => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        },
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(error: OrchestrationError) -> Self {
        Self {
            status: status_for(&error),
            body: error_body(&error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptcrew_core::StageError;
    use std::time::Duration;

    #[test]
    fn test_stage_errors_map_to_gateway_statuses() {
        let timeout: ApiError =
            OrchestrationError::from(StageError::timeout("architect", Duration::from_secs(5)))
                .into();
        assert_eq!(timeout.status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.body.kind.as_deref(), Some("StageTimeoutError"));

        let schema: ApiError =
            OrchestrationError::from(StageError::schema_violation("architect", "bad")).into();
        assert_eq!(schema.status, StatusCode::BAD_GATEWAY);

        let binding: ApiError =
            OrchestrationError::from(StageError::template_binding("architect", "context"))
                .into();
        assert_eq!(binding.status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_run_level_errors() {
        let short: ApiError = OrchestrationError::InsufficientDirections {
            expected: 3,
            actual: 2,
        }
        .into();
        assert_eq!(short.status, StatusCode::BAD_GATEWAY);
        assert_eq!(short.body.kind.as_deref(), Some("InsufficientDirections"));

        let config: ApiError = OrchestrationError::InvalidConfig("x".to_string()).into();
        assert_eq!(config.status, StatusCode::BAD_REQUEST);

        let cancelled: ApiError = OrchestrationError::Cancelled.into();
        assert_eq!(cancelled.status, StatusCode::CONFLICT);
    }
}
