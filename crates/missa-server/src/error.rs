//! Error handling for the REST API server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use missa_core::MissaError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// API error type.
#[derive(Debug, Error)]
#[error("[{status}] {code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    // Common error constructors
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

// Convert from missa-core errors
impl From<MissaError> for ApiError {
    fn from(err: MissaError) -> Self {
        let status = match &err {
            MissaError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ if err.is_rule_violation() => StatusCode::UNPROCESSABLE_ENTITY,
            MissaError::StaleState { .. } => StatusCode::CONFLICT,
            MissaError::InvalidDate { .. }
            | MissaError::InvalidEnum { .. }
            | MissaError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MissaError::Configuration(_) => StatusCode::BAD_REQUEST,
            // Storage, parse and internal failures
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut details = serde_json::Map::new();
        if let MissaError::QuotaExceeded {
            current_usage,
            limit,
            ..
        } = &err
        {
            details.insert("current_usage".into(), json!(current_usage));
            details.insert("limit".into(), json!(limit));
        }
        if let Some(suggestion) = err.suggestion() {
            details.insert("suggestion".into(), json!(suggestion));
        }
        if err.is_retryable() {
            details.insert("retryable".into(), json!(true));
        }

        let api = ApiError::new(status, err.code().as_str(), err.to_string());
        if details.is_empty() {
            api
        } else {
            api.with_details(serde_json::Value::Object(details))
        }
    }
}

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violations_map_to_422() {
        for err in [
            MissaError::already_fulfilled("done"),
            MissaError::exhausted("none left"),
            MissaError::paused("paused"),
            MissaError::quota_exceeded(3, 3),
        ] {
            assert_eq!(ApiError::from(err).status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn test_not_found_and_stale() {
        let not_found = ApiError::from(MissaError::not_found("abc"));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.code, "INT_001");

        let stale = ApiError::from(MissaError::stale("moved"));
        assert_eq!(stale.status, StatusCode::CONFLICT);
        assert_eq!(stale.details.unwrap()["retryable"], json!(true));
    }

    #[test]
    fn test_quota_details() {
        let err = ApiError::from(MissaError::quota_exceeded(3, 3));
        assert_eq!(err.code, "QTA_001");
        let details = err.details.unwrap();
        assert_eq!(details["current_usage"], json!(3));
        assert_eq!(details["limit"], json!(3));
    }

    #[test]
    fn test_storage_errors_are_internal() {
        let err = ApiError::from(MissaError::database("disk full"));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
