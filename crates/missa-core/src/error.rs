//! Error types for missa operations.
//!
//! Business-rule violations (quota, exhaustion, double fulfillment) are
//! distinct variants so callers can show them to the holder, while
//! `StaleState` is the only kind a caller should retry after re-reading.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for missa operations.
pub type MissaResult<T> = Result<T, MissaError>;

/// Main error type for all missa operations.
#[derive(Error, Debug)]
pub enum MissaError {
    /// Intention (or other addressed record) does not exist for this holder.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        intention_id: Option<String>,
    },

    /// A Fixed-Date or Special intention has already been celebrated.
    #[error("Already fulfilled: {message}")]
    AlreadyFulfilled { message: String, code: ErrorCode },

    /// A Bulk intention has no remaining masses.
    #[error("Exhausted: {message}")]
    Exhausted { message: String, code: ErrorCode },

    /// A Bulk intention is paused.
    #[error("Paused: {message}")]
    Paused { message: String, code: ErrorCode },

    /// The monthly Personal limit has been reached.
    #[error("Quota exceeded: {message}")]
    QuotaExceeded {
        message: String,
        code: ErrorCode,
        current_usage: u32,
        limit: u32,
    },

    /// The intention changed between read and write.
    #[error("Stale state: {message}")]
    StaleState { message: String, code: ErrorCode },

    /// A date failed to parse or fell outside the accepted range.
    #[error("Invalid date: {message}")]
    InvalidDate { message: String, code: ErrorCode },

    /// An enumerated value (type or source) was not recognized.
    #[error("Invalid value: {message}")]
    InvalidEnum {
        message: String,
        code: ErrorCode,
        field: String,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        code: ErrorCode,
        suggestion: Option<String>,
    },

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Parse error for persisted data.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Intention (INT_xxx)
    IntNotFound,
    IntAlreadyFulfilled,
    IntExhausted,
    IntPaused,
    IntStaleState,

    // Quota (QTA_xxx)
    QtaPersonalExceeded,

    // Validation (VAL_xxx)
    ValInvalidInput,
    ValMissingField,
    ValInvalidDate,
    ValInvalidEnum,

    // Database (DB_xxx)
    DbOperationFailed,

    // Parse (PARSE_xxx)
    ParseInvalidRecord,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::IntNotFound => "INT_001",
            ErrorCode::IntAlreadyFulfilled => "INT_002",
            ErrorCode::IntExhausted => "INT_003",
            ErrorCode::IntPaused => "INT_004",
            ErrorCode::IntStaleState => "INT_005",
            ErrorCode::QtaPersonalExceeded => "QTA_001",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::ValMissingField => "VAL_002",
            ErrorCode::ValInvalidDate => "VAL_003",
            ErrorCode::ValInvalidEnum => "VAL_004",
            ErrorCode::DbOperationFailed => "DB_001",
            ErrorCode::ParseInvalidRecord => "PARSE_001",
            ErrorCode::Internal => "INT_999",
        }
    }
}

impl MissaError {
    /// Create a not found error for an intention.
    pub fn not_found(intention_id: impl Into<String>) -> Self {
        let id = intention_id.into();
        Self::NotFound {
            message: format!("Intention with id '{}' not found", id),
            code: ErrorCode::IntNotFound,
            intention_id: Some(id),
        }
    }

    /// Create an already-fulfilled error.
    pub fn already_fulfilled(message: impl Into<String>) -> Self {
        Self::AlreadyFulfilled {
            message: message.into(),
            code: ErrorCode::IntAlreadyFulfilled,
        }
    }

    /// Create an exhausted error.
    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::Exhausted {
            message: message.into(),
            code: ErrorCode::IntExhausted,
        }
    }

    /// Create a paused error.
    pub fn paused(message: impl Into<String>) -> Self {
        Self::Paused {
            message: message.into(),
            code: ErrorCode::IntPaused,
        }
    }

    /// Create a quota exceeded error.
    pub fn quota_exceeded(current_usage: u32, limit: u32) -> Self {
        Self::QuotaExceeded {
            message: format!(
                "{} of {} personal masses already celebrated this month",
                current_usage, limit
            ),
            code: ErrorCode::QtaPersonalExceeded,
            current_usage,
            limit,
        }
    }

    /// Create a stale state error.
    pub fn stale(message: impl Into<String>) -> Self {
        Self::StaleState {
            message: message.into(),
            code: ErrorCode::IntStaleState,
        }
    }

    /// Create an invalid date error.
    pub fn invalid_date(message: impl Into<String>) -> Self {
        Self::InvalidDate {
            message: message.into(),
            code: ErrorCode::ValInvalidDate,
        }
    }

    /// Create an invalid enum error.
    pub fn invalid_enum(field: impl Into<String>, value: impl AsRef<str>) -> Self {
        let field = field.into();
        Self::InvalidEnum {
            message: format!("unrecognized {} '{}'", field, value.as_ref()),
            code: ErrorCode::ValInvalidEnum,
            field,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            suggestion: None,
        }
    }

    /// Create a validation error for a missing field.
    pub fn missing_field(field: &str) -> Self {
        Self::Validation {
            message: format!("missing required field '{}'", field),
            code: ErrorCode::ValMissingField,
            suggestion: None,
        }
    }

    /// Create a validation error with suggestion.
    pub fn validation_with_suggestion(
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
            suggestion: Some(suggestion.into()),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidRecord,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { code, .. } => *code,
            Self::AlreadyFulfilled { code, .. } => *code,
            Self::Exhausted { code, .. } => *code,
            Self::Paused { code, .. } => *code,
            Self::QuotaExceeded { code, .. } => *code,
            Self::StaleState { code, .. } => *code,
            Self::InvalidDate { code, .. } => *code,
            Self::InvalidEnum { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            Self::Configuration(_) => ErrorCode::ValInvalidInput,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether the caller should re-read current state and retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleState { .. })
    }

    /// Whether this is a business-rule violation to be shown to the holder.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyFulfilled { .. }
                | Self::Exhausted { .. }
                | Self::Paused { .. }
                | Self::QuotaExceeded { .. }
        )
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NotFound { .. } => Some("Please check the intention ID and ensure it exists"),
            Self::Paused { .. } => Some("Resume the bulk intention before recording celebrations"),
            Self::QuotaExceeded { .. } => {
                Some("Personal masses are limited per calendar month; choose another month")
            }
            Self::StaleState { .. } => Some("Re-read the intention and retry"),
            Self::Validation { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for MissaError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for MissaError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("lock poisoned: {}", err))
    }
}
