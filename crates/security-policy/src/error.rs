//! Error types for policy enforcement

use std::time::Duration;

use common::{ErrorCode, Remediation};

/// Errors from rate limiting, spending policy and wallet encryption.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("amount {amount} exceeds spending limit of {limit}")]
    SpendingLimitExceeded { amount: i64, limit: i64 },

    #[error(
        "rate limit exceeded for '{operation}': {calls}/{limit} calls in {}s window",
        window.as_secs_f64()
    )]
    RateLimitExceeded {
        operation: String,
        calls: usize,
        limit: usize,
        window: Duration,
    },

    #[error(transparent)]
    Vault(#[from] credential_vault::Error),
}

/// Result alias for policy operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }
}

impl Remediation for Error {
    fn code(&self) -> ErrorCode {
        match self {
            Error::Validation { .. } => ErrorCode::Validation,
            Error::SpendingLimitExceeded { .. } => ErrorCode::Security,
            Error::RateLimitExceeded { .. } => ErrorCode::RateLimitExceeded,
            Error::Vault(e) => e.code(),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Error::Validation { field, .. } => vec![format!("Provide a valid {field}")],
            Error::SpendingLimitExceeded { limit, .. } => vec![
                format!("Reduce amount to {limit} or less"),
                "Increase spending limit if authorized".into(),
            ],
            Error::RateLimitExceeded { window, .. } => vec![
                format!("Back off and retry after {}s", window.as_secs_f64()),
            ],
            Error::Vault(e) => e.suggestions(),
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            Error::Validation { field, .. } => serde_json::json!({ "field": field }),
            Error::SpendingLimitExceeded { amount, limit } => serde_json::json!({
                "field": "amount",
                "amount": amount,
                "limit": limit,
                "excess": amount.saturating_sub(*limit),
            }),
            Error::RateLimitExceeded {
                operation,
                calls,
                limit,
                window,
            } => serde_json::json!({
                "operation": operation,
                "calls": calls,
                "limit": limit,
                "time_window": window.as_secs_f64(),
            }),
            Error::Vault(e) => e.details(),
        }
    }
}
