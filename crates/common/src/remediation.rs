//! Machine-readable error categories and remediation hints
//!
//! Every error surfaced to the tool layer carries a stable category code and a
//! list of human-readable suggestions. Transient categories (rate limits, pool
//! exhaustion) are flagged retryable; the substrate itself never retries.

use serde::Serialize;

/// Stable error category reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed caller input, detected before any state mutation
    Validation,
    /// Policy violation or failed cryptographic authentication
    Security,
    /// A named operation exhausted its call budget for the current window
    RateLimitExceeded,
    /// A network client could not be constructed
    Network,
    /// Waiting for a pooled client timed out
    ResourceExhausted,
    /// The pool was closed and refuses new acquisitions
    PoolClosed,
    /// Invalid or unreadable configuration
    Config,
    /// Encrypted wallet storage could not be read or written
    Storage,
}

impl ErrorCode {
    /// Wire label, e.g. `VALIDATION_ERROR`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "VALIDATION_ERROR",
            ErrorCode::Security => "SECURITY_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::Network => "NETWORK_ERROR",
            ErrorCode::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorCode::PoolClosed => "POOL_CLOSED",
            ErrorCode::Config => "CONFIG_ERROR",
            ErrorCode::Storage => "STORAGE_ERROR",
        }
    }

    /// Whether callers may retry after backing off.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCode::RateLimitExceeded | ErrorCode::ResourceExhausted | ErrorCode::Network
        )
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error report handed to the tool layer.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
    pub suggestions: Vec<String>,
}

/// Category and remediation hints for an error.
pub trait Remediation: std::error::Error {
    /// Machine-readable category.
    fn code(&self) -> ErrorCode;

    /// Human-readable next steps.
    fn suggestions(&self) -> Vec<String>;

    /// Structured context (amounts, limits, operation names). Null by default.
    fn details(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn is_retryable(&self) -> bool {
        self.code().is_transient()
    }

    fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code(),
            message: self.to_string(),
            details: self.details(),
            suggestions: self.suggestions(),
        }
    }
}
