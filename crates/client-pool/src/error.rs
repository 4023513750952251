//! Error types for the client pool

use std::time::Duration;

use common::{ErrorCode, Remediation};

/// Errors from pool construction, client creation and acquisition.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to create network client: {0}")]
    Network(String),

    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "no client available within {}s (max_connections={max_connections})",
        timeout.as_secs_f64()
    )]
    ResourceExhausted {
        max_connections: usize,
        timeout: Duration,
    },

    #[error("client pool is closed")]
    PoolClosed,
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Remediation for Error {
    fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidConfig(_) => ErrorCode::Validation,
            Error::Network(_) | Error::Request { .. } => ErrorCode::Network,
            Error::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            Error::PoolClosed => ErrorCode::PoolClosed,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Error::InvalidConfig(_) => vec!["Set max_connections to at least 1".into()],
            Error::Network(_) | Error::Request { .. } => vec![
                "Check network connectivity".into(),
                "Verify the LCD endpoint URL".into(),
            ],
            Error::ResourceExhausted { .. } => vec![
                "Back off and retry".into(),
                "Increase max_connections".into(),
            ],
            Error::PoolClosed => vec!["Restart the runtime to reopen the pool".into()],
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            Error::ResourceExhausted {
                max_connections,
                timeout,
            } => serde_json::json!({
                "max_connections": max_connections,
                "timeout": timeout.as_secs_f64(),
            }),
            Error::Request { endpoint, .. } => serde_json::json!({ "endpoint": endpoint }),
            _ => serde_json::Value::Null,
        }
    }
}
