//! Error types for vault and wallet storage operations

use common::{ErrorCode, Remediation};

/// Errors from credential vault operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("failed to decrypt data: invalid password or corrupted data")]
    DecryptionFailed,

    #[error("encrypted data is malformed: {0}")]
    Malformed(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("wallet storage error: {0}")]
    Storage(String),

    #[error("wallet not found: {0}")]
    NotFound(String),
}

/// Result alias for vault operations.
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
            Error::Validation { .. } | Error::NotFound(_) => ErrorCode::Validation,
            Error::DecryptionFailed | Error::Malformed(_) | Error::Encryption(_) => {
                ErrorCode::Security
            }
            Error::Storage(_) => ErrorCode::Storage,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Error::Validation { field, .. } => vec![format!("Provide a valid {field}")],
            Error::DecryptionFailed => vec![
                "Use the correct password".into(),
                "Check that the encrypted data is not corrupted".into(),
            ],
            Error::Malformed(_) => vec![
                "Verify the encrypted data is valid".into(),
                "Check that the data was encrypted by this vault".into(),
            ],
            Error::Encryption(_) => vec!["Check the wallet data format".into()],
            Error::Storage(_) => vec![
                "Check that the wallet storage directory is writable".into(),
            ],
            Error::NotFound(_) => vec!["List stored wallets and use an existing id".into()],
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            Error::Validation { field, .. } => serde_json::json!({ "field": field }),
            Error::DecryptionFailed => serde_json::json!({ "reason": "invalid_token" }),
            _ => serde_json::Value::Null,
        }
    }
}
