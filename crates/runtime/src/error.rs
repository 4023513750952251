//! Error types for the runtime façade

use common::{ErrorCode, Remediation};

/// Errors surfaced to the tool layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] common::Error),

    #[error("session is not active")]
    SessionInactive,

    #[error("no wallet loaded in session")]
    NoWallet,

    #[error("wallet storage is disabled")]
    StorageDisabled,

    #[error(transparent)]
    Policy(#[from] security_policy::Error),

    #[error(transparent)]
    Vault(#[from] credential_vault::Error),

    #[error(transparent)]
    Pool(#[from] client_pool::Error),
}

/// Result alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Remediation for Error {
    fn code(&self) -> ErrorCode {
        match self {
            Error::Config(e) => e.code(),
            Error::SessionInactive | Error::NoWallet | Error::StorageDisabled => {
                ErrorCode::Validation
            }
            Error::Policy(e) => e.code(),
            Error::Vault(e) => e.code(),
            Error::Pool(e) => e.code(),
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Error::Config(e) => e.suggestions(),
            Error::SessionInactive => vec!["Start a session first".into()],
            Error::NoWallet => vec!["Load or import a wallet first".into()],
            Error::StorageDisabled => {
                vec!["Set wallet_storage.enabled = true in the configuration".into()]
            }
            Error::Policy(e) => e.suggestions(),
            Error::Vault(e) => e.suggestions(),
            Error::Pool(e) => e.suggestions(),
        }
    }

    fn details(&self) -> serde_json::Value {
        match self {
            Error::Config(e) => e.details(),
            Error::Policy(e) => e.details(),
            Error::Vault(e) => e.details(),
            Error::Pool(e) => e.details(),
            _ => serde_json::Value::Null,
        }
    }
}
