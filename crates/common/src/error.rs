//! Configuration error types

use thiserror::Error;

use crate::remediation::{ErrorCode, Remediation};

/// Errors raised while loading and validating runtime configuration
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using common Error
pub type Result<T> = std::result::Result<T, Error>;

impl Remediation for Error {
    fn code(&self) -> ErrorCode {
        ErrorCode::Config
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Error::Config(_) => vec!["Fix the reported configuration value".into()],
            Error::Io(_) => vec![
                "Check that the configuration file exists and is readable".into(),
                "Pass --config or set CONFIG_PATH".into(),
            ],
            Error::Toml(_) => vec!["Check the configuration file for TOML syntax errors".into()],
        }
    }
}
