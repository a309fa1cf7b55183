// src/error.rs
//! Public error types for the entire crate

use std::path::PathBuf;

use thiserror::Error;

use crate::enums::ErrorKind;

pub type Result<T> = std::result::Result<T, CoreError>;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures reported by an OpenPGP engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no usable key matches `{0}`")]
    KeyNotFound(String),

    #[error("no secret key available for `{0}`")]
    NoSecretKey(String),

    #[error("bad passphrase for `{0}`")]
    BadPassphrase(String),

    #[error("no encryption key registered")]
    NoRecipients,

    #[error("no signing key registered")]
    NoSigners,

    #[error("malformed message: {0}")]
    BadData(String),

    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("gpg failed (exit {code}): {stderr}")]
    Gpg { code: i32, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("cannot open keyring at {}: {reason}", home.display())]
    EngineInitialization { home: PathBuf, reason: String },

    #[error("recipient must not be empty")]
    InvalidRecipient,

    #[error("key resolution failed: {0}")]
    KeyResolution(EngineError),

    #[error("crypto operation failed: {0}")]
    CryptoOperation(EngineError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub(crate) fn init(home: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CoreError::EngineInitialization {
            home: home.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::EngineInitialization { .. } | CoreError::InvalidRecipient => {
                ErrorKind::EngineInitialization
            }
            CoreError::KeyResolution(_) => ErrorKind::KeyResolution,
            CoreError::CryptoOperation(_) => ErrorKind::CryptoOperation,
            CoreError::Config(_) | CoreError::Toml(_) | CoreError::Io(_) => ErrorKind::Config,
        }
    }

    /// The engine rejected the passphrase (as opposed to any other failure)
    pub fn is_bad_passphrase(&self) -> bool {
        matches!(
            self,
            CoreError::KeyResolution(EngineError::BadPassphrase(_))
                | CoreError::CryptoOperation(EngineError::BadPassphrase(_))
        )
    }

    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            CoreError::KeyResolution(e) | CoreError::CryptoOperation(e) => Some(e),
            _ => None,
        }
    }
}
