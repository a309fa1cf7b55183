// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for the small `#[derive(...)]` enums that callers match
//! on: engine error modes and the error taxonomy.

use serde::{Deserialize, Serialize};

/// How an engine reports failed key registrations
///
/// Crypto calls always return `Err` on failure; the mode only decides
/// whether registering an unusable key fails right away or is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Skip unusable keys without a trace
    Silent,
    /// Skip unusable keys and emit a `tracing` warning
    #[default]
    Warn,
    /// Return every failure immediately
    Raise,
}

/// Coarse classification of [`crate::CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ErrorKind {
    EngineInitialization,
    KeyResolution,
    CryptoOperation,
    Config,
}
