// src/lib.rs
//! pgp-encrypter: encrypt and decrypt through an OpenPGP keyring
//!
//! Features:
//! - One recipient, one key-home, one engine handle per service
//! - Encrypt-and-sign whenever a passphrase is configured
//! - Key-home passed to the engine explicitly (never via `GNUPGHOME`)
//! - Failures logged once and returned as typed errors
//! - gpg and in-memory engines behind one trait

pub mod aliases;
pub mod armor;
pub mod config;
pub mod consts;
pub mod engine;
pub mod enums;
pub mod error;
pub mod file_ops;
pub mod keyring;
pub mod logger;
pub mod service;

// Re-export everything users need at the crate root
pub use aliases::{Passphrase, PlainText};
pub use config::load as load_config;
pub use engine::{GpgEngine, MemoryEngine, OpenEngine, OpenPgpEngine};
pub use enums::{ErrorKind, ErrorMode};
pub use error::{CoreError, EngineError, Result as CoreResult};
pub use keyring::{resolve_signing_fingerprint, DecryptedMessage, Fingerprint, KeyRecord, KeyringHome};
pub use logger::{ErrorLogger, TracingLogger};
pub use service::EncryptionService;
