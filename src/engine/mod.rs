// src/engine/mod.rs
//! OpenPGP engine abstraction
//!
//! An engine is a stateful handle bound to one key-home: keys are registered
//! for encryption, signing or decryption, then a crypto call consumes the
//! registrations. [`GpgEngine`] drives the system `gpg`; [`MemoryEngine`]
//! keeps its keyring in process.

mod colons;
mod gpg;
mod memory;
mod status;

pub use colons::parse_colon_listing;
pub use gpg::{GpgEngine, GpgOptions};
pub use memory::{MemoryEngine, MemoryKey, MemoryKeyring, MemorySubkey};
pub use status::{classify_failure, parse_signatures, split_stderr, StatusLine};

use crate::aliases::{Passphrase, PlainText};
use crate::enums::ErrorMode;
use crate::error::{EngineResult, Result};
use crate::keyring::{DecryptedMessage, KeyRecord, KeyringHome};

pub trait OpenPgpEngine {
    fn set_error_mode(&mut self, mode: ErrorMode);

    fn error_mode(&self) -> ErrorMode;

    fn add_encryption_key(&mut self, identity: &str) -> EngineResult<()>;

    fn add_signing_key(&mut self, identity: &str, passphrase: &Passphrase) -> EngineResult<()>;

    fn add_decryption_key(&mut self, identity: &str, passphrase: &Passphrase)
        -> EngineResult<()>;

    fn clear_encryption_keys(&mut self);

    fn clear_signing_keys(&mut self);

    fn clear_decryption_keys(&mut self);

    /// Encrypt to every registered encryption key
    fn encrypt(&mut self, data: &[u8]) -> EngineResult<Vec<u8>>;

    /// Encrypt to every registered encryption key and sign with every signing key
    fn encrypt_sign(&mut self, data: &[u8]) -> EngineResult<Vec<u8>>;

    fn decrypt(&mut self, data: &[u8]) -> EngineResult<PlainText> {
        self.decrypt_verify(data).map(|m| m.plaintext)
    }

    /// Decrypt and report every signature found on the message
    fn decrypt_verify(&mut self, data: &[u8]) -> EngineResult<DecryptedMessage>;

    /// List keys matching `pattern`; an empty pattern lists the whole keyring
    fn key_info(&mut self, pattern: &str) -> EngineResult<Vec<KeyRecord>>;
}

/// Engine factory: one fresh handle per key-home
pub trait OpenEngine: OpenPgpEngine + Sized {
    fn open(home: &KeyringHome) -> Result<Self>;
}

/// Apply `mode` to the outcome of a key registration
pub(crate) fn registration(mode: ErrorMode, identity: &str, result: EngineResult<()>) -> EngineResult<()> {
    match (mode, result) {
        (_, Ok(())) => Ok(()),
        (ErrorMode::Raise, Err(e)) => Err(e),
        (ErrorMode::Warn, Err(e)) => {
            tracing::warn!(identity, error = %e, "skipping unusable key");
            Ok(())
        }
        (ErrorMode::Silent, Err(_)) => Ok(()),
    }
}
