// src/service.rs
//! EncryptionService: one recipient, one key-home, one engine handle
//!
//! Callers see plain encrypt / decrypt. Behind them the service registers
//! the recipient with the engine, picks a signing key when a passphrase is
//! configured, and routes every runtime failure through the logger before
//! handing it back as a typed error.

use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::aliases::{Passphrase, PlainText};
use crate::config::Config;
use crate::engine::{GpgEngine, OpenEngine, OpenPgpEngine};
use crate::enums::ErrorMode;
use crate::error::{CoreError, EngineError, Result};
use crate::keyring::{resolve_signing_fingerprint, DecryptedMessage, Fingerprint, KeyRecord, KeyringHome};
use crate::logger::{ErrorLogger, TracingLogger};

pub struct EncryptionService<E = GpgEngine, L = TracingLogger> {
    recipient: String,
    passphrase: Passphrase,
    home: Option<KeyringHome>,
    logger: L,
    engine: E,
}

impl<E: OpenEngine, L: ErrorLogger> EncryptionService<E, L> {
    /// Open a fresh engine bound to `keyring_home`
    ///
    /// Construction failures are returned, never logged: a missing or
    /// unusable keyring is a deployment error, not a runtime one.
    pub fn new(
        recipient: &str,
        passphrase: Passphrase,
        keyring_home: impl AsRef<Path>,
        logger: L,
    ) -> Result<Self> {
        check_recipient(recipient)?;
        let home = KeyringHome::new(keyring_home)?;
        let engine = E::open(&home)?;
        let mut service = Self::with_engine(engine, recipient, passphrase, logger)?;
        service.home = Some(home);
        Ok(service)
    }
}

impl<L: ErrorLogger> EncryptionService<GpgEngine, L> {
    /// gpg-backed service from loaded configuration
    pub fn from_config(config: &Config, logger: L) -> Result<Self> {
        let settings = &config.encrypter;
        check_recipient(&settings.recipient)?;
        let home = KeyringHome::new(&settings.keyring_home)?;
        let engine = GpgEngine::open_with(&home, config.gpg.options())?;
        let mut service =
            Self::with_engine(engine, &settings.recipient, settings.passphrase(), logger)?;
        service.home = Some(home);
        Ok(service)
    }
}

impl<E: OpenPgpEngine, L: ErrorLogger> EncryptionService<E, L> {
    /// Wrap an engine that is already bound to its keyring
    pub fn with_engine(
        mut engine: E,
        recipient: &str,
        passphrase: Passphrase,
        logger: L,
    ) -> Result<Self> {
        check_recipient(recipient)?;
        engine.set_error_mode(ErrorMode::Raise);
        Ok(Self {
            recipient: recipient.trim().to_string(),
            passphrase,
            home: None,
            logger,
            engine,
        })
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Key-home the engine was opened on, if the service opened it
    pub fn keyring_home(&self) -> Option<&KeyringHome> {
        self.home.as_ref()
    }

    /// A non-empty passphrase turns every `encrypt` into encrypt-and-sign
    pub fn signs_messages(&self) -> bool {
        !self.passphrase.expose_secret().is_empty()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Encrypt to the recipient, signing too when a passphrase is configured
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let result = self.try_encrypt(plaintext);
        self.contain(result)
    }

    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<PlainText> {
        let result = self.try_decrypt(ciphertext).map(|m| m.plaintext);
        self.contain(result)
    }

    /// Decrypt and report the signatures carried by the message
    pub fn decrypt_verified(&mut self, ciphertext: &[u8]) -> Result<DecryptedMessage> {
        let result = self.try_decrypt(ciphertext);
        self.contain(result)
    }

    /// Fingerprint `encrypt` signs with; see [`resolve_signing_fingerprint`]
    pub fn signing_fingerprint(&mut self) -> Result<Fingerprint> {
        let result = self.try_signing_fingerprint();
        self.contain(result)
    }

    pub fn key_info(&mut self, pattern: &str) -> Result<Vec<KeyRecord>> {
        let result = self
            .engine
            .key_info(pattern)
            .map_err(CoreError::KeyResolution);
        self.contain(result)
    }

    fn try_encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.engine.clear_encryption_keys();
        self.engine.clear_signing_keys();
        self.engine
            .add_encryption_key(&self.recipient)
            .map_err(CoreError::KeyResolution)?;

        if !self.signs_messages() {
            debug!(recipient = %self.recipient, bytes = plaintext.len(), "encrypting");
            return self
                .engine
                .encrypt(plaintext)
                .map_err(CoreError::CryptoOperation);
        }

        let signer = self.try_signing_fingerprint()?;
        self.engine
            .add_signing_key(signer.as_str(), &self.passphrase)
            .map_err(CoreError::KeyResolution)?;
        debug!(
            recipient = %self.recipient,
            signer = %signer,
            bytes = plaintext.len(),
            "encrypting and signing"
        );
        self.engine
            .encrypt_sign(plaintext)
            .map_err(CoreError::CryptoOperation)
    }

    fn try_decrypt(&mut self, ciphertext: &[u8]) -> Result<DecryptedMessage> {
        self.engine.clear_decryption_keys();
        self.engine
            .add_decryption_key(&self.recipient, &self.passphrase)
            .map_err(CoreError::KeyResolution)?;
        debug!(recipient = %self.recipient, bytes = ciphertext.len(), "decrypting");
        self.engine
            .decrypt_verify(ciphertext)
            .map_err(CoreError::CryptoOperation)
    }

    fn try_signing_fingerprint(&mut self) -> Result<Fingerprint> {
        let records = self.engine.key_info("").map_err(CoreError::KeyResolution)?;
        resolve_signing_fingerprint(&records).ok_or_else(|| {
            CoreError::KeyResolution(EngineError::KeyNotFound(
                "any encryption-capable subkey".into(),
            ))
        })
    }

    /// Log a failure once, then hand it back unchanged
    fn contain<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.logger.log_error(&e.to_string());
        }
        result
    }
}

impl<E, L> fmt::Debug for EncryptionService<E, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncryptionService")
            .field("recipient", &self.recipient)
            .field("passphrase", &"<redacted>")
            .field("home", &self.home)
            .finish_non_exhaustive()
    }
}

fn check_recipient(recipient: &str) -> Result<()> {
    if recipient.trim().is_empty() {
        return Err(CoreError::InvalidRecipient);
    }
    Ok(())
}
