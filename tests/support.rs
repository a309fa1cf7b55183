// tests/support.rs
//! Test fixtures: key-homes backed by the in-memory engine

use std::sync::{Arc, Mutex};

use pgp_encrypter::engine::{MemoryKey, MemoryKeyring};
use pgp_encrypter::{EncryptionService, ErrorLogger, KeyringHome, MemoryEngine, Passphrase};
use tempfile::TempDir;

pub const PASSPHRASE: &str = "correct horse battery staple";
pub const ALICE: &str = "Alice Example <alice@example.com>";
#[allow(dead_code)]
pub const BOB: &str = "Bob Builder <bob@example.com>";

pub type MemoryService = EncryptionService<MemoryEngine, RecordingLogger>;

/// Logger that remembers every message; clones share one buffer
#[derive(Clone, Default)]
pub struct RecordingLogger(Arc<Mutex<Vec<String>>>);

impl ErrorLogger for RecordingLogger {
    fn log_error(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

#[allow(dead_code)]
impl RecordingLogger {
    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// Temporary key-home holding a saved `keyring.toml`
pub struct Fixture {
    #[allow(dead_code)] // keeps the directory alive
    pub dir: TempDir,
    pub home: KeyringHome,
    pub keyring: MemoryKeyring,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new(keyring: MemoryKeyring) -> Self {
        let dir = tempfile::tempdir().expect("create temp key-home");
        let home = KeyringHome::new(dir.path()).expect("temp dir is a directory");
        keyring.save(&home).expect("save keyring");
        Self { dir, home, keyring }
    }

    /// One protected key with a sign-only primary and an encryption subkey
    pub fn alice() -> Self {
        Self::new(MemoryKeyring::new().with_key(MemoryKey::new(ALICE, PASSPHRASE).with_encryption_subkey()))
    }

    pub fn service(&self, recipient: &str, passphrase: &str) -> (MemoryService, RecordingLogger) {
        let logger = RecordingLogger::default();
        let service = EncryptionService::new(
            recipient,
            Passphrase::new(passphrase.to_string()),
            self.home.path(),
            logger.clone(),
        )
        .expect("open memory-backed service");
        (service, logger)
    }
}
