// tests/gpg_live_tests.rs
//! End-to-end runs against a real gpg, using a throwaway key-home
//!
//! Every test skips when `gpg` or `gpg-connect-agent` is not on `PATH`.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::process::{Command, Output, Stdio};

use pgp_encrypter::armor::is_pgp_message;
use pgp_encrypter::engine::parse_colon_listing;
use pgp_encrypter::{CoreError, EncryptionService, EngineError, GpgEngine, Passphrase};
use tempfile::TempDir;

mod common;
mod support;
use support::{RecordingLogger, PASSPHRASE};

const ALICE: &str = "Alice Example <alice@example.com>";
const ALICE_EMAIL: &str = "alice@example.com";

type GpgService = EncryptionService<GpgEngine, RecordingLogger>;

fn on_path(program: &str) -> bool {
    Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Key-home holding one protected key: sign-only primary plus an encryption subkey
struct GpgHome {
    dir: TempDir,
}

impl GpgHome {
    fn create() -> Option<Self> {
        if !on_path("gpg") || !on_path("gpg-connect-agent") {
            eprintln!("gpg not available, skipping");
            return None;
        }
        let dir = tempfile::Builder::new()
            .prefix("pgpenc-")
            .tempdir()
            .expect("create gpg home");
        std::fs::set_permissions(dir.path(), std::fs::Permissions::from_mode(0o700))
            .expect("restrict gpg home");
        let home = Self { dir };

        home.gpg_ok(&["--quick-gen-key", ALICE, "ed25519", "sign", "never"]);
        let listing = home.gpg_ok(&["--with-colons", "--list-keys"]);
        let records = parse_colon_listing(&String::from_utf8_lossy(&listing.stdout));
        let primary = records[0].fingerprint.to_string();
        home.gpg_ok(&["--quick-add-key", &primary, "cv25519", "encr", "never"]);

        Some(home)
    }

    fn gpg_ok(&self, args: &[&str]) -> Output {
        let output = Command::new("gpg")
            .arg("--homedir")
            .arg(self.dir.path())
            .args(["--batch", "--pinentry-mode", "loopback", "--passphrase", PASSPHRASE])
            .args(args)
            .stdin(Stdio::null())
            .output()
            .expect("run gpg");
        assert!(
            output.status.success(),
            "gpg {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        output
    }

    fn service(&self, passphrase: &str) -> (GpgService, RecordingLogger) {
        let logger = RecordingLogger::default();
        let service = EncryptionService::new(
            ALICE_EMAIL,
            Passphrase::new(passphrase.to_string()),
            self.dir.path(),
            logger.clone(),
        )
        .expect("open gpg-backed service");
        (service, logger)
    }
}

impl Drop for GpgHome {
    fn drop(&mut self) {
        let _ = Command::new("gpgconf")
            .arg("--homedir")
            .arg(self.dir.path())
            .args(["--kill", "gpg-agent"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}

#[test]
fn test_gpg_unsigned_roundtrip() {
    common::setup();
    let Some(gpg) = GpgHome::create() else { return };
    let (mut sender, sender_log) = gpg.service("");
    let (mut receiver, receiver_log) = gpg.service(PASSPHRASE);

    let ciphertext = sender.encrypt(b"Attack at dawn!").unwrap();
    assert!(is_pgp_message(&ciphertext));

    let message = receiver.decrypt_verified(&ciphertext).unwrap();
    assert_eq!(message.plaintext.expose_secret(), b"Attack at dawn!");
    assert!(!message.is_signed());
    assert_eq!(sender_log.count(), 0);
    assert_eq!(receiver_log.count(), 0);
}

#[test]
fn test_gpg_signed_roundtrip_verifies_against_resolved_key() {
    common::setup();
    let Some(gpg) = GpgHome::create() else { return };
    let (mut service, log) = gpg.service(PASSPHRASE);

    let ciphertext = service.encrypt(b"signed and sealed").unwrap();
    let message = service.decrypt_verified(&ciphertext).unwrap();
    assert_eq!(message.plaintext.expose_secret(), b"signed and sealed");

    // resolves to the encryption subkey; gpg signs with the key that owns it
    let resolved = service.signing_fingerprint().unwrap();
    let key = service.key_info(ALICE_EMAIL).unwrap().remove(0);
    assert!(key
        .subkeys
        .iter()
        .any(|s| s.fingerprint == resolved && s.can_encrypt));

    assert!(message.is_signed());
    assert!(message.signatures.iter().all(|s| s.valid));
    assert!(message.is_signed_by(&key.fingerprint));
    assert_eq!(log.count(), 0);
}

#[test]
fn test_gpg_wrong_passphrase_fails_after_good_call() {
    common::setup();
    let Some(gpg) = GpgHome::create() else { return };
    let (mut good, good_log) = gpg.service(PASSPHRASE);
    let (mut bad, bad_log) = gpg.service("not the passphrase");

    let ciphertext = good.encrypt(b"for alice only").unwrap();
    good.decrypt(&ciphertext).unwrap();

    let err = bad.decrypt(&ciphertext).err().expect("decryption must fail");
    assert!(err.is_bad_passphrase(), "{err}");
    assert_eq!(bad_log.count(), 1);

    assert!(bad.encrypt(b"forged").is_err());
    assert_eq!(bad_log.count(), 2);

    // the right passphrase still works afterwards
    let plaintext = good.decrypt(&ciphertext).unwrap();
    assert_eq!(plaintext.expose_secret(), b"for alice only");
    assert_eq!(good_log.count(), 0);
}

#[test]
fn test_gpg_rejects_non_pgp_input() {
    let Some(gpg) = GpgHome::create() else { return };
    let (mut service, log) = gpg.service(PASSPHRASE);

    let err = service.decrypt(b"just some text").err().expect("decryption must fail");
    assert!(matches!(err, CoreError::CryptoOperation(EngineError::BadData(_))));
    assert_eq!(log.count(), 1);
}
