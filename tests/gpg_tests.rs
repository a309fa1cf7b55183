// tests/gpg_tests.rs
//! gpg output parsing and engine setup; nothing here needs a gpg binary

use std::fs;
use std::path::PathBuf;

use pgp_encrypter::engine::{
    classify_failure, parse_colon_listing, parse_signatures, split_stderr, GpgOptions,
    StatusLine,
};
use pgp_encrypter::{
    resolve_signing_fingerprint, CoreError, EngineError, Fingerprint, GpgEngine, KeyringHome,
    OpenEngine,
};

const ALICE_FPR: &str = "AAAAAAAAAAAAAAAAAAAAAAAA1111111111111111";
const ALICE_SUB_FPR: &str = "BBBBBBBBBBBBBBBBBBBBBBBB2222222222222222";
const BOB_FPR: &str = "CCCCCCCCCCCCCCCCCCCCCCCC3333333333333333";
const BOB_SUB_FPR: &str = "DDDDDDDDDDDDDDDDDDDDDDDD4444444444444444";

/// One colon record with the given (index, value) fields set
fn record(fields: &[(usize, &str)]) -> String {
    let mut line = vec![""; 20];
    for &(i, value) in fields {
        line[i] = value;
    }
    line.join(":")
}

fn fpr(fingerprint: &str) -> String {
    record(&[(0, "fpr"), (9, fingerprint)])
}

/// Alice: secret key with an encryption subkey.
/// Bob: public key whose only encryption subkey is revoked.
fn sample_listing() -> String {
    [
        record(&[(0, "sec"), (1, "u"), (4, "1111111111111111"), (5, "1700000000"), (11, "scESC"), (14, "+")]),
        fpr(ALICE_FPR),
        record(&[(0, "uid"), (1, "u"), (5, "1700000000"), (9, "Alice Example (work) <alice@example.com>")]),
        record(&[(0, "ssb"), (1, "u"), (4, "2222222222222222"), (5, "1700000000"), (11, "e"), (14, "+")]),
        fpr(ALICE_SUB_FPR),
        record(&[(0, "pub"), (1, "f"), (4, "3333333333333333"), (5, "1700000000"), (6, "1900000000"), (11, "scSC")]),
        fpr(BOB_FPR),
        record(&[(0, "uid"), (1, "f"), (5, "1700000000"), (9, r"Bob \x3a Builder <bob@example.com>")]),
        record(&[(0, "sub"), (1, "r"), (4, "4444444444444444"), (5, "1700000000"), (11, "e")]),
        fpr(BOB_SUB_FPR),
    ]
    .join("\n")
}

#[test]
fn test_colon_listing_builds_records() {
    let records = parse_colon_listing(&sample_listing());
    assert_eq!(records.len(), 2);

    let alice = &records[0];
    assert_eq!(alice.fingerprint.as_str(), ALICE_FPR);
    assert!(alice.is_secret && alice.can_sign && alice.can_encrypt);
    assert_eq!(alice.uids[0].name, "Alice Example");
    assert_eq!(alice.uids[0].comment, "work");
    assert_eq!(alice.uids[0].email, "alice@example.com");
    assert_eq!(alice.subkeys.len(), 2);
    assert_eq!(alice.subkeys[0].fingerprint.as_str(), ALICE_FPR);
    assert!(alice.subkeys[0].can_certify && !alice.subkeys[0].can_encrypt);
    assert_eq!(alice.subkeys[1].fingerprint.as_str(), ALICE_SUB_FPR);
    assert_eq!(alice.subkeys[1].keyid, "2222222222222222");
    assert!(alice.subkeys[1].can_encrypt && alice.subkeys[1].is_secret);

    let bob = &records[1];
    assert_eq!(bob.fingerprint.as_str(), BOB_FPR);
    assert!(!bob.is_secret && !bob.can_encrypt);
    assert!(bob.subkeys[0].expires.is_some());
    assert_eq!(bob.uids[0].name, "Bob : Builder");
    assert!(bob.subkeys[1].revoked && !bob.subkeys[1].is_usable());
}

#[test]
fn test_listing_matches_identities() {
    let records = parse_colon_listing(&sample_listing());

    assert!(records[0].matches("alice@example.com"));
    assert!(records[0].matches("<ALICE@example.com>"));
    assert!(records[0].matches("0x1111111111111111"));
    assert!(records[0].matches(&ALICE_SUB_FPR.to_ascii_lowercase()));
    assert!(!records[0].matches("bob@example.com"));
    assert!(!records[0].matches(""));
}

#[test]
fn test_last_encryption_subkey_wins_even_when_revoked() {
    let records = parse_colon_listing(&sample_listing());
    assert_eq!(resolve_signing_fingerprint(&records), Some(Fingerprint::new(BOB_SUB_FPR)));

    // Alice alone resolves to her own subkey
    assert_eq!(
        resolve_signing_fingerprint(&records[..1]),
        Some(Fingerprint::new(ALICE_SUB_FPR))
    );
    assert_eq!(resolve_signing_fingerprint(&[]), None);
}

#[test]
fn test_keygrips_attach_to_their_key_lines() {
    let listing = [
        record(&[(0, "sec"), (1, "u"), (4, "1111111111111111"), (11, "scSC"), (14, "+")]),
        fpr(ALICE_FPR),
        record(&[(0, "grp"), (9, "0123456789abcdef0123456789abcdef01234567")]),
        record(&[(0, "uid"), (1, "u"), (9, "Alice Example <alice@example.com>")]),
        // a stray grp after a uid belongs to no key
        record(&[(0, "grp"), (9, "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF")]),
        record(&[(0, "ssb"), (1, "u"), (4, "2222222222222222"), (11, "e"), (14, "+")]),
        fpr(ALICE_SUB_FPR),
        record(&[(0, "grp"), (9, "89ABCDEF89ABCDEF89ABCDEF89ABCDEF89ABCDEF")]),
    ]
    .join("\n");
    let records = parse_colon_listing(&listing);

    assert_eq!(records.len(), 1);
    let subkeys = &records[0].subkeys;
    assert_eq!(
        subkeys[0].keygrip.as_deref(),
        Some("0123456789ABCDEF0123456789ABCDEF01234567")
    );
    assert_eq!(
        subkeys[1].keygrip.as_deref(),
        Some("89ABCDEF89ABCDEF89ABCDEF89ABCDEF89ABCDEF")
    );
    assert_eq!(subkeys[1].fingerprint.as_str(), ALICE_SUB_FPR);
}

#[test]
fn test_secret_stub_is_not_secret() {
    let listing = [
        record(&[(0, "sec"), (1, "u"), (4, "1111111111111111"), (11, "scSC"), (14, "#")]),
        fpr(ALICE_FPR),
    ]
    .join("\n");
    let records = parse_colon_listing(&listing);
    assert!(!records[0].is_secret);
}

#[test]
fn test_status_lines_are_split_from_messages() {
    let stderr = "[GNUPG:] KEY_CONSIDERED ABCD 0\ngpg: encrypted with cv25519 key\n[GNUPG:] DECRYPTION_OKAY\n";
    let (status, human) = split_stderr(stderr);

    assert_eq!(status.len(), 2);
    assert_eq!(status[0].keyword, "KEY_CONSIDERED");
    assert_eq!(status[0].args, vec!["ABCD", "0"]);
    assert_eq!(human, "gpg: encrypted with cv25519 key");
    assert_eq!(StatusLine::parse("gpg: not a status line"), None);
}

fn classify(stderr: &str) -> EngineError {
    let (status, human) = split_stderr(stderr);
    classify_failure(&status, 2, &human)
}

#[test]
fn test_failures_are_classified_from_status() {
    assert!(matches!(
        classify("[GNUPG:] BAD_PASSPHRASE 1111111111111111\ngpg: bad passphrase"),
        EngineError::BadPassphrase(id) if id == "1111111111111111"
    ));
    // GPG_ERR_BAD_PASSPHRASE carried in an ERROR line with a source prefix
    assert!(matches!(
        classify("[GNUPG:] ERROR pkdecrypt_failed 33554443"),
        EngineError::BadPassphrase(_)
    ));
    assert!(matches!(
        classify("[GNUPG:] INV_RECP 0 nobody@example.com"),
        EngineError::KeyNotFound(id) if id == "nobody@example.com"
    ));
    assert!(matches!(
        classify("[GNUPG:] INV_SGNR 9 alice@example.com"),
        EngineError::KeyNotFound(_)
    ));
    assert!(matches!(
        classify("[GNUPG:] NO_SECKEY 2222222222222222"),
        EngineError::NoSecretKey(id) if id == "2222222222222222"
    ));
    assert!(matches!(classify("[GNUPG:] NODATA 1"), EngineError::BadData(_)));
    assert!(matches!(
        classify("[GNUPG:] BEGIN_DECRYPTION\n[GNUPG:] DECRYPTION_FAILED"),
        EngineError::BadData(_)
    ));
}

#[test]
fn test_unrecognised_failure_keeps_stderr() {
    let err = classify("gpg: something unexpected\n");
    match err {
        EngineError::Gpg { code, stderr } => {
            assert_eq!(code, 2);
            assert_eq!(stderr, "gpg: something unexpected");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_signature_status_lines() {
    let stderr = format!(
        "[GNUPG:] VALIDSIG {ALICE_SUB_FPR} 2024-01-01 1704067200 0 4 0 22 10 00 {ALICE_FPR}\n\
         [GNUPG:] BADSIG 3333333333333333 Bob Builder <bob@example.com>\n"
    );
    let (status, _) = split_stderr(&stderr);
    let signatures = parse_signatures(&status);

    assert_eq!(signatures.len(), 2);
    assert!(signatures[0].valid);
    assert_eq!(signatures[0].fingerprint.as_str(), ALICE_SUB_FPR);
    assert_eq!(signatures[0].key_fingerprint.as_str(), ALICE_FPR);
    assert!(!signatures[1].valid);
    assert_eq!(signatures[1].fingerprint.as_str(), "3333333333333333");
}

#[test]
fn test_open_requires_key_database() {
    let dir = tempfile::tempdir().unwrap();
    let home = KeyringHome::new(dir.path()).unwrap();

    let result = GpgEngine::open(&home);
    assert!(matches!(result, Err(CoreError::EngineInitialization { .. })));
}

#[test]
fn test_open_fails_when_gpg_cannot_run() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pubring.kbx"), b"").unwrap();
    let home = KeyringHome::new(dir.path()).unwrap();

    let options = GpgOptions {
        program: PathBuf::from("/nonexistent/gpg"),
        ..GpgOptions::default()
    };
    match GpgEngine::open_with(&home, options) {
        Err(CoreError::EngineInitialization { home: path, reason }) => {
            assert_eq!(path, dir.path());
            assert!(reason.contains("/nonexistent/gpg"), "{reason}");
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("gpg should not be runnable"),
    }
}
