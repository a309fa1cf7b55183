// tests/config_tests.rs
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use pgp_encrypter::config::Config;
use pgp_encrypter::consts::{ENV_KEYRING_HOME, ENV_PASSPHRASE, ENV_RECIPIENT};
use pgp_encrypter::{CoreError, EncryptionService, ErrorKind, Passphrase, TracingLogger};

const FULL: &str = r#"
[encrypter]
recipient = "alice@example.com"
passphrase = "correct horse battery staple"
keyring_home = "/srv/mail/.gnupg"

[gpg]
program = "/usr/local/bin/gpg2"
armor = false
"#;

#[test]
fn test_full_config_parses() {
    let config = Config::from_toml_str(FULL).unwrap();

    assert_eq!(config.encrypter.recipient, "alice@example.com");
    assert!(config.encrypter.has_passphrase());
    assert_eq!(
        config.encrypter.passphrase().expose_secret(),
        "correct horse battery staple"
    );
    assert_eq!(config.encrypter.keyring_home, PathBuf::from("/srv/mail/.gnupg"));
    assert_eq!(config.gpg.program, PathBuf::from("/usr/local/bin/gpg2"));
    assert!(!config.gpg.armor);

    let options = config.gpg.options();
    assert_eq!(options.program, Path::new("/usr/local/bin/gpg2"));
    assert!(!options.armor);
    config.validate().unwrap();
}

#[test]
fn test_empty_config_uses_defaults() {
    let config = Config::from_toml_str("").unwrap();

    assert!(config.encrypter.recipient.is_empty());
    assert!(!config.encrypter.has_passphrase());
    assert!(!config.encrypter.keyring_home.as_os_str().is_empty());
    assert_eq!(config.gpg.program, PathBuf::from("gpg"));
    assert_eq!(config.gpg.connect_agent, PathBuf::from("gpg-connect-agent"));
    assert!(config.gpg.armor);
}

#[test]
fn test_prompted_passphrase_is_kept_verbatim() {
    let mut config = Config::from_toml_str(FULL).unwrap();
    config
        .encrypter
        .set_passphrase(Passphrase::new("  spaced out  ".to_string()));

    assert_eq!(config.encrypter.passphrase().expose_secret(), "  spaced out  ");
    assert!(config.encrypter.has_passphrase());
}

#[test]
fn test_overrides_replace_file_values() {
    let mut config = Config::from_toml_str(FULL).unwrap();
    let env: HashMap<&str, &str> = HashMap::from([
        (ENV_RECIPIENT, "bob@example.com"),
        (ENV_PASSPHRASE, ""),
        (ENV_KEYRING_HOME, "/tmp/bob-keys"),
    ]);

    config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.encrypter.recipient, "bob@example.com");
    assert!(!config.encrypter.has_passphrase());
    assert_eq!(config.encrypter.keyring_home, PathBuf::from("/tmp/bob-keys"));
}

#[test]
fn test_empty_home_override_is_ignored() {
    let mut config = Config::from_toml_str(FULL).unwrap();
    config.apply_overrides(|key| (key == ENV_KEYRING_HOME).then(String::new));

    assert_eq!(config.encrypter.keyring_home, PathBuf::from("/srv/mail/.gnupg"));
    assert_eq!(config.encrypter.recipient, "alice@example.com");
}

#[test]
fn test_missing_recipient_fails_validation() {
    let config = Config::from_toml_str("[encrypter]\nrecipient = \"  \"\n").unwrap();

    let err = config.validate().unwrap_err();
    assert!(matches!(err, CoreError::Config(_)));
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[test]
fn test_debug_output_hides_passphrase() {
    let config = Config::from_toml_str(FULL).unwrap();
    let debug = format!("{config:?}");

    assert!(debug.contains("alice@example.com"));
    assert!(!debug.contains("correct horse"));
}

#[test]
fn test_invalid_toml_is_reported() {
    let err = Config::from_toml_str("[encrypter\nrecipient = ").unwrap_err();
    assert!(matches!(err, CoreError::Toml(_)));
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encrypter.toml");
    std::fs::write(&path, FULL).unwrap();

    let config = Config::from_file(&path).unwrap();
    assert_eq!(config.encrypter.recipient, "alice@example.com");

    let missing = Config::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, CoreError::Io(_)));
}

#[test]
fn test_from_config_rejects_missing_home() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::from_toml_str(FULL).unwrap();
    config.encrypter.keyring_home = dir.path().join("no-such-home");

    let err = EncryptionService::from_config(&config, TracingLogger).unwrap_err();
    assert!(matches!(err, CoreError::EngineInitialization { .. }));
    assert_eq!(err.kind(), ErrorKind::EngineInitialization);
}

#[test]
fn test_from_config_rejects_home_without_keyring() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::from_toml_str(FULL).unwrap();
    config.encrypter.keyring_home = dir.path().to_path_buf();

    let err = EncryptionService::from_config(&config, TracingLogger).unwrap_err();
    assert!(matches!(err, CoreError::EngineInitialization { .. }));
}

#[test]
fn test_from_config_rejects_empty_recipient() {
    let config = Config::default();
    let err = EncryptionService::from_config(&config, TracingLogger).unwrap_err();
    assert!(matches!(err, CoreError::InvalidRecipient));
}
