// src/consts.rs
//! Shared constants: file names, env vars and format parameters

/// Default gpg executable, resolved through `PATH`
pub const DEFAULT_GPG_PROGRAM: &str = "gpg";

/// Talks to gpg-agent when cached passphrases must be dropped
pub const DEFAULT_CONNECT_AGENT_PROGRAM: &str = "gpg-connect-agent";

/// Key databases that mark a directory as a GnuPG home
pub const GPG_KEYRING_FILES: &[&str] = &["pubring.kbx", "pubring.gpg"];

/// Key database of the in-memory engine
pub const MEMORY_KEYRING_FILE: &str = "keyring.toml";

/// Config file used when `PGP_ENCRYPTER_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "encrypter.toml";

pub const ENV_CONFIG: &str = "PGP_ENCRYPTER_CONFIG";
pub const ENV_RECIPIENT: &str = "PGP_ENCRYPTER_RECIPIENT";
pub const ENV_PASSPHRASE: &str = "PGP_ENCRYPTER_PASSPHRASE";
pub const ENV_KEYRING_HOME: &str = "PGP_ENCRYPTER_KEYRING_HOME";

/// Read (never written) to find the default key-home
pub const ENV_GNUPGHOME: &str = "GNUPGHOME";

/// Armor label of real OpenPGP messages
pub const PGP_MESSAGE_LABEL: &str = "PGP MESSAGE";

/// Armor label of in-memory engine envelopes
pub const MEMORY_MESSAGE_LABEL: &str = "PGP-ENCRYPTER MESSAGE";

/// Base64 line width inside an armor block
pub const ARMOR_LINE_WIDTH: usize = 64;

/// KDF iterations for AES-Crypt v3 under 256-bit random session keys
// Keys are uniformly random, so stretching buys nothing
pub const SESSION_KEY_KDF_ITERATIONS: u32 = 1;

/// Session key length of the in-memory envelope
pub const SESSION_KEY_LEN: usize = 32;

/// Length of a memory-engine fingerprint in bytes (matches OpenPGP v4)
pub const FINGERPRINT_LEN: usize = 20;

/// Hex digits of a fingerprint that form the long key id
pub const KEY_ID_HEX_LEN: usize = 16;

pub(crate) const FINGERPRINT_CONTEXT: &str = "pgp-encrypter 2025 memory-engine fingerprint";
pub(crate) const SIGNATURE_CONTEXT: &str = "pgp-encrypter 2025 memory-engine signature";
