// src/keyring.rs
//! Keyring vocabulary shared by every engine
//!
//! Key-home paths, fingerprints and the key listing records returned by
//! [`crate::engine::OpenPgpEngine::key_info`].

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aliases::PlainText;
use crate::error::{CoreError, Result};

/// Directory holding the key database an engine operates against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyringHome(PathBuf);

impl KeyringHome {
    /// Accepts only an existing directory
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(CoreError::init(path, "not an existing directory"));
        }
        Ok(Self(path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Fails unless at least one of `files` exists inside the home
    pub fn require_any(&self, files: &[&str]) -> Result<PathBuf> {
        files
            .iter()
            .map(|name| self.0.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                CoreError::init(
                    &self.0,
                    format!("no key database found (expected one of {})", files.join(", ")),
                )
            })
    }
}

impl AsRef<Path> for KeyringHome {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Upper-case hex identifier of a key or subkey
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hex: impl AsRef<str>) -> Self {
        Self(hex.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Long key id: the trailing 16 hex digits
    pub fn key_id(&self) -> &str {
        let len = self.0.len();
        &self.0[len.saturating_sub(crate::consts::KEY_ID_HEX_LEN)..]
    }

    /// Case-insensitive match against a fingerprint, key id or `0x` key id
    pub fn matches(&self, identity: &str) -> bool {
        let wanted = identity.trim().trim_start_matches("0x").to_ascii_uppercase();
        !wanted.is_empty() && (self.0 == wanted || self.key_id() == wanted)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserId {
    pub uid: String,
    pub name: String,
    pub comment: String,
    pub email: String,
    pub revoked: bool,
    pub invalid: bool,
}

impl UserId {
    /// Splits `Name (comment) <email>`; missing parts stay empty
    pub fn parse(uid: &str) -> Self {
        let mut rest = uid.trim();
        let mut email = String::new();
        if let (Some(open), true) = (rest.rfind('<'), rest.ends_with('>')) {
            email = rest[open + 1..rest.len() - 1].trim().to_string();
            rest = rest[..open].trim_end();
        }
        let mut comment = String::new();
        if let (Some(open), true) = (rest.rfind('('), rest.ends_with(')')) {
            comment = rest[open + 1..rest.len() - 1].trim().to_string();
            rest = rest[..open].trim_end();
        }
        Self {
            uid: uid.to_string(),
            name: rest.to_string(),
            comment,
            email,
            revoked: false,
            invalid: false,
        }
    }

    /// Case-insensitive match on the email or any fragment of the user id
    pub fn matches(&self, identity: &str) -> bool {
        let wanted = identity.trim().trim_matches(|c| c == '<' || c == '>');
        if wanted.is_empty() {
            return false;
        }
        self.email.eq_ignore_ascii_case(wanted)
            || self
                .uid
                .to_ascii_lowercase()
                .contains(&wanted.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubkeyInfo {
    pub fingerprint: Fingerprint,
    pub keyid: String,
    /// gpg-agent handle of the secret part, when the engine reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keygrip: Option<String>,
    pub can_encrypt: bool,
    pub can_sign: bool,
    pub can_certify: bool,
    pub can_authenticate: bool,
    pub revoked: bool,
    pub expired: bool,
    pub invalid: bool,
    pub is_secret: bool,
    pub timestamp: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

impl SubkeyInfo {
    pub fn is_usable(&self) -> bool {
        !(self.revoked || self.expired || self.invalid)
    }
}

/// One key of a listing; the primary key is `subkeys[0]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub fingerprint: Fingerprint,
    pub disabled: bool,
    pub expired: bool,
    pub revoked: bool,
    pub is_secret: bool,
    pub can_sign: bool,
    pub can_encrypt: bool,
    pub uids: Vec<UserId>,
    pub subkeys: Vec<SubkeyInfo>,
}

impl KeyRecord {
    /// Fingerprint, key id, subkey id or user-id match
    pub fn matches(&self, identity: &str) -> bool {
        self.fingerprint.matches(identity)
            || self.subkeys.iter().any(|s| s.fingerprint.matches(identity))
            || self.uids.iter().any(|u| u.matches(identity))
    }
}

/// Last encryption-capable subkey across the whole listing
///
/// Every record and subkey is visited and the last hit wins. The result is
/// not checked against any recipient, so a keyring holding several
/// encryption-capable keys yields whichever was listed last.
pub fn resolve_signing_fingerprint(records: &[KeyRecord]) -> Option<Fingerprint> {
    let mut fingerprint = None;
    for record in records {
        for subkey in &record.subkeys {
            if subkey.can_encrypt {
                fingerprint = Some(subkey.fingerprint.clone());
            }
        }
    }
    fingerprint
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureStatus {
    /// Key or subkey that made the signature
    pub fingerprint: Fingerprint,
    /// Primary key owning `fingerprint`
    pub key_fingerprint: Fingerprint,
    pub valid: bool,
}

/// Plaintext together with the signatures found on the message
pub struct DecryptedMessage {
    pub plaintext: PlainText,
    pub signatures: Vec<SignatureStatus>,
}

impl DecryptedMessage {
    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// True when some valid signature was made by `fingerprint` or its primary key
    pub fn is_signed_by(&self, fingerprint: &Fingerprint) -> bool {
        self.signatures.iter().any(|s| {
            s.valid && (&s.fingerprint == fingerprint || &s.key_fingerprint == fingerprint)
        })
    }

    /// True when some valid signature was made by any part of `key`
    pub fn is_signed_by_key(&self, key: &KeyRecord) -> bool {
        std::iter::once(&key.fingerprint)
            .chain(key.subkeys.iter().map(|s| &s.fingerprint))
            .any(|fpr| self.is_signed_by(fpr))
    }
}
