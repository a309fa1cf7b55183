// src/engine/memory.rs
//! In-process keyring engine for tests and development
//!
//! Keys live in a [`MemoryKeyring`], optionally persisted as `keyring.toml`
//! inside a key-home. Envelopes are NOT OpenPGP: the payload is AES-Crypt v3
//! under a random session key, the session key is wrapped once per recipient
//! subkey, and signatures are BLAKE3 keyed MACs over the payload. Key
//! material is stored in the clear, so never point this at real secrets.

use std::fs;
use std::io::Cursor;

use aescrypt_rs::aliases::Password;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::{registration, OpenEngine, OpenPgpEngine};
use crate::aliases::{Passphrase, PlainText};
use crate::armor::{armor, dearmor};
use crate::consts::{
    FINGERPRINT_CONTEXT, FINGERPRINT_LEN, MEMORY_KEYRING_FILE, MEMORY_MESSAGE_LABEL,
    SESSION_KEY_KDF_ITERATIONS, SESSION_KEY_LEN, SIGNATURE_CONTEXT,
};
use crate::enums::ErrorMode;
use crate::error::{CoreError, EngineError, EngineResult, Result};
use crate::keyring::{
    DecryptedMessage, Fingerprint, KeyRecord, KeyringHome, SignatureStatus, SubkeyInfo, UserId,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySubkey {
    /// 32 bytes of hex key material
    pub material: String,
    #[serde(default)]
    pub can_encrypt: bool,
    #[serde(default)]
    pub can_sign: bool,
    #[serde(default)]
    pub revoked: bool,
}

impl MemorySubkey {
    pub fn generate(can_encrypt: bool, can_sign: bool) -> Self {
        let mut material = [0u8; SESSION_KEY_LEN];
        rand::rng().fill_bytes(&mut material);
        Self {
            material: hex::encode(material),
            can_encrypt,
            can_sign,
            revoked: false,
        }
    }

    pub fn fingerprint(&self) -> EngineResult<Fingerprint> {
        let derived = blake3::derive_key(FINGERPRINT_CONTEXT, &self.material_bytes()?);
        Ok(Fingerprint::new(hex::encode_upper(&derived[..FINGERPRINT_LEN])))
    }

    fn material_bytes(&self) -> EngineResult<Vec<u8>> {
        hex::decode(&self.material)
            .map_err(|e| EngineError::BadData(format!("invalid key material: {e}")))
    }

    fn mac(&self, payload: &[u8]) -> EngineResult<blake3::Hash> {
        let key = blake3::derive_key(SIGNATURE_CONTEXT, &self.material_bytes()?);
        Ok(blake3::keyed_hash(&key, payload))
    }
}

/// A key: `subkeys[0]` is the primary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryKey {
    pub uid: String,
    /// BLAKE3 of the passphrase; `None` for an unprotected key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passphrase_hash: Option<String>,
    #[serde(default = "secret_by_default")]
    pub secret_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    pub subkeys: Vec<MemorySubkey>,
}

fn secret_by_default() -> bool {
    true
}

impl MemoryKey {
    /// New key with a sign-only primary; an empty passphrase leaves it unprotected
    pub fn new(uid: &str, passphrase: &str) -> Self {
        Self {
            uid: uid.to_string(),
            passphrase_hash: (!passphrase.is_empty())
                .then(|| blake3::hash(passphrase.as_bytes()).to_hex().to_string()),
            secret_available: true,
            created: Some(Utc::now()),
            subkeys: vec![MemorySubkey::generate(false, true)],
        }
    }

    pub fn with_encryption_subkey(mut self) -> Self {
        self.subkeys.push(MemorySubkey::generate(true, false));
        self
    }

    pub fn with_signing_subkey(mut self) -> Self {
        self.subkeys.push(MemorySubkey::generate(false, true));
        self
    }

    /// Let the primary key encrypt as well
    pub fn encrypting_primary(mut self) -> Self {
        if let Some(primary) = self.subkeys.first_mut() {
            primary.can_encrypt = true;
        }
        self
    }

    /// Drop the secret half: the key can still be encrypted to
    pub fn public_only(mut self) -> Self {
        self.secret_available = false;
        self
    }

    pub fn fingerprint(&self) -> EngineResult<Fingerprint> {
        self.subkeys
            .first()
            .ok_or_else(|| EngineError::BadData(format!("key `{}` has no primary", self.uid)))?
            .fingerprint()
    }

    pub fn record(&self) -> EngineResult<KeyRecord> {
        let subkeys = self
            .subkeys
            .iter()
            .enumerate()
            .map(|(i, sub)| {
                let fingerprint = sub.fingerprint()?;
                Ok(SubkeyInfo {
                    keyid: fingerprint.key_id().to_string(),
                    keygrip: None,
                    fingerprint,
                    can_encrypt: sub.can_encrypt,
                    can_sign: sub.can_sign,
                    can_certify: i == 0,
                    can_authenticate: false,
                    revoked: sub.revoked,
                    expired: false,
                    invalid: false,
                    is_secret: self.secret_available,
                    timestamp: self.created,
                    expires: None,
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(KeyRecord {
            fingerprint: self.fingerprint()?,
            disabled: false,
            expired: false,
            revoked: subkeys.first().is_some_and(|p| p.revoked),
            is_secret: self.secret_available,
            can_sign: subkeys.iter().any(|s| s.can_sign && s.is_usable()),
            can_encrypt: subkeys.iter().any(|s| s.can_encrypt && s.is_usable()),
            uids: vec![UserId::parse(&self.uid)],
            subkeys,
        })
    }

    fn unlock(&self, passphrase: Option<&Passphrase>) -> EngineResult<()> {
        let Some(expected) = &self.passphrase_hash else {
            return Ok(());
        };
        let given = passphrase.map(|p| p.expose_secret().as_str()).unwrap_or("");
        let ok = blake3::Hash::from_hex(expected)
            .map(|h| h == blake3::hash(given.as_bytes()))
            .unwrap_or(false);
        if ok {
            Ok(())
        } else {
            Err(EngineError::BadPassphrase(self.fingerprint()?.to_string()))
        }
    }

    fn encryption_subkey(&self) -> Option<&MemorySubkey> {
        self.subkeys.iter().rev().find(|s| s.can_encrypt && !s.revoked)
    }

    fn signing_subkey(&self) -> Option<&MemorySubkey> {
        self.subkeys.iter().rev().find(|s| s.can_sign && !s.revoked)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryKeyring {
    #[serde(default)]
    pub keys: Vec<MemoryKey>,
}

impl MemoryKeyring {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: MemoryKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn add(&mut self, key: MemoryKey) {
        self.keys.push(key);
    }

    /// Read `keyring.toml` from a key-home
    pub fn load(home: &KeyringHome) -> Result<Self> {
        let path = home.path().join(MEMORY_KEYRING_FILE);
        let content = fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Write `keyring.toml` into a key-home
    pub fn save(&self, home: &KeyringHome) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CoreError::Config(format!("cannot serialize keyring: {e}")))?;
        fs::write(home.path().join(MEMORY_KEYRING_FILE), content)?;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct WrappedSessionKey {
    fingerprint: Fingerprint,
    key: String,
}

#[derive(Serialize, Deserialize)]
struct EnvelopeSignature {
    signer: Fingerprint,
    key: Fingerprint,
    mac: String,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    recipients: Vec<WrappedSessionKey>,
    payload: String,
    #[serde(default)]
    signatures: Vec<EnvelopeSignature>,
}

pub struct MemoryEngine {
    keyring: MemoryKeyring,
    error_mode: ErrorMode,
    // indices into keyring.keys
    encrypt_keys: Vec<usize>,
    sign_keys: Vec<(usize, Passphrase)>,
    decrypt_keys: Vec<(usize, Passphrase)>,
}

impl MemoryEngine {
    pub fn new(keyring: MemoryKeyring) -> Self {
        Self {
            keyring,
            error_mode: ErrorMode::default(),
            encrypt_keys: Vec::new(),
            sign_keys: Vec::new(),
            decrypt_keys: Vec::new(),
        }
    }

    pub fn keyring(&self) -> &MemoryKeyring {
        &self.keyring
    }

    fn records(&self) -> EngineResult<Vec<KeyRecord>> {
        self.keyring.keys.iter().map(MemoryKey::record).collect()
    }

    /// Indices of keys matching `identity`, in keyring order
    fn matching(&self, identity: &str) -> EngineResult<Vec<usize>> {
        Ok(self
            .records()?
            .iter()
            .enumerate()
            .filter(|(_, r)| r.matches(identity))
            .map(|(i, _)| i)
            .collect())
    }

    fn find_encryption_key(&self, identity: &str) -> EngineResult<usize> {
        self.matching(identity)?
            .into_iter()
            .find(|&i| self.keyring.keys[i].encryption_subkey().is_some())
            .ok_or_else(|| EngineError::KeyNotFound(identity.to_string()))
    }

    fn find_secret_key(&self, identity: &str, signing: bool) -> EngineResult<usize> {
        let candidates = self.matching(identity)?;
        if candidates.is_empty() {
            return Err(EngineError::KeyNotFound(identity.to_string()));
        }
        let secret: Vec<usize> = candidates
            .into_iter()
            .filter(|&i| self.keyring.keys[i].secret_available)
            .collect();
        if secret.is_empty() {
            return Err(EngineError::NoSecretKey(identity.to_string()));
        }
        secret
            .into_iter()
            .find(|&i| !signing || self.keyring.keys[i].signing_subkey().is_some())
            .ok_or_else(|| EngineError::KeyNotFound(identity.to_string()))
    }

    fn seal(&self, data: &[u8], sign: bool) -> EngineResult<Vec<u8>> {
        if self.encrypt_keys.is_empty() {
            return Err(EngineError::NoRecipients);
        }
        if sign && self.sign_keys.is_empty() {
            return Err(EngineError::NoSigners);
        }

        let mut session = [0u8; SESSION_KEY_LEN];
        rand::rng().fill_bytes(&mut session);
        let session_hex = hex::encode(session);
        let payload = aes_encrypt(data, &session_hex)?;

        let mut recipients = Vec::with_capacity(self.encrypt_keys.len());
        for &idx in &self.encrypt_keys {
            let key = &self.keyring.keys[idx];
            let sub = key
                .encryption_subkey()
                .ok_or_else(|| EngineError::KeyNotFound(key.uid.clone()))?;
            let wrapped = aes_encrypt(session_hex.as_bytes(), &sub.material)?;
            recipients.push(WrappedSessionKey {
                fingerprint: sub.fingerprint()?,
                key: STANDARD.encode(wrapped),
            });
        }

        let mut signatures = Vec::new();
        if sign {
            for (idx, passphrase) in &self.sign_keys {
                let key = &self.keyring.keys[*idx];
                key.unlock(Some(passphrase))?;
                let sub = key
                    .signing_subkey()
                    .ok_or_else(|| EngineError::KeyNotFound(key.uid.clone()))?;
                signatures.push(EnvelopeSignature {
                    signer: sub.fingerprint()?,
                    key: key.fingerprint()?,
                    mac: sub.mac(&payload)?.to_hex().to_string(),
                });
            }
        }

        let envelope = Envelope {
            recipients,
            payload: STANDARD.encode(payload),
            signatures,
        };
        let json = serde_json::to_vec(&envelope)
            .map_err(|e| EngineError::Cipher(format!("cannot encode envelope: {e}")))?;
        Ok(armor(MEMORY_MESSAGE_LABEL, &json).into_bytes())
    }

    fn subkey_by_fingerprint(&self, wanted: &Fingerprint) -> EngineResult<Option<&MemorySubkey>> {
        for key in &self.keyring.keys {
            for sub in &key.subkeys {
                if &sub.fingerprint()? == wanted {
                    return Ok(Some(sub));
                }
            }
        }
        Ok(None)
    }

    fn verify(&self, envelope: &Envelope, payload: &[u8]) -> EngineResult<Vec<SignatureStatus>> {
        let mut statuses = Vec::with_capacity(envelope.signatures.len());
        for sig in &envelope.signatures {
            let valid = match self.subkey_by_fingerprint(&sig.signer)? {
                Some(sub) if sub.can_sign => {
                    let expected = sub.mac(payload)?;
                    // blake3::Hash compares in constant time
                    blake3::Hash::from_hex(&sig.mac)
                        .map(|mac| mac == expected)
                        .unwrap_or(false)
                }
                _ => false,
            };
            statuses.push(SignatureStatus {
                fingerprint: sig.signer.clone(),
                key_fingerprint: sig.key.clone(),
                valid,
            });
        }
        Ok(statuses)
    }
}

fn aes_encrypt(data: &[u8], password_hex: &str) -> EngineResult<Vec<u8>> {
    let password = Password::new(password_hex.to_string());
    let mut out = Vec::new();
    aescrypt_rs::encrypt(
        Cursor::new(data),
        &mut out,
        &password,
        SESSION_KEY_KDF_ITERATIONS,
    )
    .map_err(|e| EngineError::Cipher(e.to_string()))?;
    Ok(out)
}

fn aes_decrypt(data: &[u8], password_hex: &str) -> EngineResult<Vec<u8>> {
    let password = Password::new(password_hex.to_string());
    let mut out = Vec::new();
    aescrypt_rs::decrypt(Cursor::new(data), &mut out, &password)
        .map_err(|e| EngineError::BadData(e.to_string()))?;
    Ok(out)
}

fn decode_b64(value: &str) -> EngineResult<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| EngineError::BadData(format!("invalid base64: {e}")))
}

impl OpenEngine for MemoryEngine {
    fn open(home: &KeyringHome) -> Result<Self> {
        home.require_any(&[MEMORY_KEYRING_FILE])?;
        let keyring = MemoryKeyring::load(home)
            .map_err(|e| CoreError::init(home.path(), e.to_string()))?;
        // surface corrupt key material now rather than on first use
        for key in &keyring.keys {
            key.record()
                .map_err(|e| CoreError::init(home.path(), e.to_string()))?;
        }
        tracing::debug!(home = %home.path().display(), keys = keyring.keys.len(), "memory engine ready");
        Ok(Self::new(keyring))
    }
}

impl OpenPgpEngine for MemoryEngine {
    fn set_error_mode(&mut self, mode: ErrorMode) {
        self.error_mode = mode;
    }

    fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    fn add_encryption_key(&mut self, identity: &str) -> EngineResult<()> {
        let result = self
            .find_encryption_key(identity)
            .map(|idx| self.encrypt_keys.push(idx));
        registration(self.error_mode, identity, result)
    }

    fn add_signing_key(&mut self, identity: &str, passphrase: &Passphrase) -> EngineResult<()> {
        let result = self
            .find_secret_key(identity, true)
            .map(|idx| self.sign_keys.push((idx, passphrase.clone())));
        registration(self.error_mode, identity, result)
    }

    fn add_decryption_key(
        &mut self,
        identity: &str,
        passphrase: &Passphrase,
    ) -> EngineResult<()> {
        let result = self
            .find_secret_key(identity, false)
            .map(|idx| self.decrypt_keys.push((idx, passphrase.clone())));
        registration(self.error_mode, identity, result)
    }

    fn clear_encryption_keys(&mut self) {
        self.encrypt_keys.clear();
    }

    fn clear_signing_keys(&mut self) {
        self.sign_keys.clear();
    }

    fn clear_decryption_keys(&mut self) {
        self.decrypt_keys.clear();
    }

    fn encrypt(&mut self, data: &[u8]) -> EngineResult<Vec<u8>> {
        self.seal(data, false)
    }

    fn encrypt_sign(&mut self, data: &[u8]) -> EngineResult<Vec<u8>> {
        self.seal(data, true)
    }

    fn decrypt_verify(&mut self, data: &[u8]) -> EngineResult<DecryptedMessage> {
        let json = dearmor(MEMORY_MESSAGE_LABEL, data)?;
        let envelope: Envelope = serde_json::from_slice(&json)
            .map_err(|e| EngineError::BadData(format!("invalid envelope: {e}")))?;
        let payload = decode_b64(&envelope.payload)?;

        // Without registrations, fall back to unprotected secret keys
        let candidates: Vec<(usize, Option<&Passphrase>)> = if self.decrypt_keys.is_empty() {
            (0..self.keyring.keys.len())
                .filter(|&i| {
                    let key = &self.keyring.keys[i];
                    key.secret_available && key.passphrase_hash.is_none()
                })
                .map(|i| (i, None))
                .collect()
        } else {
            self.decrypt_keys.iter().map(|(i, p)| (*i, Some(p))).collect()
        };

        let mut failure = None;
        for (idx, passphrase) in candidates {
            let key = &self.keyring.keys[idx];
            for sub in &key.subkeys {
                let fingerprint = sub.fingerprint()?;
                let Some(wrapped) = envelope
                    .recipients
                    .iter()
                    .find(|w| w.fingerprint == fingerprint)
                else {
                    continue;
                };
                if let Err(e) = key.unlock(passphrase) {
                    failure = Some(e);
                    break;
                }

                let session = aes_decrypt(&decode_b64(&wrapped.key)?, &sub.material)?;
                let session_hex = String::from_utf8(session)
                    .map_err(|_| EngineError::BadData("corrupt session key".into()))?;
                let plaintext = aes_decrypt(&payload, &session_hex)?;

                return Ok(DecryptedMessage {
                    signatures: self.verify(&envelope, &payload)?,
                    plaintext: PlainText::new(plaintext),
                });
            }
        }

        Err(failure.unwrap_or_else(|| {
            let wanted = envelope
                .recipients
                .first()
                .map(|w| w.fingerprint.to_string())
                .unwrap_or_default();
            EngineError::NoSecretKey(wanted)
        }))
    }

    fn key_info(&mut self, pattern: &str) -> EngineResult<Vec<KeyRecord>> {
        let pattern = pattern.trim();
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| pattern.is_empty() || r.matches(pattern))
            .collect())
    }
}
