// src/engine/status.rs
//! gpg machine-readable status output (`--status-fd`)

use crate::error::EngineError;
use crate::keyring::{Fingerprint, SignatureStatus};

const STATUS_PREFIX: &str = "[GNUPG:] ";

// libgpg-error codes (low 16 bits of the value in `ERROR` lines)
const GPG_ERR_NO_PUBKEY: u32 = 9;
const GPG_ERR_BAD_PASSPHRASE: u32 = 11;
const GPG_ERR_NO_SECKEY: u32 = 17;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub keyword: String,
    pub args: Vec<String>,
}

impl StatusLine {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix(STATUS_PREFIX)?;
        let mut parts = rest.split(' ');
        let keyword = parts.next().filter(|k| !k.is_empty())?.to_string();
        Some(Self {
            keyword,
            args: parts.map(str::to_string).collect(),
        })
    }

    fn arg(&self, i: usize) -> &str {
        self.args.get(i).map(String::as_str).unwrap_or("")
    }

    fn error_code(&self) -> Option<u32> {
        match self.keyword.as_str() {
            "ERROR" | "FAILURE" => self.args.last()?.parse::<u32>().ok().map(|c| c & 0xFFFF),
            _ => None,
        }
    }
}

/// Split gpg stderr into status lines and the human-readable remainder
pub fn split_stderr(stderr: &str) -> (Vec<StatusLine>, String) {
    let mut status = Vec::new();
    let mut human = Vec::new();
    for line in stderr.lines() {
        match StatusLine::parse(line) {
            Some(s) => status.push(s),
            None => human.push(line),
        }
    }
    (status, human.join("\n"))
}

/// Turn a failed gpg run into the most specific engine error
pub fn classify_failure(status: &[StatusLine], code: i32, stderr: &str) -> EngineError {
    let find = |kw: &str| status.iter().find(|s| s.keyword == kw);
    let error_code = |wanted: u32| status.iter().find(|s| s.error_code() == Some(wanted));

    if let Some(s) = find("BAD_PASSPHRASE") {
        return EngineError::BadPassphrase(s.arg(0).to_string());
    }
    if let Some(s) = error_code(GPG_ERR_BAD_PASSPHRASE) {
        return EngineError::BadPassphrase(s.arg(0).to_string());
    }
    if let Some(s) = find("INV_RECP").or_else(|| find("INV_SGNR")) {
        return EngineError::KeyNotFound(s.arg(1).to_string());
    }
    if let Some(s) = error_code(GPG_ERR_NO_PUBKEY) {
        return EngineError::KeyNotFound(s.arg(0).to_string());
    }
    if let Some(s) = find("NO_SECKEY") {
        return EngineError::NoSecretKey(s.arg(0).to_string());
    }
    if let Some(s) = error_code(GPG_ERR_NO_SECKEY) {
        return EngineError::NoSecretKey(s.arg(0).to_string());
    }
    if find("NODATA").is_some() {
        return EngineError::BadData("no valid OpenPGP data found".into());
    }
    if find("DECRYPTION_FAILED").is_some() {
        return EngineError::BadData("decryption failed".into());
    }
    EngineError::Gpg {
        code,
        stderr: stderr.trim().to_string(),
    }
}

/// Signature verdicts from `VALIDSIG` / `BADSIG` / `ERRSIG` lines
pub fn parse_signatures(status: &[StatusLine]) -> Vec<SignatureStatus> {
    status
        .iter()
        .filter_map(|s| match s.keyword.as_str() {
            "VALIDSIG" => {
                let fingerprint = Fingerprint::new(s.arg(0));
                let primary = s.arg(9);
                let key_fingerprint = if primary.is_empty() {
                    fingerprint.clone()
                } else {
                    Fingerprint::new(primary)
                };
                Some(SignatureStatus {
                    fingerprint,
                    key_fingerprint,
                    valid: true,
                })
            }
            "BADSIG" | "ERRSIG" => {
                let keyid = Fingerprint::new(s.arg(0));
                Some(SignatureStatus {
                    fingerprint: keyid.clone(),
                    key_fingerprint: keyid,
                    valid: false,
                })
            }
            _ => None,
        })
        .collect()
}
