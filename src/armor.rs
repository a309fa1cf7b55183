// src/armor.rs
//! ASCII armor helpers
//!
//! Base64 bodies wrapped in `-----BEGIN <label>-----` / `-----END <label>-----`
//! lines, plus detection of real OpenPGP messages.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::consts::{ARMOR_LINE_WIDTH, PGP_MESSAGE_LABEL};
use crate::error::{EngineError, EngineResult};

/// OpenPGP packet tags that can start an encrypted message
// PKESK, SKESK, one-pass signature, compressed, SEIPD (old and new formats)
const BINARY_MESSAGE_TAGS: &[u8] = &[1, 3, 4, 8, 18];

pub fn armor(label: &str, data: &[u8]) -> String {
    let body = STANDARD.encode(data);
    let mut out = format!("-----BEGIN {label}-----\n\n");
    for chunk in body.as_bytes().chunks(ARMOR_LINE_WIDTH) {
        // base64 output is ASCII
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

/// Decode an armor block with the given label
///
/// Header lines (`Key: value`) and an OpenPGP checksum line (`=XXXX`) are
/// skipped.
pub fn dearmor(label: &str, text: &[u8]) -> EngineResult<Vec<u8>> {
    let text = std::str::from_utf8(text)
        .map_err(|_| EngineError::BadData("armored message is not UTF-8".into()))?;
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let mut lines = text.lines().map(str::trim).skip_while(|l| *l != begin);
    if lines.next().is_none() {
        return Err(EngineError::BadData(format!("missing `{begin}` line")));
    }

    let mut body = String::new();
    let mut closed = false;
    for line in lines {
        if line == end {
            closed = true;
            break;
        }
        if line.is_empty() || line.contains(": ") || line.starts_with('=') {
            continue;
        }
        body.push_str(line);
    }
    if !closed {
        return Err(EngineError::BadData(format!("missing `{end}` line")));
    }

    STANDARD
        .decode(body)
        .map_err(|e| EngineError::BadData(format!("invalid base64 in armor: {e}")))
}

/// Check if data looks like an OpenPGP message (armored or binary)
pub fn is_pgp_message(data: &[u8]) -> bool {
    let armored = format!("-----BEGIN {PGP_MESSAGE_LABEL}-----");
    if data.trim_ascii_start().starts_with(armored.as_bytes()) {
        return true;
    }
    match data.first() {
        // new packet format: 0b11xx_xxxx, tag in the low six bits
        Some(&b) if b & 0xC0 == 0xC0 => BINARY_MESSAGE_TAGS.contains(&(b & 0x3F)),
        // old packet format: 0b10tt_ttll
        Some(&b) if b & 0xC0 == 0x80 => BINARY_MESSAGE_TAGS.contains(&((b >> 2) & 0x0F)),
        _ => false,
    }
}
