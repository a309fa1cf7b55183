// src/engine/colons.rs
//! Parser for `gpg --with-colons --fixed-list-mode` key listings

use chrono::{DateTime, Utc};

use crate::keyring::{Fingerprint, KeyRecord, SubkeyInfo, UserId};

// Field positions in a colon record
const F_TYPE: usize = 0;
const F_VALIDITY: usize = 1;
const F_KEYID: usize = 4;
const F_CREATED: usize = 5;
const F_EXPIRES: usize = 6;
// also the fingerprint / keygrip field of `fpr` and `grp` records
const F_USER_ID: usize = 9;
const F_CAPS: usize = 11;
const F_TOKEN: usize = 14;

/// Build key records from a colon listing
///
/// `pub`/`sec` start a record (and its primary subkey entry), `sub`/`ssb`
/// add subkeys, `fpr` and `grp` fill in the fingerprint and keygrip of the
/// preceding key line and `uid` adds user ids. Unknown record types are
/// ignored.
pub fn parse_colon_listing(listing: &str) -> Vec<KeyRecord> {
    let mut records: Vec<KeyRecord> = Vec::new();
    // fpr lines belong to the key line right above them; uid/sig lines reset this
    let mut awaiting_fpr = false;
    let mut awaiting_grp = false;

    for line in listing.lines() {
        let fields: Vec<&str> = line.split(':').collect();
        let field = |i: usize| fields.get(i).copied().unwrap_or("");

        match field(F_TYPE) {
            kind @ ("pub" | "sec") => {
                let validity = field(F_VALIDITY);
                let caps = field(F_CAPS);
                let primary = subkey_from(&fields, kind == "sec");
                records.push(KeyRecord {
                    fingerprint: Fingerprint::new(""),
                    disabled: validity == "d" || caps.contains('D'),
                    expired: primary.expired,
                    revoked: primary.revoked,
                    is_secret: primary.is_secret,
                    can_sign: caps.contains('S'),
                    can_encrypt: caps.contains('E'),
                    uids: Vec::new(),
                    subkeys: vec![primary],
                });
                awaiting_fpr = true;
                awaiting_grp = true;
            }
            kind @ ("sub" | "ssb") => {
                if let Some(record) = records.last_mut() {
                    record.subkeys.push(subkey_from(&fields, kind == "ssb"));
                    awaiting_fpr = true;
                    awaiting_grp = true;
                }
            }
            "fpr" if awaiting_fpr => {
                let fpr = Fingerprint::new(field(F_USER_ID));
                if let Some(record) = records.last_mut() {
                    if record.subkeys.len() == 1 {
                        record.fingerprint = fpr.clone();
                    }
                    if let Some(subkey) = record.subkeys.last_mut() {
                        subkey.fingerprint = fpr;
                    }
                }
                awaiting_fpr = false;
            }
            "grp" => {
                if awaiting_grp {
                    let grip = field(F_USER_ID).trim();
                    if let Some(subkey) = records.last_mut().and_then(|r| r.subkeys.last_mut()) {
                        subkey.keygrip = (!grip.is_empty()).then(|| grip.to_ascii_uppercase());
                    }
                }
                awaiting_grp = false;
            }
            "uid" => {
                if let Some(record) = records.last_mut() {
                    let validity = field(F_VALIDITY);
                    let mut uid = UserId::parse(&unescape(field(F_USER_ID)));
                    uid.revoked = validity == "r";
                    uid.invalid = validity == "i";
                    record.uids.push(uid);
                }
                awaiting_fpr = false;
                awaiting_grp = false;
            }
            _ => {
                awaiting_fpr = false;
                awaiting_grp = false;
            }
        }
    }

    records
}

fn subkey_from(fields: &[&str], secret_record: bool) -> SubkeyInfo {
    let field = |i: usize| fields.get(i).copied().unwrap_or("");
    let validity = field(F_VALIDITY);
    let caps = field(F_CAPS);
    SubkeyInfo {
        fingerprint: Fingerprint::new(""),
        keyid: field(F_KEYID).to_ascii_uppercase(),
        keygrip: None,
        can_encrypt: caps.contains('e'),
        can_sign: caps.contains('s'),
        can_certify: caps.contains('c'),
        can_authenticate: caps.contains('a'),
        revoked: validity == "r",
        expired: validity == "e",
        invalid: validity == "i",
        is_secret: secret_record && field(F_TOKEN) != "#",
        timestamp: epoch(field(F_CREATED)),
        expires: epoch(field(F_EXPIRES)),
    }
}

fn epoch(value: &str) -> Option<DateTime<Utc>> {
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Undo gpg's `\xHH` escaping in user ids
fn unescape(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && bytes.get(i + 1) == Some(&b'x') {
            if let Some(byte) = value
                .get(i + 2..i + 4)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
            {
                out.push(byte);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
