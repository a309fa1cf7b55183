// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret types used throughout pgp-encrypter.

pub use secure_gate::dynamic_alias;

// Dynamic secrets
dynamic_alias!(Passphrase, String); // Unlocks a private key for signing / decryption
dynamic_alias!(PlainText, Vec<u8>); // Decrypted message body
