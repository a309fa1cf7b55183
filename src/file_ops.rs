// src/file_ops.rs
//! File-level encryption/decryption operations
//!
//! Thin wrappers that read a file, run it through an [`EncryptionService`]
//! and write the result. Both return the plaintext size in bytes.

use std::path::Path;

use crate::aliases::PlainText;
use crate::engine::OpenPgpEngine;
use crate::error::Result;
use crate::logger::ErrorLogger;
use crate::service::EncryptionService;

pub fn encrypt_file<E, L, P>(
    service: &mut EncryptionService<E, L>,
    input_path: P,
    output_path: P,
) -> Result<u64>
where
    E: OpenPgpEngine,
    L: ErrorLogger,
    P: AsRef<Path>,
{
    let plaintext = PlainText::new(std::fs::read(input_path.as_ref())?);
    let ciphertext = service.encrypt(plaintext.expose_secret())?;
    std::fs::write(output_path.as_ref(), ciphertext)?;
    Ok(plaintext.expose_secret().len() as u64)
}

pub fn decrypt_file<E, L, P>(
    service: &mut EncryptionService<E, L>,
    input_path: P,
    output_path: P,
) -> Result<u64>
where
    E: OpenPgpEngine,
    L: ErrorLogger,
    P: AsRef<Path>,
{
    let ciphertext = std::fs::read(input_path.as_ref())?;
    let plaintext = service.decrypt(&ciphertext)?;
    std::fs::write(output_path.as_ref(), plaintext.expose_secret())?;
    Ok(plaintext.expose_secret().len() as u64)
}
