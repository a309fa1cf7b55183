// src/config/mod.rs
//! Configuration system for pgp-encrypter
//!
//! TOML file plus environment overrides. The key-home and passphrase only
//! ever flow from here into an engine handle; nothing is written back to the
//! process environment.

pub use app::{load, Config, EncrypterSettings, GpgSettings};

mod app;
mod defaults;
