// src/config/defaults.rs
use std::path::PathBuf;

use crate::consts::{DEFAULT_CONNECT_AGENT_PROGRAM, DEFAULT_GPG_PROGRAM, ENV_GNUPGHOME};

/// `$GNUPGHOME`, else `~/.gnupg`
pub fn default_keyring_home() -> PathBuf {
    if let Some(home) = std::env::var_os(ENV_GNUPGHOME).filter(|v| !v.is_empty()) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|h| h.join(".gnupg"))
        .unwrap_or_else(|| PathBuf::from(".gnupg"))
}

pub fn default_gpg_program() -> PathBuf {
    PathBuf::from(DEFAULT_GPG_PROGRAM)
}

pub fn default_connect_agent_program() -> PathBuf {
    PathBuf::from(DEFAULT_CONNECT_AGENT_PROGRAM)
}

pub fn default_armor() -> bool {
    true
}
