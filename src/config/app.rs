// src/config/app.rs
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use super::defaults::*;
use crate::aliases::Passphrase;
use crate::consts::{
    DEFAULT_CONFIG_FILE, ENV_CONFIG, ENV_KEYRING_HOME, ENV_PASSPHRASE, ENV_RECIPIENT,
};
use crate::engine::GpgOptions;
use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub encrypter: EncrypterSettings,
    #[serde(default)]
    pub gpg: GpgSettings,
}

#[derive(Clone, Deserialize)]
pub struct EncrypterSettings {
    #[serde(default)]
    pub recipient: String,
    #[serde(default = "empty_passphrase", deserialize_with = "passphrase_from_str")]
    passphrase: Passphrase,
    #[serde(default = "default_keyring_home")]
    pub keyring_home: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GpgSettings {
    #[serde(default = "default_gpg_program")]
    pub program: PathBuf,
    #[serde(default = "default_connect_agent_program")]
    pub connect_agent: PathBuf,
    #[serde(default = "default_armor")]
    pub armor: bool,
}

impl Default for EncrypterSettings {
    fn default() -> Self {
        Self {
            recipient: String::new(),
            passphrase: empty_passphrase(),
            keyring_home: default_keyring_home(),
        }
    }
}

impl Default for GpgSettings {
    fn default() -> Self {
        Self {
            program: default_gpg_program(),
            connect_agent: default_connect_agent_program(),
            armor: default_armor(),
        }
    }
}

impl EncrypterSettings {
    pub fn passphrase(&self) -> Passphrase {
        self.passphrase.clone()
    }

    pub fn set_passphrase(&mut self, passphrase: Passphrase) {
        self.passphrase = passphrase;
    }

    pub fn has_passphrase(&self) -> bool {
        !self.passphrase.expose_secret().is_empty()
    }
}

fn empty_passphrase() -> Passphrase {
    Passphrase::new(String::new())
}

fn passphrase_from_str<'de, D>(deserializer: D) -> std::result::Result<Passphrase, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(Passphrase::new)
}

impl fmt::Debug for EncrypterSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncrypterSettings")
            .field("recipient", &self.recipient)
            .field("passphrase", &"<redacted>")
            .field("keyring_home", &self.keyring_home)
            .finish()
    }
}

impl GpgSettings {
    pub fn options(&self) -> GpgOptions {
        GpgOptions {
            program: self.program.clone(),
            connect_agent: self.connect_agent.clone(),
            armor: self.armor,
        }
    }
}

impl Config {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Overlay values found through `lookup` (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(recipient) = lookup(ENV_RECIPIENT) {
            self.encrypter.recipient = recipient;
        }
        if let Some(passphrase) = lookup(ENV_PASSPHRASE) {
            self.encrypter.passphrase = Passphrase::new(passphrase);
        }
        if let Some(home) = lookup(ENV_KEYRING_HOME).filter(|h| !h.is_empty()) {
            self.encrypter.keyring_home = PathBuf::from(home);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.encrypter.recipient.trim().is_empty() {
            return Err(CoreError::Config(format!(
                "no recipient configured (set encrypter.recipient or {ENV_RECIPIENT})"
            )));
        }
        Ok(())
    }
}

/// Load config from `$PGP_ENCRYPTER_CONFIG` (default `encrypter.toml`)
///
/// A missing file is not an error: the environment alone may configure the
/// service. The result must still name a recipient.
pub fn load() -> Result<Config> {
    let config_path =
        std::env::var(ENV_CONFIG).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let mut conf = if Path::new(&config_path).exists() {
        Config::from_file(&config_path)?
    } else {
        tracing::debug!(path = %config_path, "config file not found, using environment only");
        Config::default()
    };

    conf.apply_overrides(|key| std::env::var(key).ok());
    conf.validate()?;
    Ok(conf)
}
