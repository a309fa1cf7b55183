// src/engine/gpg.rs
//! Engine backed by the system `gpg` binary
//!
//! Every invocation carries `--homedir`, so each handle is bound to its own
//! key-home and the process environment is never touched. The message always
//! travels over stdin; a passphrase goes through a separate pipe mapped to
//! fd 3 in the child, so nothing secret is ever written to disk.
//!
//! gpg-agent caches unlocked keys per key-home and would then ignore the
//! supplied passphrase. The cache entries of the keys involved are cleared
//! with `gpg-connect-agent` before and after every passphrase-bearing run.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use super::status::{classify_failure, parse_signatures, split_stderr, StatusLine};
use super::{colons::parse_colon_listing, registration, OpenEngine, OpenPgpEngine};
use crate::aliases::{Passphrase, PlainText};
use crate::armor::is_pgp_message;
use crate::consts::{DEFAULT_CONNECT_AGENT_PROGRAM, DEFAULT_GPG_PROGRAM, GPG_KEYRING_FILES};
use crate::enums::ErrorMode;
use crate::error::{CoreError, EngineError, EngineResult, Result};
use crate::keyring::{DecryptedMessage, KeyRecord, KeyringHome};

/// Descriptor number gpg reads the passphrase from
const PASSPHRASE_FD: i32 = 3;

#[derive(Debug, Clone)]
pub struct GpgOptions {
    /// gpg executable, looked up in `PATH` when relative
    pub program: PathBuf,
    /// `gpg-connect-agent` executable, used to drop cached passphrases
    pub connect_agent: PathBuf,
    /// ASCII-armor ciphertext output
    pub armor: bool,
}

impl Default for GpgOptions {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_GPG_PROGRAM),
            connect_agent: PathBuf::from(DEFAULT_CONNECT_AGENT_PROGRAM),
            armor: true,
        }
    }
}

/// A secret key registered for signing or decryption
struct SecretKey {
    fingerprint: String,
    keygrips: Vec<String>,
    passphrase: Passphrase,
}

impl SecretKey {
    fn new(record: KeyRecord, passphrase: &Passphrase) -> Self {
        Self {
            keygrips: record
                .subkeys
                .iter()
                .filter_map(|s| s.keygrip.clone())
                .collect(),
            fingerprint: record.fingerprint.to_string(),
            passphrase: passphrase.clone(),
        }
    }
}

pub struct GpgEngine {
    home: KeyringHome,
    options: GpgOptions,
    error_mode: ErrorMode,
    encrypt_keys: Vec<String>,
    sign_keys: Vec<SecretKey>,
    decrypt_keys: Vec<SecretKey>,
}

struct GpgOutput {
    stdout: Vec<u8>,
    status: Vec<StatusLine>,
}

impl GpgEngine {
    /// Bind a handle to `home`, failing if it holds no keyring or gpg cannot run
    pub fn open_with(home: &KeyringHome, options: GpgOptions) -> Result<Self> {
        home.require_any(GPG_KEYRING_FILES)?;

        let version = Command::new(&options.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| {
                CoreError::init(
                    home.path(),
                    format!("cannot run {}: {e}", options.program.display()),
                )
            })?;
        if !version.success() {
            return Err(CoreError::init(
                home.path(),
                format!("{} --version exited with {version}", options.program.display()),
            ));
        }

        tracing::debug!(home = %home.path().display(), "gpg engine ready");
        Ok(Self {
            home: home.clone(),
            options,
            error_mode: ErrorMode::default(),
            encrypt_keys: Vec::new(),
            sign_keys: Vec::new(),
            decrypt_keys: Vec::new(),
        })
    }

    pub fn home(&self) -> &KeyringHome {
        &self.home
    }

    fn base_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--homedir".into(), self.home.path().into()];
        for flag in [
            "--batch",
            "--yes",
            "--no-tty",
            "--status-fd",
            "2",
            "--pinentry-mode",
            "loopback",
            "--output",
            "-",
        ] {
            args.push(flag.into());
        }
        args
    }

    /// Run gpg with `stdin` fed from a helper thread so large inputs cannot deadlock
    fn run(
        &self,
        args: Vec<OsString>,
        stdin: Vec<u8>,
        passphrase: Option<&Passphrase>,
    ) -> EngineResult<GpgOutput> {
        let mut command = Command::new(&self.options.program);
        command.args(self.base_args());
        if let Some(passphrase) = passphrase {
            attach_passphrase(&mut command, passphrase)?;
            command.arg("--passphrase-fd").arg(PASSPHRASE_FD.to_string());
        }
        let mut child = command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        // the child holds its own copy of the passphrase pipe now
        drop(command);

        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("gpg stdin pipe unavailable"))?;
        let writer = thread::spawn(move || pipe.write_all(&stdin));

        let output = child.wait_with_output()?;
        let written = writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("gpg stdin writer panicked")));

        let stderr = String::from_utf8_lossy(&output.stderr);
        let (status, human) = split_stderr(&stderr);
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(classify_failure(&status, code, &human));
        }
        // gpg may stop reading early on success (e.g. --list-keys); only report
        // a write failure once the exit status is known to be fine
        if let Err(e) = written {
            if e.kind() != io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }

        Ok(GpgOutput {
            stdout: output.stdout,
            status,
        })
    }

    /// Run with a passphrase, making sure gpg-agent checks it instead of its cache
    fn run_unlocked(
        &self,
        args: Vec<OsString>,
        stdin: Vec<u8>,
        key: &SecretKey,
    ) -> EngineResult<GpgOutput> {
        self.forget_passphrases(&key.keygrips)?;
        let result = self.run(args, stdin, Some(&key.passphrase));
        let cleared = self.forget_passphrases(&key.keygrips);
        let output = result?;
        cleared?;
        Ok(output)
    }

    /// Drop gpg-agent's cached passphrases for `keygrips`
    fn forget_passphrases(&self, keygrips: &[String]) -> EngineResult<()> {
        if keygrips.is_empty() {
            return Ok(());
        }
        let mut command = Command::new(&self.options.connect_agent);
        command.arg("--homedir").arg(self.home.path());
        for grip in keygrips {
            command.arg(format!("CLEAR_PASSPHRASE --mode=normal {grip}"));
        }
        let output = command
            .arg("/bye")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        // the exit status stays 0 when an agent command fails; check the replies too
        let replies = String::from_utf8_lossy(&output.stdout);
        let refused = replies.lines().find(|l| l.starts_with("ERR"));
        if !output.status.success() || refused.is_some() {
            let detail = refused
                .map(str::to_string)
                .unwrap_or_else(|| String::from_utf8_lossy(&output.stderr).trim().to_string());
            return Err(EngineError::Gpg {
                code: output.status.code().unwrap_or(-1),
                stderr: format!("cannot clear cached passphrase: {detail}"),
            });
        }
        tracing::trace!(keys = keygrips.len(), "cleared cached passphrases");
        Ok(())
    }

    fn list(&self, secret: bool, pattern: &str) -> EngineResult<Vec<KeyRecord>> {
        let mut args: Vec<OsString> = ["--with-colons", "--fixed-list-mode", "--with-keygrip"]
            .into_iter()
            .map(OsString::from)
            .collect();
        // twice: also print subkey fingerprints on older gpg releases
        args.push("--with-fingerprint".into());
        args.push("--with-fingerprint".into());
        args.push(if secret { "--list-secret-keys" } else { "--list-keys" }.into());

        let output = self.run(args, Vec::new(), None)?;
        let records = parse_colon_listing(&String::from_utf8_lossy(&output.stdout));

        let pattern = pattern.trim();
        Ok(records
            .into_iter()
            .filter(|r| pattern.is_empty() || r.matches(pattern))
            .collect())
    }

    fn armor_flag(&self, args: &mut Vec<OsString>) {
        if self.options.armor {
            args.push("--armor".into());
        }
    }

    fn recipient_args(&self, args: &mut Vec<OsString>) {
        args.push("--trust-model".into());
        args.push("always".into());
        for fpr in &self.encrypt_keys {
            args.push("--recipient".into());
            args.push(fpr.into());
        }
    }
}

/// Hand the child a pipe holding `passphrase`, readable as `PASSPHRASE_FD`
#[cfg(unix)]
fn attach_passphrase(command: &mut Command, passphrase: &Passphrase) -> EngineResult<()> {
    use command_fds::{CommandFdExt, FdMapping};
    use std::os::fd::OwnedFd;

    let (reader, mut writer) = os_pipe::pipe()?;
    writer.write_all(passphrase.expose_secret().as_bytes())?;
    writer.write_all(b"\n")?;
    // closing the write end lets gpg see EOF after the line
    drop(writer);

    command
        .fd_mappings(vec![FdMapping {
            parent_fd: OwnedFd::from(reader),
            child_fd: PASSPHRASE_FD,
        }])
        .map_err(|e| io::Error::other(format!("cannot map passphrase pipe: {e:?}")))?;
    Ok(())
}

#[cfg(not(unix))]
fn attach_passphrase(_command: &mut Command, _passphrase: &Passphrase) -> EngineResult<()> {
    Err(EngineError::Io(io::Error::new(
        io::ErrorKind::Unsupported,
        "passphrase pipes need a unix platform",
    )))
}

fn usable(record: &KeyRecord) -> bool {
    !(record.revoked || record.expired || record.disabled)
}

impl OpenEngine for GpgEngine {
    fn open(home: &KeyringHome) -> Result<Self> {
        Self::open_with(home, GpgOptions::default())
    }
}

impl OpenPgpEngine for GpgEngine {
    fn set_error_mode(&mut self, mode: ErrorMode) {
        self.error_mode = mode;
    }

    fn error_mode(&self) -> ErrorMode {
        self.error_mode
    }

    fn add_encryption_key(&mut self, identity: &str) -> EngineResult<()> {
        let found = self.list(false, identity).and_then(|records| {
            records
                .into_iter()
                .find(|r| usable(r) && r.can_encrypt)
                .ok_or_else(|| EngineError::KeyNotFound(identity.to_string()))
        });
        let result = found.map(|record| self.encrypt_keys.push(record.fingerprint.to_string()));
        registration(self.error_mode, identity, result)
    }

    fn add_signing_key(&mut self, identity: &str, passphrase: &Passphrase) -> EngineResult<()> {
        let found = self.list(true, identity).and_then(|records| {
            let secret: Vec<_> = records.into_iter().filter(|r| r.is_secret).collect();
            if secret.is_empty() {
                return Err(EngineError::NoSecretKey(identity.to_string()));
            }
            secret
                .into_iter()
                .find(|r| usable(r) && r.can_sign)
                .ok_or_else(|| EngineError::KeyNotFound(identity.to_string()))
        });
        let result = found.map(|record| self.sign_keys.push(SecretKey::new(record, passphrase)));
        registration(self.error_mode, identity, result)
    }

    fn add_decryption_key(
        &mut self,
        identity: &str,
        passphrase: &Passphrase,
    ) -> EngineResult<()> {
        let found = self.list(true, identity).and_then(|records| {
            records
                .into_iter()
                .find(|r| r.is_secret)
                .ok_or_else(|| EngineError::NoSecretKey(identity.to_string()))
        });
        let result =
            found.map(|record| self.decrypt_keys.push(SecretKey::new(record, passphrase)));
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
        if self.encrypt_keys.is_empty() {
            return Err(EngineError::NoRecipients);
        }
        let mut args = Vec::new();
        self.armor_flag(&mut args);
        self.recipient_args(&mut args);
        args.push("--encrypt".into());

        Ok(self.run(args, data.to_vec(), None)?.stdout)
    }

    fn encrypt_sign(&mut self, data: &[u8]) -> EngineResult<Vec<u8>> {
        if self.encrypt_keys.is_empty() {
            return Err(EngineError::NoRecipients);
        }
        // gpg reads a single passphrase; the first signer's is used for all
        let Some(unlock) = self.sign_keys.first() else {
            return Err(EngineError::NoSigners);
        };

        let mut args = Vec::new();
        self.armor_flag(&mut args);
        self.recipient_args(&mut args);
        for key in &self.sign_keys {
            args.push("--local-user".into());
            args.push(key.fingerprint.as_str().into());
        }
        args.push("--sign".into());
        args.push("--encrypt".into());

        Ok(self.run_unlocked(args, data.to_vec(), unlock)?.stdout)
    }

    fn decrypt_verify(&mut self, data: &[u8]) -> EngineResult<DecryptedMessage> {
        if !is_pgp_message(data) {
            return Err(EngineError::BadData("input is not an OpenPGP message".into()));
        }
        let args = vec![OsString::from("--decrypt")];
        let output = match self.decrypt_keys.first() {
            None => self.run(args, data.to_vec(), None)?,
            Some(key) => self.run_unlocked(args, data.to_vec(), key)?,
        };

        Ok(DecryptedMessage {
            signatures: parse_signatures(&output.status),
            plaintext: PlainText::new(output.stdout),
        })
    }

    fn key_info(&mut self, pattern: &str) -> EngineResult<Vec<KeyRecord>> {
        self.list(false, pattern)
    }
}
