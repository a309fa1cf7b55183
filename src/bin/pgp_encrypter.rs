// src/bin/pgp_encrypter.rs
//! pgp-encrypter: stdin to stdout encryption through a configured keyring
//!
//! Usage: pgp-encrypter [--ask-pass] <encrypt|decrypt|fingerprint|list-keys [pattern]>

use std::io::{Read, Write};

use anyhow::{bail, Context, Result};
use pgp_encrypter::{load_config, EncryptionService, Passphrase, TracingLogger};
use rpassword::prompt_password;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: pgp-encrypter [--ask-pass] <encrypt|decrypt|fingerprint|list-keys [pattern]>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let ask_pass = match args.iter().position(|a| a == "--ask-pass") {
        Some(i) => {
            args.remove(i);
            true
        }
        None => false,
    };
    let Some(command) = args.first().cloned() else {
        bail!(USAGE);
    };

    let mut config = load_config().context("Failed to load configuration")?;
    if ask_pass {
        let passphrase = prompt_password(format!(
            "Passphrase for {}: ",
            config.encrypter.recipient
        ))?;
        config.encrypter.set_passphrase(Passphrase::new(passphrase));
    }

    let mut service = EncryptionService::from_config(&config, TracingLogger)
        .with_context(|| format!("Failed to open keyring {}", config.encrypter.keyring_home.display()))?;
    info!(recipient = service.recipient(), signing = service.signs_messages(), "keyring ready");

    let mut stdout = std::io::stdout().lock();
    match command.as_str() {
        "encrypt" => {
            let input = read_stdin()?;
            let ciphertext = service.encrypt(&input).context("Encryption failed")?;
            stdout.write_all(&ciphertext)?;
        }
        "decrypt" => {
            let input = read_stdin()?;
            let message = service.decrypt_verified(&input).context("Decryption failed")?;
            for sig in &message.signatures {
                info!(signer = %sig.fingerprint, valid = sig.valid, "signature");
            }
            stdout.write_all(message.plaintext.expose_secret())?;
        }
        "fingerprint" => {
            let fingerprint = service.signing_fingerprint()?;
            writeln!(stdout, "{fingerprint}")?;
        }
        "list-keys" => {
            let pattern = args.get(1).map(String::as_str).unwrap_or("");
            let records = service.key_info(pattern)?;
            serde_json::to_writer_pretty(&mut stdout, &records)?;
            writeln!(stdout)?;
        }
        other => bail!("unknown command `{other}`\n{USAGE}"),
    }
    stdout.flush()?;

    Ok(())
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("Failed to read stdin")?;
    Ok(input)
}
