use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::SecretString;
use std::path::PathBuf;
use tourguard_cli::{rooted_at, App};
use tourguard_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use tourguard_core::Config;
use tracing::{info, warn};
use zeroize::Zeroizing;

#[derive(Parser, Debug)]
#[command(name = "tourguard")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,

    /// TOML configuration file (defaults to TOURGUARD_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the keystore, content store and ledger snapshot
    #[arg(long, default_value = "~/.tourguard")]
    data_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new identity and register it on the ledger
    Create {
        alias: String,
        /// Identity password; prefer setting TOURGUARD_PASSWORD, since
        /// command-line values show up in process listings
        #[arg(long, env = "TOURGUARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Issue a KYC credential signed by ALIAS
    IssueKyc {
        alias: String,
        /// Identity password; prefer setting TOURGUARD_PASSWORD, since
        /// command-line values show up in process listings
        #[arg(long, env = "TOURGUARD_PASSWORD", hide_env_values = true)]
        password: String,
        /// Subject DID (the issuer itself when omitted)
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        nationality: String,
        /// basic, enhanced or full
        #[arg(long, default_value = "basic")]
        level: String,
    },
    /// Verify a credential stored as JSON
    Verify { credential: PathBuf },
    /// Revoke a credential issued by ALIAS
    Revoke {
        alias: String,
        credential_id: String,
        /// Identity password; prefer setting TOURGUARD_PASSWORD, since
        /// command-line values show up in process listings
        #[arg(long, env = "TOURGUARD_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value = "revoked by issuer")]
        reason: String,
    },
    /// Encrypt a file under its own password and store it
    StoreKyc {
        alias: String,
        file: PathBuf,
        /// Identity password; prefer setting TOURGUARD_PASSWORD, since
        /// command-line values show up in process listings
        #[arg(long, env = "TOURGUARD_PASSWORD", hide_env_values = true)]
        password: String,
        /// Payload password; prefer setting TOURGUARD_PAYLOAD_PASSWORD
        #[arg(long, env = "TOURGUARD_PAYLOAD_PASSWORD", hide_env_values = true)]
        payload_password: String,
    },
    /// Decrypt a payload written by store-kyc, given its metadata file
    LoadKyc {
        alias: String,
        meta: PathBuf,
        /// Identity password; prefer setting TOURGUARD_PASSWORD, since
        /// command-line values show up in process listings
        #[arg(long, env = "TOURGUARD_PASSWORD", hide_env_values = true)]
        password: String,
        /// Payload password; prefer setting TOURGUARD_PAYLOAD_PASSWORD
        #[arg(long, env = "TOURGUARD_PAYLOAD_PASSWORD", hide_env_values = true)]
        payload_password: String,
        /// Write the plaintext here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn secret(value: String) -> SecretString {
    SecretString::new(value)
}

fn read_to_string(path: &PathBuf) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    let mut log_config = LogConfig::try_from(&config.logging)?;
    if let Some(level) = &args.log_level {
        log_config.level = level.parse().unwrap_or_else(|_| {
            eprintln!("Invalid log level '{}', using 'info'", level);
            LogLevel::Info
        });
    }
    if args.json_logs {
        log_config = log_config.json_format(true);
    }
    init_logging_with_config(log_config)?;

    let data_dir = PathBuf::from(shellexpand::tilde(&args.data_dir).into_owned());
    let app = App::open(&rooted_at(config, &data_dir), &data_dir)?;
    info!(data_dir = %data_dir.display(), "TourGuard CLI started");

    match args.command {
        Command::Create { alias, password } => {
            let identity = app.create(&alias, &secret(password)).await?;
            print_json(&identity)?;
        }
        Command::IssueKyc {
            alias,
            password,
            subject,
            nationality,
            level,
        } => {
            let credential = app
                .issue_kyc(&alias, &secret(password), subject.as_deref(), &nationality, &level)
                .await?;
            println!("{}", credential.to_json()?);
        }
        Command::Verify { credential } => {
            let result = app.verify(&read_to_string(&credential)?).await?;
            if !result.valid {
                warn!(errors = result.errors.len(), "credential failed verification");
            }
            print_json(&result)?;
        }
        Command::Revoke {
            alias,
            credential_id,
            password,
            reason,
        } => {
            let receipt = app.revoke(&alias, &secret(password), &credential_id, &reason).await?;
            print_json(&receipt)?;
        }
        Command::StoreKyc {
            alias,
            file,
            password,
            payload_password,
        } => {
            let data = Zeroizing::new(std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?);
            let meta = app
                .store_kyc(&alias, &secret(password), &secret(payload_password), &data)
                .await?;
            print_json(&meta)?;
        }
        Command::LoadKyc {
            alias,
            meta,
            password,
            payload_password,
            output,
        } => {
            let plaintext = app
                .load_kyc(&alias, &secret(password), &secret(payload_password), &read_to_string(&meta)?)
                .await?;
            match output {
                Some(path) => std::fs::write(&path, plaintext.as_slice())
                    .with_context(|| format!("writing {}", path.display()))?,
                None => println!("{}", String::from_utf8_lossy(plaintext.as_slice())),
            }
        }
    }

    info!("TourGuard CLI finished");
    Ok(())
}
