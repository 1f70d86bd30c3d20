// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Command-line host for the credential broker.
//!
//! The CLI plays the part of the host dispatcher: each subcommand invokes one
//! broker hook against the file store and renders the outcome.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use ib_credentials::{
    Authenticator, BrokerConfig, CredentialBroker, EnrollmentOutcome, EnrollmentResult, FileStore,
    IdentityRecord, NoticeReceiver, Secret, TokenOutcome, enrollment_channel, notice_channel,
};
use ib_logging::CliLoggingArgs;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "ib", version, about = "Single-identity credential broker")]
pub struct Cli {
    /// Broker configuration file (TOML)
    #[arg(long, global = true, env = "IB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub logging: CliLoggingArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Show the enrolled identity
    Status,
    /// Enroll the single identity
    Enroll {
        /// Identity name
        name: String,
        /// Secret for the identity (read from stdin when omitted)
        #[arg(long)]
        secret: Option<String>,
        /// Token type the enrollment is requested for
        #[arg(long)]
        token_type: Option<String>,
    },
    /// Print the token of the enrolled identity
    Token {
        /// Token type to request (defaults to the configured one)
        #[arg(long)]
        token_type: Option<String>,
        /// Print the token instead of a redacted placeholder
        #[arg(long)]
        reveal: bool,
    },
    /// Look up the label of a token type
    Label {
        /// Token type (defaults to the configured one)
        token_type: Option<String>,
    },
    /// Confirm credentials; this always logs the identity out
    Confirm,
    /// Query optional features of the enrolled identity
    Features {
        /// Feature names
        names: Vec<String>,
    },
}

/// Broker wired to the file store, plus the notices it raises
struct Host {
    broker: CredentialBroker,
    notices: NoticeReceiver,
}

impl Host {
    fn new(config: &BrokerConfig) -> Self {
        let store = Arc::new(FileStore::new(config.clone()));
        let (notifier, notices) = notice_channel();
        let broker = CredentialBroker::new(config, store, Arc::new(notifier));
        Self { broker, notices }
    }

    fn enrolled_identity(&self) -> Result<IdentityRecord> {
        match self.broker.default_identity()? {
            Some(record) => Ok(record),
            None => bail!("No identity enrolled; run `ib enroll <name>` first"),
        }
    }
}

/// Execute a parsed command, writing human or JSON output to `out`
pub async fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let config = BrokerConfig::load_or_default(cli.config.as_deref())?;
    let mut host = Host::new(&config);
    let json = cli.json;

    match cli.command {
        Commands::Status => status(&host, json, out),
        Commands::Enroll {
            name,
            secret,
            token_type,
        } => {
            let secret = match secret {
                Some(secret) => Secret::new(secret),
                None => read_secret()?,
            };
            let token_type = token_type.unwrap_or_else(|| config.token_type.clone());
            enroll(&mut host, &name, secret, &token_type, json, out).await
        }
        Commands::Token { token_type, reveal } => {
            let token_type = token_type.unwrap_or_else(|| config.token_type.clone());
            token(&host, &token_type, reveal, json, out)
        }
        Commands::Label { token_type } => {
            let token_type = token_type.unwrap_or_else(|| config.token_type.clone());
            label(&host, &token_type, json, out)
        }
        Commands::Confirm => confirm(&host, json, out),
        Commands::Features { names } => features(&host, &names, json, out),
    }
}

fn read_secret() -> Result<Secret> {
    eprint!("Secret: ");
    std::io::stderr().flush()?;
    let mut buf = String::new();
    std::io::stdin().read_line(&mut buf)?;
    Ok(Secret::new(buf.trim_end().to_string()))
}

fn status(host: &Host, json: bool, out: &mut dyn Write) -> Result<()> {
    let identity = host.broker.default_identity()?;

    if json {
        let payload = match &identity {
            Some(record) => json!({
                "enrolled": true,
                "name": record.name,
                "account_type": record.account_type,
                "created": record.created.to_rfc3339(),
            }),
            None => json!({ "enrolled": false }),
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
        return Ok(());
    }

    match identity {
        Some(record) => writeln!(
            out,
            "{} ({}), enrolled {}",
            record.name,
            record.account_type,
            record.created.to_rfc3339()
        )?,
        None => writeln!(out, "Not enrolled.")?,
    }
    Ok(())
}

async fn enroll(
    host: &mut Host,
    name: &str,
    secret: Secret,
    token_type: &str,
    json: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let (response, completion) = enrollment_channel();

    let launch = match host.broker.request_enrollment(token_type, response)? {
        EnrollmentOutcome::Launch(launch) => launch,
        EnrollmentOutcome::Cancelled { reason } => {
            for notice in host.notices.drain() {
                writeln!(out, "{}", notice)?;
            }
            bail!("Enrollment cancelled: {:?}", reason);
        }
    };

    launch.complete(host.broker.store(), name, secret)?;

    match completion.wait().await {
        EnrollmentResult::Enrolled(record) => {
            tracing::info!(identity = %record.name, "Enrollment completed");
            if json {
                writeln!(
                    out,
                    "{}",
                    serde_json::to_string_pretty(&json!({ "enrolled": record.name }))?
                )?;
            } else {
                writeln!(out, "Enrolled '{}'", record.name)?;
            }
            Ok(())
        }
        EnrollmentResult::Cancelled => bail!("Enrollment cancelled"),
    }
}

fn token(host: &Host, token_type: &str, reveal: bool, json: bool, out: &mut dyn Write) -> Result<()> {
    let record = host.enrolled_identity()?;

    match host.broker.get_token(&record, token_type)? {
        TokenOutcome::Issued(issued) => {
            let shown = if reveal {
                issued.token.expose_secret()
            } else {
                ib_logging::redact(issued.token.expose_secret())
            };
            if json {
                let payload = json!({
                    "name": issued.account_name,
                    "account_type": issued.account_type,
                    "token": shown,
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            } else {
                writeln!(out, "{}", shown)?;
            }
            Ok(())
        }
        TokenOutcome::UnsupportedType { requested } => {
            bail!("Unsupported token type '{}'", requested)
        }
        TokenOutcome::NotConfirmed => bail!(
            "Stored credential for '{}' was invalid and has been removed; enroll again",
            record.name
        ),
    }
}

fn label(host: &Host, token_type: &str, json: bool, out: &mut dyn Write) -> Result<()> {
    let Some(label) = host.broker.get_token_label(token_type) else {
        bail!("Unsupported token type '{}'", token_type);
    };

    if json {
        writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(&json!({ "token_type": token_type, "label": label }))?
        )?;
    } else {
        writeln!(out, "{}", label)?;
    }
    Ok(())
}

fn confirm(host: &Host, json: bool, out: &mut dyn Write) -> Result<()> {
    let Some(record) = host.broker.default_identity()? else {
        writeln!(out, "Not enrolled.")?;
        return Ok(());
    };

    let confirmed = host.broker.confirm_identity(&record);

    if json {
        writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(&json!({
                "name": record.name,
                "confirmed": confirmed,
            }))?
        )?;
    } else {
        writeln!(
            out,
            "Credentials for '{}' not confirmed; identity removed",
            record.name
        )?;
    }
    Ok(())
}

fn features(host: &Host, names: &[String], json: bool, out: &mut dyn Write) -> Result<()> {
    let record = host.enrolled_identity()?;
    let names: Vec<&str> = names.iter().map(String::as_str).collect();
    let supported = host.broker.has_features(&record, &names);

    if json {
        writeln!(
            out,
            "{}",
            serde_json::to_string_pretty(&json!({ "features": names, "supported": supported }))?
        )?;
    } else {
        writeln!(out, "{}", supported)?;
    }
    Ok(())
}
