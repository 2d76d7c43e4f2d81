// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sigil -- an embedded encrypted secret vault.
//!
//! This binary is the composition root: it loads configuration, opens
//! the durable store, constructs the vault, and exposes its operations
//! as subcommands.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;

/// Sigil -- an embedded encrypted secret vault.
#[derive(Parser, Debug)]
#[command(name = "sigil", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Show vault state (persistence, protection, secret count).
    Status,
    /// Encrypt and store a secret, printing its opaque id.
    Set {
        /// The secret value. Prompted for when omitted.
        value: Option<String>,
        /// Kind tag, e.g. api_key or token.
        #[arg(long, default_value = "api_key")]
        kind: String,
        /// Human label shown in listings.
        #[arg(long)]
        label: Option<String>,
        /// Time-to-live in seconds (clamped to the configured maximum).
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Decrypt and print a secret value.
    Get { id: String },
    /// List live secrets (metadata only).
    List,
    /// Remove a secret.
    Remove { id: String },
    /// Unlock a password-protected vault.
    Unlock,
    /// Turn on durable persistence.
    EnablePersistence {
        /// Protect persisted secrets with a password (prompted).
        #[arg(long)]
        password_protected: bool,
    },
    /// Turn off durable persistence.
    DisablePersistence {
        /// Also wipe the durable store.
        #[arg(long)]
        clear: bool,
    },
    /// Change the vault password.
    ChangePassword,
    /// Remove password protection. Destructive: wipes persisted data.
    RemoveProtection,
    /// Store a value and write its reference into a JSON config file.
    Inject {
        /// Path to the JSON configuration file.
        file: std::path::PathBuf,
        /// Dot-separated path inside the tree, e.g. auth.token.
        path: String,
        #[arg(long, default_value = "api_key")]
        kind: String,
        #[arg(long)]
        label: Option<String>,
    },
    /// Print a JSON config file with all references resolved.
    Resolve {
        file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match sigil_config::load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("sigil: configuration error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = commands::run(cli.command, config).await {
        eprintln!("sigil: {e}");
        std::process::exit(1);
    }
}
