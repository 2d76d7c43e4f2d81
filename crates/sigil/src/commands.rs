// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand implementations wiring the vault to the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use secrecy::ExposeSecret;
use sigil_config::{SessionRecord, SigilConfig};
use sigil_core::{SecretBackend, SecretId, SigilError};
use sigil_storage::SqliteBackend;
use sigil_vault::{EnablePersistence, StoreOptions, Vault};
use tracing::warn;

use crate::prompt;
use crate::Commands;

pub async fn run(command: Commands, config: SigilConfig) -> Result<(), SigilError> {
    let vault = build_vault(&config).await?;

    match command {
        Commands::Status => status(&vault).await,
        Commands::Set {
            value,
            kind,
            label,
            ttl_secs,
        } => set(&vault, value, &kind, label, ttl_secs).await,
        Commands::Get { id } => get(&vault, &id).await,
        Commands::List => list(&vault).await,
        Commands::Remove { id } => {
            vault.remove_secret(&SecretId(id)).await?;
            println!("removed");
            Ok(())
        }
        Commands::Unlock => unlock(&vault).await,
        Commands::EnablePersistence { password_protected } => {
            let password = if password_protected {
                Some(prompt::get_password_with_confirm("New vault password")?)
            } else {
                None
            };
            vault
                .enable_persistence(EnablePersistence {
                    password_protected,
                    password,
                })
                .await?;
            println!("persistence enabled");
            Ok(())
        }
        Commands::DisablePersistence { clear } => {
            vault.disable_persistence(clear).await?;
            println!("persistence disabled");
            Ok(())
        }
        Commands::ChangePassword => {
            let old = prompt::get_password("Current vault password")?;
            let new = prompt::get_password_with_confirm("New vault password")?;
            vault
                .change_password(new.expose_secret(), old.expose_secret())
                .await?;
            println!("password changed");
            Ok(())
        }
        Commands::RemoveProtection => {
            vault.remove_password_protection().await?;
            println!("password protection removed -- persisted data wiped");
            Ok(())
        }
        Commands::Inject {
            file,
            path,
            kind,
            label,
        } => inject(&vault, &file, &path, &kind, label.as_deref()).await,
        Commands::Resolve { file } => resolve(&vault, &file).await,
    }
}

/// Open the durable store (degrading to memory-only when unavailable),
/// load the session record, and construct the vault.
async fn build_vault(config: &SigilConfig) -> Result<Vault, SigilError> {
    let backend: Option<Arc<dyn SecretBackend>> = match SqliteBackend::open(&config.storage).await
    {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            warn!(error = %e, "durable store unavailable -- memory-only session");
            None
        }
    };

    let session_path = PathBuf::from(&config.storage.session_path);
    let session = SessionRecord::load(&session_path)?;
    let vault = Vault::new(config.vault.clone(), backend, session, session_path);
    if let Err(e) = vault.init().await {
        warn!(error = %e, "could not load persisted secrets");
    }
    Ok(vault)
}

async fn status(vault: &Vault) -> Result<(), SigilError> {
    let status = vault.status().await;
    println!("persistence enabled:  {}", status.persistence_enabled);
    println!("password protected:   {}", status.password_protected);
    println!("active master key:    {}", status.has_active_master_key);
    println!("live secrets:         {}", status.secret_count);
    if status.needs_unlock {
        println!("vault is locked -- run `sigil unlock`");
    }
    Ok(())
}

async fn set(
    vault: &Vault,
    value: Option<String>,
    kind: &str,
    label: Option<String>,
    ttl_secs: Option<u64>,
) -> Result<(), SigilError> {
    let value = match value {
        Some(value) => value,
        None => prompt::get_secret_value()?,
    };
    let id = vault
        .store_secret(
            &value,
            kind,
            StoreOptions {
                ttl: ttl_secs.map(Duration::from_secs),
                label,
                persist: None,
            },
        )
        .await?;
    println!("{id}");
    Ok(())
}

async fn get(vault: &Vault, id: &str) -> Result<(), SigilError> {
    match vault.get_secret(&SecretId(id.to_string())).await? {
        Some(value) => {
            println!("{}", value.expose_secret());
            Ok(())
        }
        None => {
            eprintln!("no such secret (unknown or expired id)");
            std::process::exit(1);
        }
    }
}

async fn list(vault: &Vault) -> Result<(), SigilError> {
    let status = vault.status().await;
    if status.needs_unlock {
        println!("vault is locked -- run `sigil unlock`");
        return Ok(());
    }
    let secrets = vault.list_secrets().await;
    if secrets.is_empty() {
        println!("no secrets");
        return Ok(());
    }
    for meta in secrets {
        println!(
            "{}  {:<10}  expires {}  {}",
            meta.id,
            meta.kind,
            meta.expires_at.format("%Y-%m-%d %H:%M:%S"),
            meta.label.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}

async fn unlock(vault: &Vault) -> Result<(), SigilError> {
    if !vault.status().await.needs_unlock {
        println!("vault is not locked");
        return Ok(());
    }
    let password = prompt::get_password("Vault password")?;
    let loaded = vault.unlock_database(password.expose_secret()).await?;
    println!("unlocked -- {loaded} secrets loaded");
    Ok(())
}

async fn inject(
    vault: &Vault,
    file: &Path,
    path: &str,
    kind: &str,
    label: Option<&str>,
) -> Result<(), SigilError> {
    let tree: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(file)?)
        .map_err(|e| SigilError::Serialization(format!("{}: {e}", file.display())))?;
    let value = prompt::get_secret_value()?;

    let injected = sigil_refs::inject_reference(vault, &tree, path, &value, kind, label).await?;
    std::fs::write(
        file,
        serde_json::to_string_pretty(&injected)
            .map_err(|e| SigilError::Serialization(e.to_string()))?,
    )?;
    println!("reference written to {} at {path}", file.display());
    Ok(())
}

async fn resolve(vault: &Vault, file: &Path) -> Result<(), SigilError> {
    let tree: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(file)?)
        .map_err(|e| SigilError::Serialization(format!("{}: {e}", file.display())))?;

    let resolved = sigil_refs::resolve_references(vault, &tree).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&resolved)
            .map_err(|e| SigilError::Serialization(e.to_string()))?
    );
    Ok(())
}
