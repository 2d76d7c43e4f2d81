// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./sigil.toml` > `~/.config/sigil/sigil.toml` >
//! `/etc/sigil/sigil.toml` with environment variable overrides via the
//! `SIGIL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::SigilConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/sigil/sigil.toml` (system-wide)
/// 3. `~/.config/sigil/sigil.toml` (user XDG config)
/// 4. `./sigil.toml` (local directory)
/// 5. `SIGIL_*` environment variables
pub fn load_config() -> Result<SigilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SigilConfig::default()))
        .merge(Toml::file("/etc/sigil/sigil.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("sigil/sigil.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("sigil.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<SigilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SigilConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<SigilConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(SigilConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `SIGIL_VAULT_KDF_ITERATIONS` must map
/// to `vault.kdf_iterations`, not `vault.kdf.iterations`.
fn env_provider() -> Env {
    Env::prefixed("SIGIL_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("vault_", "vault.", 1)
            .replacen("storage_", "storage.", 1);
        mapped.into()
    })
}
