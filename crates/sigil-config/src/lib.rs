// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model and loader for the Sigil secret vault.
//!
//! Configuration is loaded from TOML files following the XDG hierarchy
//! with `SIGIL_*` environment variable overrides. The session continuity
//! record -- the small JSON file that remembers persistence *intent*
//! across reloads -- also lives here.

pub mod loader;
pub mod model;
pub mod session;

pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{SigilConfig, StorageConfig, VaultConfig};
pub use session::SessionRecord;
