// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sigil secret vault.
//!
//! This crate provides the error type, the shared data types (secret ids,
//! metadata, durable records), and the persistence backend trait used
//! throughout the Sigil workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SigilError;
pub use traits::SecretBackend;
pub use types::{
    ExpirationInfo, SecretId, SecretMetadata, SecretRecord, VaultStatus, KIND_PWD_VERIFICATION,
    VERIFICATION_MARKER_ID,
};
