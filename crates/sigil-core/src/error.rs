// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Sigil secret vault.

use thiserror::Error;

/// The primary error type used across all Sigil crates.
///
/// An unknown or expired secret id is NOT an error: lookup operations
/// return `Option::None` for absence. Variants here cover failures the
/// caller must react to.
#[derive(Debug, Error)]
pub enum SigilError {
    /// Configuration errors (invalid TOML, missing required fields, invalid state transitions).
    #[error("configuration error: {0}")]
    Config(String),

    /// No key material was available after a derivation attempt.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authenticated decryption failed -- wrong key or corrupted ciphertext.
    #[error("decryption failed -- wrong key or corrupted data")]
    Decryption,

    /// Argon2id key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// User-supplied password did not verify against the marker or an existing secret.
    #[error("wrong password")]
    PasswordMismatch,

    /// The vault is password protected and has not been unlocked yet.
    #[error("vault is locked -- unlock your secret database first")]
    VaultLocked,

    /// The durable store is missing or blocked. Persistence degrades to
    /// memory-only for the session; the vault itself keeps working.
    #[error("persistent storage unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Too few persisted records decrypted successfully to trust the load.
    #[error("refusing to load secrets: only {succeeded} of {attempted} records decrypted")]
    CorruptionDetected { attempted: usize, succeeded: usize },

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Record or config tree (de)serialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO errors (session record file, config file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
