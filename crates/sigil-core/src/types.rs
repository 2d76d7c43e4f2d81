// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Sigil workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved id of the password verification marker.
///
/// The marker is a sentinel secret used to test whether a candidate
/// password is correct without touching real secret data. It never
/// appears in listings.
pub const VERIFICATION_MARKER_ID: &str = "pwd-verification-marker";

/// Reserved kind tag of the password verification marker.
pub const KIND_PWD_VERIFICATION: &str = "pwd_verification";

/// Unique identifier for a stored secret.
///
/// Generated once at creation (lowercase-hex UUID v4) and never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretId(pub String);

impl SecretId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SecretId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SecretId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A durable secret record as stored by a persistence backend.
///
/// `ciphertext` is the base64-encoded `nonce || ciphertext || tag` blob --
/// never plaintext. Timestamps are UTC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretRecord {
    pub id: String,
    pub ciphertext: String,
    pub kind: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Lightweight metadata about a secret (no ciphertext, no plaintext).
///
/// Returned by `list_secrets` and `secret_info` so callers can display
/// what exists without touching any secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMetadata {
    pub id: SecretId,
    pub kind: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Expiration details for a single secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationInfo {
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    /// Seconds until expiry; zero when already expired.
    pub remaining_secs: i64,
}

/// Process-wide vault state reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultStatus {
    pub persistence_enabled: bool,
    pub password_protected: bool,
    pub has_active_master_key: bool,
    /// True when the vault is password protected but not yet unlocked.
    /// Callers should surface an "unlock your secret database" prompt.
    pub needs_unlock: bool,
    /// Live (non-expired) secrets currently in memory, marker excluded.
    pub secret_count: usize,
}
