// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session continuity record.
//!
//! A small JSON file that survives process reloads and records the
//! vault's *intent*: whether persistence is enabled and whether it is
//! password protected. It never contains key material. The password hash
//! exists only so a re-entered password can be rejected cheaply before
//! the expensive Argon2id unlock is attempted -- it is never used to
//! derive keys.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sigil_core::SigilError;
use tracing::debug;

/// Persistence intent surviving reloads. Invariant:
/// `password_protected` implies `persistence_enabled`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub persistence_enabled: bool,

    #[serde(default)]
    pub password_protected: bool,

    /// Hex-encoded SHA-256 of the password, or empty when unprotected.
    /// Local pre-check only; key derivation never reads this.
    #[serde(default)]
    pub password_hash: String,
}

impl SessionRecord {
    /// Load the record from `path`. A missing file yields the default
    /// (persistence off, unprotected) rather than an error.
    pub fn load(path: &Path) -> Result<Self, SigilError> {
        if !path.exists() {
            debug!(path = %path.display(), "no session record -- using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| SigilError::Serialization(format!("invalid session record: {e}")))
    }

    /// Write the record to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), SigilError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SigilError::Serialization(format!("session record encode: {e}")))?;
        std::fs::write(path, content)?;
        debug!(path = %path.display(), "session record saved");
        Ok(())
    }

    /// Record the hash of the active password.
    pub fn set_password_hash(&mut self, password: &str) {
        self.password_hash = hash_password(password);
    }

    /// Cheap local pre-check of a candidate password.
    ///
    /// Returns `true` when no hash is recorded (nothing to check against).
    pub fn matches_password(&self, password: &str) -> bool {
        if self.password_hash.is_empty() {
            return true;
        }
        self.password_hash == hash_password(password)
    }
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let record = SessionRecord::load(&dir.path().join("absent.json")).unwrap();
        assert!(!record.persistence_enabled);
        assert!(!record.password_protected);
        assert!(record.password_hash.is_empty());
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/session.json");

        let mut record = SessionRecord {
            persistence_enabled: true,
            password_protected: true,
            password_hash: String::new(),
        };
        record.set_password_hash("hunter2");
        record.save(&path).unwrap();

        let loaded = SessionRecord::load(&path).unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn password_precheck_accepts_correct_rejects_wrong() {
        let mut record = SessionRecord::default();
        record.set_password_hash("correct horse");

        assert!(record.matches_password("correct horse"));
        assert!(!record.matches_password("battery staple"));
    }

    #[test]
    fn empty_hash_matches_anything() {
        let record = SessionRecord::default();
        assert!(record.matches_password("whatever"));
    }

    #[test]
    fn hash_is_hex_sha256() {
        let mut record = SessionRecord::default();
        record.set_password_hash("abc");
        // Known SHA-256 of "abc".
        assert_eq!(
            record.password_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
