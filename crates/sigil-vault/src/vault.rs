// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The vault facade: opaque-handle secret storage over the key manager,
//! the in-memory table, and an optional durable store backend.
//!
//! All state lives behind one `tokio::sync::Mutex`, so no two vault
//! operations interleave on shared state and password-lifecycle
//! transitions are serialized. Backend failures degrade the session to
//! memory-only persistence instead of propagating.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use secrecy::SecretString;
use sigil_config::{SessionRecord, VaultConfig};
use sigil_core::{
    ExpirationInfo, SecretBackend, SecretId, SecretMetadata, SecretRecord, SigilError,
    VaultStatus,
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::keys::KeyManager;
use crate::store::{Secret, SecretTable};

/// Password-protection state machine:
/// `Unprotected <-> Locked -> Unlocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Protection {
    /// No password configured; the base key protects values.
    Unprotected,
    /// Password protected, master key not yet derived this session.
    Locked,
    /// Password verified, master key active.
    Unlocked,
}

/// Options for [`Vault::store_secret`].
#[derive(Debug, Default, Clone)]
pub struct StoreOptions {
    /// Time-to-live; the configured default when absent, silently
    /// clamped to the configured maximum.
    pub ttl: Option<StdDuration>,
    /// Human label shown in listings and used as the export name.
    pub label: Option<String>,
    /// Forward to the durable store. Defaults to whether persistence is
    /// enabled; a `true` with persistence off stays memory-only.
    pub persist: Option<bool>,
}

/// One entry of a bulk import.
#[derive(Debug, Clone)]
pub struct BulkSecret {
    pub value: String,
    pub kind: String,
    pub label: Option<String>,
}

pub(crate) struct VaultInner {
    pub(crate) keys: KeyManager,
    pub(crate) table: SecretTable,
    pub(crate) backend: Option<Arc<dyn SecretBackend>>,
    pub(crate) session: SessionRecord,
    pub(crate) session_path: PathBuf,
    pub(crate) protection: Protection,
    pub(crate) decrypt_attempts: usize,
    pub(crate) decrypt_failures: usize,
}

/// The vault. Construct once at the composition root and share by
/// reference; every method takes `&self`.
pub struct Vault {
    pub(crate) inner: Mutex<VaultInner>,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault").field("inner", &"[REDACTED]").finish()
    }
}

impl Vault {
    /// Build a vault from injected configuration and collaborators.
    ///
    /// `session` is the continuity record loaded by the caller; a vault
    /// whose record says "password protected" starts locked. A missing
    /// backend means persistence intent cannot be honored this session;
    /// the vault degrades to memory-only with a warning.
    pub fn new(
        config: VaultConfig,
        backend: Option<Arc<dyn SecretBackend>>,
        session: SessionRecord,
        session_path: impl Into<PathBuf>,
    ) -> Self {
        let protection = if session.password_protected {
            if backend.is_some() {
                Protection::Locked
            } else {
                warn!("session record wants password protection but no durable store is available");
                Protection::Unprotected
            }
        } else {
            Protection::Unprotected
        };

        Self {
            inner: Mutex::new(VaultInner {
                keys: KeyManager::new(config.clone()),
                table: SecretTable::new(&config),
                backend,
                session,
                session_path: session_path.into(),
                protection,
                decrypt_attempts: 0,
                decrypt_failures: 0,
            }),
        }
    }

    /// Load persisted secrets for an unprotected vault.
    ///
    /// Password-protected vaults stay locked until
    /// [`Vault::unlock_database`] verifies a password. Returns the number
    /// of secrets admitted.
    pub async fn init(&self) -> Result<usize, SigilError> {
        let mut inner = self.inner.lock().await;
        if inner.session.persistence_enabled
            && inner.protection == Protection::Unprotected
            && let Some(backend) = inner.backend.clone()
        {
            inner.keys.ensure_base_key()?;
            let records = backend.get_all().await?;
            return inner.load_records(records).await;
        }
        Ok(0)
    }

    /// Encrypt and store a value, returning its opaque handle.
    ///
    /// The value is never stored in plaintext; re-storing the same value
    /// always yields a new id.
    pub async fn store_secret(
        &self,
        value: &str,
        kind: &str,
        opts: StoreOptions,
    ) -> Result<SecretId, SigilError> {
        let mut inner = self.inner.lock().await;
        inner.store_one(value, kind, opts).await
    }

    /// Bulk import with a shared TTL. All-or-nothing per entry: an entry
    /// that fails to encrypt aborts the import before any later entry.
    pub async fn store_secrets_bulk(
        &self,
        entries: Vec<BulkSecret>,
        shared_ttl: Option<StdDuration>,
    ) -> Result<Vec<SecretId>, SigilError> {
        let mut inner = self.inner.lock().await;
        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let opts = StoreOptions {
                ttl: shared_ttl,
                label: entry.label,
                persist: None,
            };
            ids.push(inner.store_one(&entry.value, &entry.kind, opts).await?);
        }
        Ok(ids)
    }

    /// Decrypt and return a secret value.
    ///
    /// Expired secrets are lazily evicted here, so staleness is bounded
    /// by whichever fires first: this check or the periodic sweep.
    /// Unknown and expired ids are `None`, not errors.
    pub async fn get_secret(&self, id: &SecretId) -> Result<Option<SecretString>, SigilError> {
        let mut inner = self.inner.lock().await;
        if inner.protection == Protection::Locked {
            return Err(SigilError::VaultLocked);
        }

        let now = Utc::now();
        if inner.table.evict_if_expired(&id.0, now) {
            inner.tombstone(&id.0).await;
            return Ok(None);
        }
        let Some(secret) = inner.table.get(&id.0) else {
            return Ok(None);
        };
        let ciphertext = secret.ciphertext.clone();

        let use_master = inner.protection == Protection::Unlocked;
        match inner.keys.decode_stored_value(&ciphertext, use_master) {
            Ok(decoded) => {
                inner.decrypt_attempts += 1;
                Ok(Some(SecretString::from(decoded.into_string())))
            }
            Err(SigilError::Decryption) => {
                inner.decrypt_attempts += 1;
                inner.decrypt_failures += 1;
                inner.maybe_recover().await;
                Err(SigilError::Decryption)
            }
            Err(e) => Err(e),
        }
    }

    /// Remove a secret from memory and tombstone its durable record.
    /// Removing an unknown id is a no-op, not an error.
    pub async fn remove_secret(&self, id: &SecretId) -> Result<(), SigilError> {
        let mut inner = self.inner.lock().await;
        if inner.protection == Protection::Locked {
            return Err(SigilError::VaultLocked);
        }
        if inner.table.remove(&id.0).is_some() {
            debug!(id = %id, "secret removed");
        }
        inner.tombstone(&id.0).await;
        Ok(())
    }

    /// Metadata of live secrets, verification marker excluded. A locked
    /// vault lists nothing; check [`Vault::status`] for the unlock signal.
    pub async fn list_secrets(&self) -> Vec<SecretMetadata> {
        let mut inner = self.inner.lock().await;
        if inner.protection == Protection::Locked {
            return Vec::new();
        }
        let now = Utc::now();
        let swept = inner.table.sweep_expired(now);
        for id in &swept {
            inner.tombstone(&id.0).await;
        }
        inner.table.list_metadata(now)
    }

    /// Metadata for one secret without enumeration.
    pub async fn secret_info(&self, id: &SecretId) -> Option<SecretMetadata> {
        let mut inner = self.inner.lock().await;
        if inner.protection == Protection::Locked {
            return None;
        }
        let now = Utc::now();
        if inner.table.evict_if_expired(&id.0, now) {
            inner.tombstone(&id.0).await;
            return None;
        }
        inner.table.get(&id.0).filter(|s| !s.is_marker()).map(Secret::metadata)
    }

    /// True when the id refers to a live, readable secret.
    pub async fn has_valid_secret(&self, id: &SecretId) -> bool {
        self.secret_info(id).await.is_some()
    }

    /// Expiration details for a secret, including already-expired ones
    /// that have not been evicted yet.
    pub async fn expiration_info(&self, id: &SecretId) -> Option<ExpirationInfo> {
        let inner = self.inner.lock().await;
        if inner.protection == Protection::Locked {
            return None;
        }
        inner
            .table
            .get(&id.0)
            .filter(|s| !s.is_marker())
            .map(|s| s.expiration_info(Utc::now()))
    }

    /// Drop every expired secret from memory and tombstone its durable
    /// record. Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let swept = inner.table.sweep_expired(Utc::now());
        for id in &swept {
            inner.tombstone(&id.0).await;
        }
        swept.len()
    }

    /// Current vault state for the caller's UI.
    pub async fn status(&self) -> VaultStatus {
        let inner = self.inner.lock().await;
        VaultStatus {
            persistence_enabled: inner.session.persistence_enabled && inner.backend.is_some(),
            password_protected: inner.session.password_protected,
            has_active_master_key: inner.keys.has_master_key(),
            needs_unlock: inner.protection == Protection::Locked,
            secret_count: inner.table.live_count(Utc::now()),
        }
    }
}

impl VaultInner {
    pub(crate) async fn store_one(
        &mut self,
        value: &str,
        kind: &str,
        opts: StoreOptions,
    ) -> Result<SecretId, SigilError> {
        if self.protection == Protection::Locked {
            return Err(SigilError::VaultLocked);
        }
        let use_master = self.protection == Protection::Unlocked;
        let ciphertext = self.keys.encrypt(value.as_bytes(), use_master)?;

        let ttl = self.table.clamp_ttl(opts.ttl);
        let now = Utc::now();
        let persist =
            opts.persist.unwrap_or(true) && self.session.persistence_enabled && self.backend.is_some();

        let secret = Secret {
            id: SecretId::generate(),
            ciphertext,
            kind: kind.to_string(),
            label: opts.label,
            created_at: now,
            expires_at: now + ttl,
            persist,
        };
        let id = secret.id.clone();

        if persist {
            let record = secret.to_record();
            self.persist_record(&record).await;
        }
        self.table.insert(secret);
        debug!(id = %id, kind = %kind, persist, "secret stored");
        Ok(id)
    }

    /// Forward a record to the durable store, degrading to memory-only
    /// persistence on failure instead of surfacing an error.
    pub(crate) async fn persist_record(&mut self, record: &SecretRecord) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        if let Err(e) = backend.put(record).await {
            warn!(error = %e, "durable store write failed -- persistence disabled for this session");
            self.backend = None;
        }
    }

    /// Tombstone a durable record, degrading on failure.
    pub(crate) async fn tombstone(&mut self, id: &str) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        if let Err(e) = backend.delete(id).await {
            warn!(id = %id, error = %e, "durable tombstone failed -- persistence disabled for this session");
            self.backend = None;
        }
    }

    pub(crate) fn save_session(&self) -> Result<(), SigilError> {
        self.session.save(&self.session_path)
    }

    /// Trigger recovery once the running failure rate crosses 30% with
    /// more than 3 samples.
    pub(crate) async fn maybe_recover(&mut self) {
        if self.decrypt_attempts > 3 && self.decrypt_failures * 10 > self.decrypt_attempts * 3 {
            self.recover_from_decryption_failure().await;
        }
    }
}
