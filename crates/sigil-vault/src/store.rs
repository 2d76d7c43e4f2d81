// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory secret table and TTL lifecycle.
//!
//! Expiry gives two independent guarantees: a secret is never readable
//! after its deadline (lazy check on every access), and it is eventually
//! removed from memory even without access (periodic sweep). Removing an
//! already-absent id is a no-op, which resolves races between the sweep
//! and in-flight get/remove calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use sigil_config::VaultConfig;
use sigil_core::{
    ExpirationInfo, SecretId, SecretMetadata, SecretRecord, KIND_PWD_VERIFICATION,
};
use tracing::debug;

use crate::vault::Vault;

/// A single encrypted secret held in memory.
///
/// `ciphertext` is the base64 `nonce || body || tag` blob; the table never
/// holds plaintext.
#[derive(Debug, Clone)]
pub struct Secret {
    pub id: SecretId,
    pub ciphertext: String,
    pub kind: String,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Whether this secret is forwarded to the durable store.
    pub persist: bool,
}

impl Secret {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_marker(&self) -> bool {
        self.kind == KIND_PWD_VERIFICATION
    }

    pub fn metadata(&self) -> SecretMetadata {
        SecretMetadata {
            id: self.id.clone(),
            kind: self.kind.clone(),
            label: self.label.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    pub fn to_record(&self) -> SecretRecord {
        SecretRecord {
            id: self.id.0.clone(),
            ciphertext: self.ciphertext.clone(),
            kind: self.kind.clone(),
            label: self.label.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }

    /// Rebuild a secret from a durable record. Loaded records are always
    /// persistent by definition.
    pub fn from_record(record: SecretRecord) -> Self {
        Self {
            id: SecretId(record.id),
            ciphertext: record.ciphertext,
            kind: record.kind,
            label: record.label,
            created_at: record.created_at,
            expires_at: record.expires_at,
            persist: true,
        }
    }

    pub fn expiration_info(&self, now: DateTime<Utc>) -> ExpirationInfo {
        let remaining = (self.expires_at - now).num_seconds().max(0);
        ExpirationInfo {
            expires_at: self.expires_at,
            is_expired: self.is_expired(now),
            remaining_secs: remaining,
        }
    }
}

/// The in-memory table of encrypted secrets, keyed by id.
#[derive(Debug)]
pub struct SecretTable {
    secrets: HashMap<String, Secret>,
    default_ttl: Duration,
    max_ttl: Duration,
}

impl SecretTable {
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            secrets: HashMap::new(),
            default_ttl: Duration::seconds(config.default_ttl_secs as i64),
            max_ttl: Duration::seconds(config.max_ttl_secs as i64),
        }
    }

    /// Resolve a requested TTL: default when absent, silently clamped to
    /// the maximum when above it. Never rejects.
    pub fn clamp_ttl(&self, requested: Option<StdDuration>) -> Duration {
        let requested = requested
            .and_then(|d| Duration::from_std(d).ok())
            .unwrap_or(self.default_ttl);
        requested.min(self.max_ttl)
    }

    pub fn insert(&mut self, secret: Secret) {
        self.secrets.insert(secret.id.0.clone(), secret);
    }

    /// Remove by id. Absent ids return `None`; removal is idempotent.
    pub fn remove(&mut self, id: &str) -> Option<Secret> {
        self.secrets.remove(id)
    }

    /// Lazy eviction: drop the secret if its deadline passed. Returns
    /// `true` when an eviction happened.
    pub fn evict_if_expired(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        let expired = self
            .secrets
            .get(id)
            .is_some_and(|secret| secret.is_expired(now));
        if expired {
            self.secrets.remove(id);
            debug!(id = %id, "evicted expired secret on access");
        }
        expired
    }

    pub fn get(&self, id: &str) -> Option<&Secret> {
        self.secrets.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Secret> {
        self.secrets.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.secrets.contains_key(id)
    }

    /// Metadata for all live secrets, marker excluded, oldest first.
    /// Expired entries are evicted as a side effect.
    pub fn list_metadata(&mut self, now: DateTime<Utc>) -> Vec<SecretMetadata> {
        self.sweep_expired(now);
        let mut list: Vec<SecretMetadata> = self
            .secrets
            .values()
            .filter(|s| !s.is_marker())
            .map(Secret::metadata)
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        list
    }

    /// Drop every expired secret, returning the removed ids so the
    /// caller can tombstone their durable records.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Vec<SecretId> {
        let expired: Vec<String> = self
            .secrets
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.0.clone())
            .collect();
        for id in &expired {
            self.secrets.remove(id);
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "swept expired secrets");
        }
        expired.into_iter().map(SecretId).collect()
    }

    /// Live secrets, marker excluded.
    pub fn live_count(&self, now: DateTime<Utc>) -> usize {
        self.secrets
            .values()
            .filter(|s| !s.is_marker() && !s.is_expired(now))
            .count()
    }

    pub fn values(&self) -> impl Iterator<Item = &Secret> {
        self.secrets.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Secret> {
        self.secrets.values_mut()
    }

    pub fn clear(&mut self) {
        self.secrets.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

/// Spawn the periodic expiry sweeper for a shared vault.
///
/// The task holds a `Weak` reference so it ends when the vault is
/// dropped. The returned handle can be aborted for an earlier stop.
pub fn start_expiry_sweeper(
    vault: &Arc<Vault>,
    period: StdDuration,
) -> tokio::task::JoinHandle<()> {
    let weak = Arc::downgrade(vault);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(vault) = weak.upgrade() else {
                break;
            };
            let swept = vault.sweep_expired().await;
            if swept > 0 {
                debug!(swept, "expiry sweeper pass complete");
            }
        }
    })
}
