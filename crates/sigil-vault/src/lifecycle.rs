// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Password lifecycle: enable/disable persistence, password set/change/
//! removal, database unlock, and corruption recovery.
//!
//! The hard requirement throughout: "wrong password", "no password yet",
//! and "corrupted data" must be distinguished without ever admitting
//! wrongly-decrypted plaintext. Verification always uses strict
//! decryption of the marker (or an existing secret) -- never the legacy
//! decode fallbacks -- and no operation commits a partial re-encryption.

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use sigil_core::{SecretId, SecretRecord, SigilError, KIND_PWD_VERIFICATION, VERIFICATION_MARKER_ID};
use tracing::{debug, info, warn};

use crate::keys::KeyManager;
use crate::store::Secret;
use crate::vault::{Protection, Vault, VaultInner};

/// Plaintext sealed inside the verification marker. Decrypting the
/// marker to exactly this value proves the candidate key is correct.
pub(crate) const MARKER_PLAINTEXT: &[u8] = b"sigil password verification marker v1";

/// Marker lifetime: effectively infinite (100 years).
const MARKER_TTL_DAYS: i64 = 36_500;

/// How many persisted records the strict decryption sample covers.
const LOAD_SAMPLE_SIZE: usize = 5;

/// Options for [`Vault::enable_persistence`].
#[derive(Debug, Default)]
pub struct EnablePersistence {
    pub password_protected: bool,
    pub password: Option<SecretString>,
}

impl Vault {
    /// Turn on durable persistence, optionally with password protection.
    ///
    /// With protection requested this derives the master key, creates
    /// the verification marker on first-time setup, and re-encrypts
    /// every in-memory secret under the new key before anything is
    /// persisted. Without protection, secrets persist under the base key.
    pub async fn enable_persistence(&self, opts: EnablePersistence) -> Result<(), SigilError> {
        let mut inner = self.inner.lock().await;
        if inner.backend.is_none() {
            return Err(SigilError::PersistenceUnavailable(
                "no durable store available this session".to_string(),
            ));
        }

        if opts.password_protected {
            match inner.protection {
                Protection::Locked => return Err(SigilError::VaultLocked),
                Protection::Unlocked => {
                    return Err(SigilError::Config(
                        "already password protected -- use change_password".to_string(),
                    ));
                }
                Protection::Unprotected => {}
            }
            let password = opts.password.ok_or_else(|| {
                SigilError::Config("a password is required to enable protection".to_string())
            })?;
            let password = password.expose_secret();

            let new_key = inner.keys.derive_master_candidate(password)?;
            inner.reencrypt_all(false, &new_key)?;
            inner.keys.install_master_key(new_key);
            inner.protection = Protection::Unlocked;
            inner.session.password_protected = true;
            inner.session.set_password_hash(password);

            if !inner.table.contains(VERIFICATION_MARKER_ID) {
                inner.create_marker()?;
            }
        } else {
            if inner.protection != Protection::Unprotected {
                return Err(SigilError::Config(
                    "password protection is active -- remove it before plain persistence"
                        .to_string(),
                ));
            }
            inner.keys.ensure_base_key()?;
        }

        inner.session.persistence_enabled = true;
        inner.mark_all_persist();
        inner.persist_all().await;
        inner.save_session()?;
        info!(
            password_protected = opts.password_protected,
            "persistence enabled"
        );
        Ok(())
    }

    /// Turn off durable persistence, optionally wiping the store.
    ///
    /// Also drops password protection: in-memory secrets are re-encrypted
    /// under the base key first so they stay readable, then the master
    /// key is cleared.
    pub async fn disable_persistence(&self, clear_existing: bool) -> Result<(), SigilError> {
        let mut inner = self.inner.lock().await;

        if clear_existing
            && let Some(backend) = inner.backend.clone()
            && let Err(e) = backend.clear().await
        {
            warn!(error = %e, "durable wipe failed during disable");
        }

        if inner.protection == Protection::Unlocked {
            inner.table.remove(VERIFICATION_MARKER_ID);
            let base = *inner.keys.ensure_base_key()?;
            inner.reencrypt_all(true, &base)?;
        }
        inner.keys.clear_master_key();
        inner.protection = Protection::Unprotected;
        inner.session.persistence_enabled = false;
        inner.session.password_protected = false;
        inner.session.password_hash.clear();
        inner.save_session()?;
        info!(cleared = clear_existing, "persistence disabled");
        Ok(())
    }

    /// Change the vault password.
    ///
    /// The old password must first prove itself by strictly decrypting
    /// the marker (or an existing secret). Only then is every secret and
    /// the marker re-encrypted under the new key; a verification failure
    /// leaves the previous key and every ciphertext untouched.
    pub async fn change_password(&self, new: &str, old: &str) -> Result<(), SigilError> {
        let mut inner = self.inner.lock().await;
        match inner.protection {
            Protection::Unprotected => {
                return Err(SigilError::Config(
                    "vault is not password protected".to_string(),
                ));
            }
            Protection::Locked => return Err(SigilError::VaultLocked),
            Protection::Unlocked => {}
        }

        let old_key = inner.keys.derive_master_candidate(old)?;
        if !inner.verify_key_against_existing(&old_key, old) {
            info!("password change rejected -- old password did not verify");
            return Err(SigilError::PasswordMismatch);
        }

        let new_key = inner.keys.derive_master_candidate(new)?;
        inner.reencrypt_all(true, &new_key)?;
        inner.keys.install_master_key(new_key);
        inner.session.set_password_hash(new);
        inner.persist_all().await;
        inner.save_session()?;
        info!("password changed");
        Ok(())
    }

    /// Unlock a password-protected database.
    ///
    /// With no verification marker present (a new database) the password
    /// is accepted unconditionally and the marker is created -- the
    /// bootstrap path. With a marker present, the candidate key must
    /// strictly decrypt it to the known plaintext; a mismatch returns
    /// [`SigilError::PasswordMismatch`] without mutating any state.
    pub async fn unlock_database(&self, password: &str) -> Result<usize, SigilError> {
        let mut inner = self.inner.lock().await;
        if inner.protection == Protection::Unlocked {
            return Ok(0);
        }
        if !inner.session.password_protected {
            return Err(SigilError::Config(
                "vault is not password protected".to_string(),
            ));
        }
        let Some(backend) = inner.backend.clone() else {
            return Err(SigilError::PersistenceUnavailable(
                "no durable store available this session".to_string(),
            ));
        };

        // Cheap local pre-check before the expensive KDF.
        if !inner.session.matches_password(password) {
            debug!("unlock rejected by local password pre-check");
            return Err(SigilError::PasswordMismatch);
        }

        let records = backend.get_all().await?;
        let candidate = inner.keys.derive_master_candidate(password)?;
        let marker = records.iter().find(|r| r.id == VERIFICATION_MARKER_ID);

        match marker {
            Some(record) => {
                let verified = KeyManager::decrypt_with_key(&candidate, &record.ciphertext)
                    .is_ok_and(|pt| pt == MARKER_PLAINTEXT);
                if !verified {
                    info!("unlock rejected -- wrong password");
                    return Err(SigilError::PasswordMismatch);
                }
                inner.table.insert(Secret::from_record(record.clone()));
                inner.keys.install_master_key(candidate);
                inner.protection = Protection::Unlocked;
            }
            None => {
                info!("no verification marker -- bootstrapping password protection");
                inner.keys.install_master_key(candidate);
                inner.protection = Protection::Unlocked;
                inner.create_marker()?;
                let marker_record = inner
                    .table
                    .get(VERIFICATION_MARKER_ID)
                    .map(Secret::to_record);
                if let Some(record) = marker_record {
                    inner.persist_record(&record).await;
                }
            }
        }

        if inner.session.password_hash.is_empty() {
            inner.session.set_password_hash(password);
            inner.save_session()?;
        }

        let loaded = inner.load_records(records).await?;
        info!(loaded, "database unlocked");
        Ok(loaded)
    }

    /// Remove password protection entirely.
    ///
    /// Destructive by design: secrets encrypted under a master key
    /// cannot be downgraded to base-key encryption without the password,
    /// so the durable store is wiped. In-memory secrets that are still
    /// readable survive and are re-persisted under the base key.
    pub async fn remove_password_protection(&self) -> Result<(), SigilError> {
        let mut inner = self.inner.lock().await;
        if !inner.session.password_protected {
            return Ok(());
        }

        if let Some(backend) = inner.backend.clone()
            && let Err(e) = backend.clear().await
        {
            warn!(error = %e, "durable wipe failed -- persistence disabled for this session");
            inner.backend = None;
        }

        inner.table.remove(VERIFICATION_MARKER_ID);
        if inner.protection == Protection::Unlocked {
            let base = *inner.keys.ensure_base_key()?;
            inner.reencrypt_all(true, &base)?;
        } else {
            // Locked: nothing was ever admitted into memory.
            inner.table.clear();
        }
        inner.keys.clear_master_key();
        inner.protection = Protection::Unprotected;
        inner.session.password_protected = false;
        inner.session.password_hash.clear();

        if inner.session.persistence_enabled && inner.backend.is_some() {
            inner.mark_all_persist();
            inner.persist_all().await;
        }
        inner.save_session()?;
        warn!("password protection removed -- persisted ciphertext wiped");
        Ok(())
    }
}

impl VaultInner {
    /// Create the verification marker under the master key and add it to
    /// the table. One marker exists per password epoch.
    pub(crate) fn create_marker(&mut self) -> Result<(), SigilError> {
        let ciphertext = self.keys.encrypt(MARKER_PLAINTEXT, true)?;
        let now = Utc::now();
        self.table.insert(Secret {
            id: SecretId(VERIFICATION_MARKER_ID.to_string()),
            ciphertext,
            kind: KIND_PWD_VERIFICATION.to_string(),
            label: None,
            created_at: now,
            expires_at: now + Duration::days(MARKER_TTL_DAYS),
            persist: true,
        });
        debug!("verification marker created");
        Ok(())
    }

    /// Strictly verify a candidate key against the marker, falling back
    /// to any existing secret, then to the session hash when the table
    /// is empty. Never uses decode fallbacks.
    pub(crate) fn verify_key_against_existing(&self, key: &[u8; 32], password: &str) -> bool {
        if let Some(marker) = self.table.get(VERIFICATION_MARKER_ID) {
            return KeyManager::decrypt_with_key(key, &marker.ciphertext)
                .is_ok_and(|pt| pt == MARKER_PLAINTEXT);
        }
        let mut saw_secret = false;
        for secret in self.table.values() {
            saw_secret = true;
            if KeyManager::decrypt_with_key(key, &secret.ciphertext).is_ok() {
                return true;
            }
        }
        // Empty vault: the session hash is all there is to check against.
        !saw_secret && self.session.matches_password(password)
    }

    /// Re-encrypt every secret in the table from the currently active
    /// key to `to_key`, committing only after the full pass succeeds.
    ///
    /// Regular secrets that cannot be read are skipped with a warning
    /// (they were already lost); a marker that cannot be read aborts the
    /// pass, because that means the active key is wrong.
    pub(crate) fn reencrypt_all(
        &mut self,
        from_master: bool,
        to_key: &[u8; 32],
    ) -> Result<(), SigilError> {
        let ids: Vec<String> = self.table.values().map(|s| s.id.0.clone()).collect();
        let mut staged: Vec<(String, String)> = Vec::with_capacity(ids.len());
        let mut skipped = 0usize;

        for id in &ids {
            let (ciphertext, is_marker) = {
                let secret = self.table.get(id).expect("id collected above");
                (secret.ciphertext.clone(), secret.is_marker())
            };
            let plaintext: Vec<u8> = if is_marker {
                self.keys.decrypt(&ciphertext, from_master)?
            } else {
                match self.keys.decode_stored_value(&ciphertext, from_master) {
                    Ok(decoded) => decoded.into_string().into_bytes(),
                    Err(e) => {
                        warn!(id = %id, error = %e, "skipping unreadable secret during re-encryption");
                        skipped += 1;
                        continue;
                    }
                }
            };
            staged.push((id.clone(), KeyManager::encrypt_with_key(to_key, &plaintext)?));
        }

        // Commit: identity and metadata preserved, only ciphertext replaced.
        for (id, ciphertext) in staged {
            if let Some(secret) = self.table.get_mut(&id) {
                secret.ciphertext = ciphertext;
            }
        }
        if skipped > 0 {
            warn!(skipped, "re-encryption pass left unreadable secrets behind");
        }
        Ok(())
    }

    pub(crate) fn mark_all_persist(&mut self) {
        for secret in self.table.values_mut() {
            secret.persist = true;
        }
    }

    /// Persist every persistent secret's current record.
    pub(crate) async fn persist_all(&mut self) {
        let records: Vec<SecretRecord> = self
            .table
            .values()
            .filter(|s| s.persist)
            .map(Secret::to_record)
            .collect();
        for record in records {
            if self.backend.is_none() {
                break;
            }
            self.persist_record(&record).await;
        }
    }

    /// Admit persisted records into memory, guarded by the strict
    /// decryption sample and the success-ratio threshold.
    ///
    /// Nothing is admitted unless the sample proves the key plausible
    /// and at least half of the non-expired records decrypt (any success
    /// suffices for three records or fewer).
    pub(crate) async fn load_records(
        &mut self,
        records: Vec<SecretRecord>,
    ) -> Result<usize, SigilError> {
        let use_master = self.protection == Protection::Unlocked;
        let now = Utc::now();

        let mut live: Vec<SecretRecord> = Vec::new();
        let mut expired: Vec<String> = Vec::new();
        for record in records {
            if record.id == VERIFICATION_MARKER_ID {
                continue;
            }
            if record.expires_at <= now {
                expired.push(record.id);
            } else {
                live.push(record);
            }
        }
        for id in &expired {
            self.tombstone(id).await;
        }
        if live.is_empty() {
            return Ok(0);
        }

        // Strict decryption sample: no decode fallbacks. Zero successes
        // means the key is wrong; nothing decrypted so far is kept.
        let sample_n = live.len().min(LOAD_SAMPLE_SIZE);
        let sample_ok = live[..sample_n]
            .iter()
            .filter(|r| self.keys.decrypt(&r.ciphertext, use_master).is_ok())
            .count();
        if sample_ok == 0 {
            warn!(
                sampled = sample_n,
                "no sampled record decrypted strictly -- treating load as wrong password"
            );
            return Err(SigilError::PasswordMismatch);
        }

        let attempted = live.len();
        let mut succeeded = 0usize;
        let mut admitted: Vec<Secret> = Vec::with_capacity(attempted);
        for record in live {
            match self.keys.decrypt(&record.ciphertext, use_master) {
                Ok(_) => {
                    succeeded += 1;
                    admitted.push(Secret::from_record(record));
                }
                Err(_) => warn!(id = %record.id, "persisted record failed strict decryption"),
            }
        }

        let rejected = if attempted > 3 {
            succeeded * 2 < attempted
        } else {
            succeeded == 0
        };
        if rejected {
            warn!(
                attempted,
                succeeded,
                "decryption success ratio below threshold -- admitting nothing"
            );
            return Err(SigilError::CorruptionDetected {
                attempted,
                succeeded,
            });
        }

        for secret in admitted {
            self.table.insert(secret);
        }
        let failures = attempted - succeeded;
        self.decrypt_attempts += attempted;
        self.decrypt_failures += failures;
        if attempted > 3 && failures * 10 > attempted * 3 {
            self.recover_from_decryption_failure().await;
        }

        debug!(loaded = succeeded, failures, "persisted secrets admitted");
        Ok(succeeded)
    }

    /// Repair or reset after a high decryption failure rate.
    ///
    /// Least-destructive first: every durable record that still decrypts
    /// under the active key is re-encrypted and re-persisted, and the
    /// unreadable rest is tombstoned. Only when nothing can be salvaged
    /// is the durable store wiped and rebuilt from the in-memory
    /// survivors.
    pub(crate) async fn recover_from_decryption_failure(&mut self) {
        self.decrypt_attempts = 0;
        self.decrypt_failures = 0;
        let Some(backend) = self.backend.clone() else {
            return;
        };
        let use_master = self.protection == Protection::Unlocked;
        info!("high decryption failure rate -- attempting repair");

        let records = match backend.get_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "repair aborted -- durable store unreachable");
                self.backend = None;
                return;
            }
        };

        let mut repaired = 0usize;
        let mut broken: Vec<String> = Vec::new();
        for record in records {
            if record.id == VERIFICATION_MARKER_ID {
                continue;
            }
            let Ok(plaintext) = self.keys.decrypt(&record.ciphertext, use_master) else {
                broken.push(record.id);
                continue;
            };
            let Ok(ciphertext) = self.keys.encrypt(&plaintext, use_master) else {
                continue;
            };
            let mut fresh = record;
            fresh.ciphertext = ciphertext;
            if backend.put(&fresh).await.is_ok() {
                if let Some(secret) = self.table.get_mut(&fresh.id) {
                    secret.ciphertext = fresh.ciphertext.clone();
                }
                repaired += 1;
            }
        }

        if repaired > 0 {
            for id in &broken {
                let _ = backend.delete(id).await;
            }
            info!(repaired, dropped = broken.len(), "repair complete");
            return;
        }

        warn!("repair salvaged nothing -- resetting durable store");
        if let Err(e) = backend.clear().await {
            warn!(error = %e, "durable reset failed -- persistence disabled for this session");
            self.backend = None;
            return;
        }
        let survivors: Vec<SecretRecord> = self
            .table
            .values()
            .filter(|s| s.persist)
            .map(Secret::to_record)
            .collect();
        for record in survivors {
            let _ = backend.put(&record).await;
        }
    }
}
