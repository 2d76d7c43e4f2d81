// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end lifecycle tests: persistence across reloads, password
//! verification, and corrupted-store handling.
//!
//! A "reload" here means dropping the `Vault` and constructing a new one
//! over the same backend and session record, exactly what a process
//! restart does.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use secrecy::{ExposeSecret, SecretString};
use sigil_config::{SessionRecord, StorageConfig, VaultConfig};
use sigil_core::{SecretBackend, SigilError, VERIFICATION_MARKER_ID};
use sigil_storage::SqliteBackend;
use sigil_vault::{EnablePersistence, StoreOptions, Vault};

fn test_config() -> VaultConfig {
    VaultConfig {
        kdf_memory_cost: 32768,
        kdf_iterations: 2,
        kdf_parallelism: 1,
        default_ttl_secs: 600,
        max_ttl_secs: 3600,
        ..VaultConfig::default()
    }
}

async fn open_backend(dir: &Path) -> Arc<SqliteBackend> {
    let config = StorageConfig {
        database_path: dir.join("sigil.db").to_string_lossy().into_owned(),
        wal_mode: true,
        session_path: String::new(),
    };
    Arc::new(SqliteBackend::open(&config).await.unwrap())
}

fn session_path(dir: &Path) -> PathBuf {
    dir.join("session.json")
}

/// Construct a vault the way the composition root does after a reload:
/// session record from disk, backend injected, base-key auto-load.
async fn reload_vault(dir: &Path, backend: &Arc<SqliteBackend>) -> Vault {
    let session = SessionRecord::load(&session_path(dir)).unwrap();
    let vault = Vault::new(
        test_config(),
        Some(backend.clone() as Arc<dyn SecretBackend>),
        session,
        session_path(dir),
    );
    vault.init().await.unwrap();
    vault
}

fn protect_with(password: &str) -> EnablePersistence {
    EnablePersistence {
        password_protected: true,
        password: Some(SecretString::from(password.to_string())),
    }
}

#[tokio::test]
async fn unprotected_persistence_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault
        .enable_persistence(EnablePersistence::default())
        .await
        .unwrap();
    let id = vault
        .store_secret("sk-persisted", "api_key", StoreOptions::default())
        .await
        .unwrap();
    drop(vault);

    let vault = reload_vault(dir.path(), &backend).await;
    let status = vault.status().await;
    assert!(status.persistence_enabled);
    assert!(!status.needs_unlock);
    let value = vault.get_secret(&id).await.unwrap().unwrap();
    assert_eq!(value.expose_secret(), "sk-persisted");
}

#[tokio::test]
async fn protected_vault_reloads_locked_and_unlocks_with_correct_password() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("p@ss")).await.unwrap();

    let mut stored: Vec<(sigil_core::SecretId, String)> = Vec::new();
    for (value, kind, label) in [
        ("sk-one", "api_key", Some("first")),
        ("tok-two", "token", None),
        ("pw-three", "password", Some("third")),
    ] {
        let id = vault
            .store_secret(
                value,
                kind,
                StoreOptions {
                    label: label.map(str::to_string),
                    ..StoreOptions::default()
                },
            )
            .await
            .unwrap();
        stored.push((id, value.to_string()));
    }
    let before: BTreeSet<(String, String, Option<String>)> = vault
        .list_secrets()
        .await
        .into_iter()
        .map(|m| (m.id.0, m.kind, m.label))
        .collect();
    drop(vault);

    // Reload: the vault must come back locked and list nothing.
    let vault = reload_vault(dir.path(), &backend).await;
    let status = vault.status().await;
    assert!(status.needs_unlock);
    assert!(!status.has_active_master_key);
    assert!(vault.list_secrets().await.is_empty());
    assert!(matches!(
        vault.get_secret(&stored[0].0).await,
        Err(SigilError::VaultLocked)
    ));
    assert!(matches!(
        vault
            .store_secret("x", "api_key", StoreOptions::default())
            .await,
        Err(SigilError::VaultLocked)
    ));

    // Unlock restores the identical id/kind/label set and every value.
    let loaded = vault.unlock_database("p@ss").await.unwrap();
    assert_eq!(loaded, 3);
    let after: BTreeSet<(String, String, Option<String>)> = vault
        .list_secrets()
        .await
        .into_iter()
        .map(|m| (m.id.0, m.kind, m.label))
        .collect();
    assert_eq!(before, after);
    for (id, value) in &stored {
        let plaintext = vault.get_secret(id).await.unwrap().unwrap();
        assert_eq!(plaintext.expose_secret(), value);
    }
}

#[tokio::test]
async fn wrong_password_admits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault
        .enable_persistence(protect_with("right"))
        .await
        .unwrap();
    vault
        .store_secret("sensitive", "api_key", StoreOptions::default())
        .await
        .unwrap();
    drop(vault);

    let vault = reload_vault(dir.path(), &backend).await;
    let result = vault.unlock_database("wrong").await;
    assert!(matches!(result, Err(SigilError::PasswordMismatch)));
    assert!(vault.list_secrets().await.is_empty());
    assert!(vault.status().await.needs_unlock);

    // The correct password still works afterwards -- nothing was mutated.
    vault.unlock_database("right").await.unwrap();
    assert_eq!(vault.list_secrets().await.len(), 1);
}

#[tokio::test]
async fn marker_is_never_listed_but_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("pw")).await.unwrap();
    vault
        .store_secret("v", "api_key", StoreOptions::default())
        .await
        .unwrap();

    assert!(vault
        .list_secrets()
        .await
        .iter()
        .all(|m| m.id.0 != VERIFICATION_MARKER_ID));

    let records = backend.get_all().await.unwrap();
    assert!(records.iter().any(|r| r.id == VERIFICATION_MARKER_ID));
}

#[tokio::test]
async fn change_password_with_wrong_old_leaves_everything_intact() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault
        .enable_persistence(protect_with("original"))
        .await
        .unwrap();
    let id = vault
        .store_secret("guarded", "api_key", StoreOptions::default())
        .await
        .unwrap();

    let result = vault.change_password("new", "not-the-password").await;
    assert!(matches!(result, Err(SigilError::PasswordMismatch)));

    // Still readable in this session.
    assert_eq!(
        vault.get_secret(&id).await.unwrap().unwrap().expose_secret(),
        "guarded"
    );
    drop(vault);

    // And the original password still unlocks after a reload.
    let vault = reload_vault(dir.path(), &backend).await;
    vault.unlock_database("original").await.unwrap();
    assert_eq!(
        vault.get_secret(&id).await.unwrap().unwrap().expose_secret(),
        "guarded"
    );
}

#[tokio::test]
async fn change_password_with_correct_old_reencrypts_everything() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("old-pw")).await.unwrap();
    let id = vault
        .store_secret("rotating", "api_key", StoreOptions::default())
        .await
        .unwrap();

    vault.change_password("new-pw", "old-pw").await.unwrap();
    drop(vault);

    let vault = reload_vault(dir.path(), &backend).await;
    assert!(matches!(
        vault.unlock_database("old-pw").await,
        Err(SigilError::PasswordMismatch)
    ));
    vault.unlock_database("new-pw").await.unwrap();
    assert_eq!(
        vault.get_secret(&id).await.unwrap().unwrap().expose_secret(),
        "rotating"
    );
}

#[tokio::test]
async fn bootstrap_unlock_accepts_password_on_markerless_database() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    // A session record that claims protection, but an empty database:
    // the state left behind when a vault was wiped out-of-band.
    let mut session = SessionRecord::default();
    session.persistence_enabled = true;
    session.password_protected = true;
    session.save(&session_path(dir.path())).unwrap();

    let vault = reload_vault(dir.path(), &backend).await;
    assert!(vault.status().await.needs_unlock);

    vault.unlock_database("fresh-password").await.unwrap();
    assert!(!vault.status().await.needs_unlock);

    // The bootstrap created and persisted a marker.
    let records = backend.get_all().await.unwrap();
    assert!(records.iter().any(|r| r.id == VERIFICATION_MARKER_ID));

    // The chosen password is now binding.
    drop(vault);
    let vault = reload_vault(dir.path(), &backend).await;
    assert!(matches!(
        vault.unlock_database("something-else").await,
        Err(SigilError::PasswordMismatch)
    ));
    vault.unlock_database("fresh-password").await.unwrap();
}

#[tokio::test]
async fn majority_corruption_rejects_the_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("pw")).await.unwrap();
    for i in 0..10 {
        vault
            .store_secret(&format!("value-{i}"), "api_key", StoreOptions::default())
            .await
            .unwrap();
    }
    drop(vault);

    // Corrupt 6 of the 10 records with high-entropy garbage that still
    // "looks encrypted" -- simulating noise written under a foreign key.
    let mut corrupted = 0;
    for mut record in backend.get_all().await.unwrap() {
        if record.id == VERIFICATION_MARKER_ID || corrupted >= 6 {
            continue;
        }
        record.ciphertext = "u8Fh3kQ9zX2mP7vL5nB1cR4tW6yJ0aDgSfHjKlMnOpQrStUvWxYz12345678".to_string();
        backend.put(&record).await.unwrap();
        corrupted += 1;
    }
    assert_eq!(corrupted, 6);

    let vault = reload_vault(dir.path(), &backend).await;
    let result = vault.unlock_database("pw").await;
    assert!(
        matches!(
            result,
            Err(SigilError::PasswordMismatch) | Err(SigilError::CorruptionDetected { .. })
        ),
        "a majority-corrupt store must reject the load: {result:?}"
    );
    // Nothing was admitted into memory.
    assert!(vault.list_secrets().await.is_empty());
}

#[tokio::test]
async fn minority_corruption_triggers_repair_and_keeps_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("pw")).await.unwrap();
    for i in 0..10 {
        vault
            .store_secret(&format!("value-{i}"), "api_key", StoreOptions::default())
            .await
            .unwrap();
    }
    drop(vault);

    // 4 of 10 corrupt: above the 30% repair trigger, below the 50%
    // rejection threshold.
    let mut corrupted = 0;
    for mut record in backend.get_all().await.unwrap() {
        if record.id == VERIFICATION_MARKER_ID || corrupted >= 4 {
            continue;
        }
        record.ciphertext = "u8Fh3kQ9zX2mP7vL5nB1cR4tW6yJ0aDgSfHjKlMnOpQrStUvWxYz12345678".to_string();
        backend.put(&record).await.unwrap();
        corrupted += 1;
    }

    let vault = reload_vault(dir.path(), &backend).await;
    let loaded = vault.unlock_database("pw").await.unwrap();
    assert_eq!(loaded, 6);
    assert_eq!(vault.list_secrets().await.len(), 6);

    // Repair tombstoned the unreadable records; what remains decrypts.
    let records = backend.get_all().await.unwrap();
    let non_marker = records
        .iter()
        .filter(|r| r.id != VERIFICATION_MARKER_ID)
        .count();
    assert_eq!(non_marker, 6);
}

#[tokio::test]
async fn disable_persistence_with_wipe_keeps_memory_secrets_readable() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("pw")).await.unwrap();
    let id = vault
        .store_secret("ephemeral-after-all", "api_key", StoreOptions::default())
        .await
        .unwrap();

    vault.disable_persistence(true).await.unwrap();

    let status = vault.status().await;
    assert!(!status.persistence_enabled);
    assert!(!status.password_protected);
    // Still readable in memory, now under the base key.
    assert_eq!(
        vault.get_secret(&id).await.unwrap().unwrap().expose_secret(),
        "ephemeral-after-all"
    );
    // Durable store is empty.
    assert!(backend.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_password_protection_wipes_store_and_downgrades_to_base_key() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("pw")).await.unwrap();
    let id = vault
        .store_secret("downgraded", "api_key", StoreOptions::default())
        .await
        .unwrap();

    vault.remove_password_protection().await.unwrap();

    let status = vault.status().await;
    assert!(!status.password_protected);
    assert!(!status.has_active_master_key);
    assert!(status.persistence_enabled);
    assert_eq!(
        vault.get_secret(&id).await.unwrap().unwrap().expose_secret(),
        "downgraded"
    );

    // Survivors were re-persisted under the base key; no marker remains.
    let records = backend.get_all().await.unwrap();
    assert!(records.iter().all(|r| r.id != VERIFICATION_MARKER_ID));
    assert_eq!(records.len(), 1);

    // And they load without a password after a reload.
    drop(vault);
    let vault = reload_vault(dir.path(), &backend).await;
    assert_eq!(
        vault.get_secret(&id).await.unwrap().unwrap().expose_secret(),
        "downgraded"
    );
}

#[tokio::test]
async fn expired_records_are_skipped_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault
        .enable_persistence(EnablePersistence::default())
        .await
        .unwrap();
    let short = vault
        .store_secret(
            "blink",
            "token",
            StoreOptions {
                ttl: Some(StdDuration::from_secs(0)),
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();
    let long = vault
        .store_secret("stay", "token", StoreOptions::default())
        .await
        .unwrap();
    drop(vault);

    let vault = reload_vault(dir.path(), &backend).await;
    assert!(vault.get_secret(&short).await.unwrap().is_none());
    assert_eq!(
        vault.get_secret(&long).await.unwrap().unwrap().expose_secret(),
        "stay"
    );
    assert_eq!(vault.list_secrets().await.len(), 1);
}

#[tokio::test]
async fn marker_verification_rejects_wrong_password_without_the_precheck() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("pw")).await.unwrap();
    vault
        .store_secret("guarded", "api_key", StoreOptions::default())
        .await
        .unwrap();
    drop(vault);

    // Simulate an older session record with no password hash: the cheap
    // pre-check passes everything through to marker verification.
    let mut session = SessionRecord::load(&session_path(dir.path())).unwrap();
    session.password_hash.clear();
    session.save(&session_path(dir.path())).unwrap();

    let vault = reload_vault(dir.path(), &backend).await;
    assert!(matches!(
        vault.unlock_database("wrong").await,
        Err(SigilError::PasswordMismatch)
    ));
    assert!(vault.list_secrets().await.is_empty());

    vault.unlock_database("pw").await.unwrap();
    assert_eq!(vault.list_secrets().await.len(), 1);
}

#[tokio::test]
async fn stale_session_hash_precheck_rejects_before_kdf() {
    let dir = tempfile::tempdir().unwrap();
    let backend = open_backend(dir.path()).await;

    let vault = reload_vault(dir.path(), &backend).await;
    vault.enable_persistence(protect_with("real")).await.unwrap();
    drop(vault);

    let vault = reload_vault(dir.path(), &backend).await;
    // The pre-check alone rejects; the marker is never consulted.
    assert!(matches!(
        vault.unlock_database("bogus").await,
        Err(SigilError::PasswordMismatch)
    ));
}
