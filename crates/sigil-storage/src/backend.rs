// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `SecretBackend` trait.

use async_trait::async_trait;
use tracing::debug;

use sigil_config::StorageConfig;
use sigil_core::{SecretBackend, SecretRecord, SigilError};

use crate::database::Database;
use crate::queries::records;

/// SQLite-backed durable store for encrypted secret records.
///
/// Wraps a [`Database`] handle and delegates to the typed query module.
/// Construction opens the database eagerly so the vault can decide up
/// front whether persistence is available this session.
pub struct SqliteBackend {
    db: Database,
}

impl SqliteBackend {
    /// Open the durable store described by `config`.
    ///
    /// Returns `PersistenceUnavailable` when the database cannot be
    /// opened or migrated; callers degrade to memory-only persistence.
    pub async fn open(config: &StorageConfig) -> Result<Self, SigilError> {
        let db = Database::open(&config.database_path, config.wal_mode).await?;
        debug!(path = %config.database_path, "secret backend ready");
        Ok(Self { db })
    }

    /// Returns the underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl SecretBackend for SqliteBackend {
    async fn put(&self, record: &SecretRecord) -> Result<(), SigilError> {
        records::put_record(&self.db, record).await
    }

    async fn get_all(&self) -> Result<Vec<SecretRecord>, SigilError> {
        records::get_all_records(&self.db).await
    }

    async fn delete(&self, id: &str) -> Result<(), SigilError> {
        records::tombstone_record(&self.db, id).await
    }

    async fn clear(&self) -> Result<(), SigilError> {
        records::clear_records(&self.db).await
    }
}
