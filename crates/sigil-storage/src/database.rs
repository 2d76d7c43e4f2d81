// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread; the [`Database`] struct IS the single writer. Query functions
//! accept `&Database` and call through `conn.call()`. Do NOT create
//! additional Connection instances for writes.

use std::path::Path;

use sigil_core::SigilError;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite database backing the durable store.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database at `path` and run pending migrations.
    ///
    /// Idempotent: re-opening an existing database re-applies PRAGMAs and
    /// skips already-applied migrations. Parent directories are created
    /// as needed. Any failure maps to `PersistenceUnavailable` so the
    /// caller can degrade to memory-only persistence.
    pub async fn open(path: &str, wal_mode: bool) -> Result<Self, SigilError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| SigilError::PersistenceUnavailable(format!("{}: {e}", path)))?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| SigilError::PersistenceUnavailable(e.to_string()))?;

        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            if wal_mode {
                conn.pragma_update(None, "journal_mode", "WAL")?;
            }
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(|e| SigilError::PersistenceUnavailable(e.to_string()))?;

        conn.call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(|e| SigilError::PersistenceUnavailable(e.to_string()))?;

        debug!(path = %path, "database opened");
        Ok(Self { conn })
    }

    /// Returns the underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &tokio_rusqlite::Connection {
        &self.conn
    }

    /// Checkpoint the WAL and flush pending writes.
    pub async fn close(&self) -> Result<(), SigilError> {
        self.conn
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

/// Convert tokio-rusqlite errors to `SigilError::Storage`.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> SigilError {
    SigilError::Storage {
        source: Box::new(e),
    }
}
