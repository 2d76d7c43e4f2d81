// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Sigil secret vault.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a
//! single-writer concurrency model via `tokio-rusqlite`, and the
//! [`SqliteBackend`] implementation of the `SecretBackend` trait.
//! Opening the database is idempotent (create-if-missing); a backend
//! that cannot be opened surfaces `PersistenceUnavailable` so the vault
//! can degrade to memory-only instead of crashing.

pub mod backend;
pub mod database;
pub mod migrations;
pub mod queries;

pub use backend::SqliteBackend;
pub use database::Database;
