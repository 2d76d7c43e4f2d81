// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable store adapter trait for secret persistence backends.

use async_trait::async_trait;

use crate::error::SigilError;
use crate::types::SecretRecord;

/// Adapter for durable key-value persistence of encrypted secret records.
///
/// Backends store opaque records keyed by secret id. They are used only
/// when persistence is enabled; the vault holds `Option<Arc<dyn
/// SecretBackend>>` and degrades to memory-only when none is available.
///
/// `delete` is a tombstone, not a physical delete: the record must stop
/// appearing in `get_all` but the implementation may keep the row around.
/// Deleting an absent id is a no-op.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Insert or replace a record under its id.
    async fn put(&self, record: &SecretRecord) -> Result<(), SigilError>;

    /// All live (non-tombstoned) records, in no particular order.
    async fn get_all(&self) -> Result<Vec<SecretRecord>, SigilError>;

    /// Tombstone the record with the given id.
    async fn delete(&self, id: &str) -> Result<(), SigilError>;

    /// Physically remove every record, tombstoned or not.
    async fn clear(&self) -> Result<(), SigilError>;
}
