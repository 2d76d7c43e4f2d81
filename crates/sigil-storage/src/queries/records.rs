// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Secret record CRUD operations.
//!
//! Deletes are tombstones: the row stays but is excluded from reads.
//! Timestamps are stored as RFC 3339 TEXT.

use chrono::{DateTime, Utc};
use rusqlite::params;
use sigil_core::{SecretRecord, SigilError};

use crate::database::{map_tr_err, Database};

/// Insert or replace a record under its id. Re-putting an id clears any
/// tombstone on it.
pub async fn put_record(db: &Database, record: &SecretRecord) -> Result<(), SigilError> {
    let record = record.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO secret_records
                     (id, ciphertext, kind, label, created_at, expires_at, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
                params![
                    record.id,
                    record.ciphertext,
                    record.kind,
                    record.label,
                    record.created_at.to_rfc3339(),
                    record.expires_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// All live (non-tombstoned) records.
pub async fn get_all_records(db: &Database) -> Result<Vec<SecretRecord>, SigilError> {
    type Row = (String, String, String, Option<String>, String, String);
    let rows: Vec<Row> = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ciphertext, kind, label, created_at, expires_at
                 FROM secret_records WHERE deleted = 0",
            )?;
            let mapped = stmt.query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?;
            let mut rows = Vec::new();
            for row in mapped {
                rows.push(row?);
            }
            Ok(rows)
        })
        .await
        .map_err(map_tr_err)?;

    rows.into_iter()
        .map(|(id, ciphertext, kind, label, created_at, expires_at)| {
            Ok(SecretRecord {
                id,
                ciphertext,
                kind,
                label,
                created_at: parse_timestamp(&created_at)?,
                expires_at: parse_timestamp(&expires_at)?,
            })
        })
        .collect()
}

/// Tombstone the record with the given id. Absent ids are a no-op.
pub async fn tombstone_record(db: &Database, id: &str) -> Result<(), SigilError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE secret_records SET deleted = 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Physically remove every record, tombstoned or not.
pub async fn clear_records(db: &Database) -> Result<(), SigilError> {
    db.connection()
        .call(|conn| {
            conn.execute("DELETE FROM secret_records", [])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SigilError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SigilError::Serialization(format!("bad timestamp '{raw}': {e}")))
}
