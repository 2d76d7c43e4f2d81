// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AES-256-GCM encrypted secret vault.
//!
//! The vault keeps an in-memory table of encrypted secrets, hands out
//! opaque id handles instead of raw values, optionally persists
//! ciphertext through a durable store backend, and can be locked and
//! unlocked with a user password. Two deterministic keys protect the
//! data: a base key derived from a fixed non-secret seed (used when no
//! password is set) and a master key derived from the user's password
//! via Argon2id.

pub mod crypto;
pub mod kdf;
pub mod keys;
pub mod lifecycle;
pub mod store;
pub mod vault;

pub use keys::KeyManager;
pub use lifecycle::EnablePersistence;
pub use store::{start_expiry_sweeper, Secret};
pub use vault::{BulkSecret, StoreOptions, Vault};
