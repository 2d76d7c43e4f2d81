// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the vault and its collaborators.

pub mod backend;

pub use backend::SecretBackend;
