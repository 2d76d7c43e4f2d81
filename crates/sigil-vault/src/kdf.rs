// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Argon2id key derivation.
//!
//! Derives 32-byte keys using Argon2id (Algorithm::Argon2id,
//! Version::V0x13) with parameters from `VaultConfig` (OWASP-recommended
//! defaults). Salts are supplied by the caller: the key manager uses
//! fixed, distinct salts for the base and master keys so the same input
//! always reproduces the same key across sessions.

use sigil_core::SigilError;
use zeroize::Zeroizing;

/// Length of a derivation salt in bytes.
pub const SALT_LEN: usize = 16;

/// Derive a 32-byte key from input material using Argon2id.
///
/// The returned key is wrapped in [`Zeroizing`] for automatic memory
/// zeroing on drop. The same input + salt + params always produce the
/// same key.
pub fn derive_key(
    input: &[u8],
    salt: &[u8; SALT_LEN],
    memory_cost: u32,
    iterations: u32,
    parallelism: u32,
) -> Result<Zeroizing<[u8; 32]>, SigilError> {
    let params = argon2::Params::new(memory_cost, iterations, parallelism, Some(32))
        .map_err(|e| SigilError::KeyDerivation(format!("invalid Argon2id parameters: {e}")))?;

    let argon2 = argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(input, salt, output.as_mut())
        .map_err(|e| SigilError::KeyDerivation(format!("Argon2id key derivation failed: {e}")))?;

    Ok(output)
}
