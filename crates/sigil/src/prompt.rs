// SPDX-FileCopyrightText: 2026 Sigil Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Password acquisition via TTY prompt or the SIGIL_VAULT_KEY
//! environment variable.

use secrecy::SecretString;
use sigil_core::SigilError;

/// The environment variable name for providing the vault password.
pub const VAULT_KEY_ENV_VAR: &str = "SIGIL_VAULT_KEY";

/// Get the vault password from the environment or an interactive prompt.
///
/// Priority:
/// 1. `SIGIL_VAULT_KEY` environment variable (for headless use)
/// 2. Interactive TTY prompt via `rpassword`
///
/// Returns an error if neither source is available.
pub fn get_password(label: &str) -> Result<SecretString, SigilError> {
    if let Ok(key) = std::env::var(VAULT_KEY_ENV_VAR)
        && !key.is_empty()
    {
        return Ok(SecretString::from(key));
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("{label}: ");
        let password = rpassword::read_password()
            .map_err(|e| SigilError::Config(format!("failed to read password: {e}")))?;
        if password.is_empty() {
            return Err(SigilError::Config("empty password not allowed".to_string()));
        }
        return Ok(SecretString::from(password));
    }

    Err(SigilError::Config(
        "No password provided. Set SIGIL_VAULT_KEY or run interactively.".to_string(),
    ))
}

/// Get a new password with a confirmation prompt (for first-time setup
/// and password changes). Falls back to the env var, which needs no
/// confirmation.
pub fn get_password_with_confirm(label: &str) -> Result<SecretString, SigilError> {
    if let Ok(key) = std::env::var(VAULT_KEY_ENV_VAR)
        && !key.is_empty()
    {
        return Ok(SecretString::from(key));
    }

    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("{label}: ");
        let first = rpassword::read_password()
            .map_err(|e| SigilError::Config(format!("failed to read password: {e}")))?;
        eprint!("Confirm {label}: ");
        let second = rpassword::read_password()
            .map_err(|e| SigilError::Config(format!("failed to read password: {e}")))?;

        if first != second {
            return Err(SigilError::Config("passwords do not match".to_string()));
        }
        if first.is_empty() {
            return Err(SigilError::Config("empty password not allowed".to_string()));
        }
        return Ok(SecretString::from(first));
    }

    Err(SigilError::Config(
        "No password provided. Set SIGIL_VAULT_KEY or run interactively.".to_string(),
    ))
}

/// Read a plain (non-password) secret value from the terminal without echo.
pub fn get_secret_value() -> Result<String, SigilError> {
    if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
        eprint!("Secret value: ");
        let value = rpassword::read_password()
            .map_err(|e| SigilError::Config(format!("failed to read value: {e}")))?;
        if value.is_empty() {
            return Err(SigilError::Config("empty value not allowed".to_string()));
        }
        return Ok(value);
    }
    Err(SigilError::Config(
        "no value given and stdin is not a terminal".to_string(),
    ))
}
