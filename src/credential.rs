//! RPC credential generation.
//!
//! The control-plane credential is a username plus a freshly derived
//! high-entropy secret. Secrets come exclusively from the operating system's
//! cryptographic random source; if that source is unavailable the pipeline
//! aborts rather than falling back to anything predictable.

use crate::error::{ProvisionError, Result};
use rand::RngCore;
use rand::rngs::OsRng;

/// Environment variable overriding the credential username.
pub const RPC_USER_ENV: &str = "MERIDIAN_RPC_USER";

/// Default credential username.
pub const DEFAULT_RPC_USER: &str = "meridian-rpc";

/// Length of generated secrets.
pub const SECRET_LEN: usize = 32;

/// Password-safe secret alphabet: 64 symbols, so one masked byte maps to
/// exactly one symbol with no modulo bias. Excludes `=`, `+`, and `/`,
/// which clash with `key=value` config syntax and URL encoding.
const SECRET_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// A username/secret pair authenticating local control-plane access to the
/// launched daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The RPC username.
    pub user: String,
    /// The generated high-entropy secret.
    pub secret: String,
}

impl Credential {
    /// Generate a credential with a fresh secret.
    ///
    /// The username comes from the `MERIDIAN_RPC_USER` environment variable
    /// when set and non-empty, otherwise [`DEFAULT_RPC_USER`].
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::EntropyUnavailable`] if the OS random
    /// source fails.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            user: resolve_user(),
            secret: generate_secret()?,
        })
    }

    /// The `user:secret` form persisted to the side credential file.
    #[must_use]
    pub fn file_line(&self) -> String {
        format!("{}:{}\n", self.user, self.secret)
    }
}

/// Resolve the credential username from the environment or the default.
fn resolve_user() -> String {
    match std::env::var(RPC_USER_ENV) {
        Ok(user) if !user.trim().is_empty() => user.trim().to_owned(),
        _ => DEFAULT_RPC_USER.to_owned(),
    }
}

/// Generate a [`SECRET_LEN`]-character secret from the OS random source.
///
/// Each output symbol consumes one random byte masked to six bits, indexing
/// the 64-symbol alphabet uniformly.
///
/// # Errors
///
/// Returns [`ProvisionError::EntropyUnavailable`] if the OS random source
/// fails; there is no weaker fallback.
pub fn generate_secret() -> Result<String> {
    let mut bytes = [0u8; SECRET_LEN];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| ProvisionError::EntropyUnavailable {
            reason: e.to_string(),
        })?;
    Ok(bytes
        .iter()
        .map(|b| char::from(SECRET_ALPHABET[usize::from(b & 0x3f)]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_has_required_length() {
        let secret = generate_secret().expect("OS random source available");
        assert_eq!(secret.len(), SECRET_LEN);
    }

    #[test]
    fn secret_uses_only_password_safe_alphabet() {
        let secret = generate_secret().expect("OS random source available");
        for c in secret.chars() {
            assert!(
                c.is_ascii_alphanumeric() || c == '-' || c == '_',
                "unexpected secret character {c:?}"
            );
        }
        assert!(!secret.contains('='));
        assert!(!secret.contains('+'));
        assert!(!secret.contains('/'));
    }

    #[test]
    fn consecutive_secrets_differ() {
        let first = generate_secret().expect("OS random source available");
        let second = generate_secret().expect("OS random source available");
        assert_ne!(first, second);
    }

    #[test]
    fn alphabet_has_exactly_sixty_four_distinct_symbols() {
        let mut symbols: Vec<u8> = SECRET_ALPHABET.to_vec();
        symbols.sort_unstable();
        symbols.dedup();
        assert_eq!(symbols.len(), 64);
    }

    #[test]
    fn username_defaults_without_override() {
        temp_env::with_var_unset(RPC_USER_ENV, || {
            let credential = Credential::generate().expect("generate");
            assert_eq!(credential.user, DEFAULT_RPC_USER);
        });
    }

    #[test]
    fn username_respects_environment_override() {
        temp_env::with_var(RPC_USER_ENV, Some("operator"), || {
            let credential = Credential::generate().expect("generate");
            assert_eq!(credential.user, "operator");
        });
    }

    #[test]
    fn blank_override_falls_back_to_default() {
        temp_env::with_var(RPC_USER_ENV, Some("   "), || {
            let credential = Credential::generate().expect("generate");
            assert_eq!(credential.user, DEFAULT_RPC_USER);
        });
    }

    #[test]
    fn file_line_is_colon_separated() {
        let credential = Credential {
            user: "operator".to_owned(),
            secret: "s".repeat(SECRET_LEN),
        };
        assert_eq!(credential.file_line(), format!("operator:{}\n", "s".repeat(32)));
    }
}
