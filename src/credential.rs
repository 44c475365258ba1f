//! API token loading
//!
//! The token is read once from the process environment and carried by the
//! project handle onto every outbound call. An absent variable is a fatal,
//! typed error at load time, before any remote call is attempted.

use crate::error::{Error, Result};

/// Canonical environment variable holding the service API token.
pub const API_TOKEN_ENV: &str = "TRUENO_TRACK_API_TOKEN";

/// Bearer-style API token for the hosted tracking service.
///
/// `Debug` redacts the secret so tokens cannot leak through log output.
#[derive(Clone)]
pub struct ApiToken {
    secret: String,
}

impl ApiToken {
    /// Wrap an already-obtained token string.
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Load the token from [`API_TOKEN_ENV`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] if the variable is unset or
    /// empty.
    pub fn from_env() -> Result<Self> {
        Self::from_env_var(API_TOKEN_ENV)
    }

    /// Load the token from a caller-chosen environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCredential`] if the variable is unset or
    /// empty.
    pub fn from_env_var(name: &str) -> Result<Self> {
        match std::env::var(name) {
            Ok(secret) if !secret.is_empty() => Ok(Self { secret }),
            _ => Err(Error::MissingCredential(name.to_string())),
        }
    }

    /// The raw token string, for placing on outbound calls.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(****)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_from_env_var() {
        std::env::set_var("TRUENO_TRACK_TEST_TOKEN_SET", "tok-123");
        let token = ApiToken::from_env_var("TRUENO_TRACK_TEST_TOKEN_SET").unwrap();
        assert_eq!(token.secret(), "tok-123");
    }

    #[test]
    fn test_token_missing_is_fatal() {
        let err = ApiToken::from_env_var("TRUENO_TRACK_TEST_TOKEN_UNSET").unwrap_err();
        match err {
            Error::MissingCredential(name) => {
                assert_eq!(name, "TRUENO_TRACK_TEST_TOKEN_UNSET");
            }
            other => panic!("expected MissingCredential, got {other:?}"),
        }
    }

    #[test]
    fn test_token_empty_is_missing() {
        std::env::set_var("TRUENO_TRACK_TEST_TOKEN_EMPTY", "");
        let err = ApiToken::from_env_var("TRUENO_TRACK_TEST_TOKEN_EMPTY").unwrap_err();
        assert!(matches!(err, Error::MissingCredential(_)));
    }

    #[test]
    fn test_token_debug_redacts() {
        let token = ApiToken::new("super-secret");
        let printed = format!("{token:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("****"));
    }
}
