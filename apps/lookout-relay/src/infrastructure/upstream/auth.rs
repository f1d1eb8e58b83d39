//! Session Credential Forwarding
//!
//! The relay never performs its own login: the browser completes the
//! upstream platform's credential/2FA flow and holds an `auth` cookie. Each
//! relay request forwards that cookie value as-is, and every upstream call
//! is made with it. A missing or empty credential is an authentication
//! error surfaced immediately, with no retry.

use thiserror::Error;

/// Name of the upstream session cookie forwarded by the browser.
pub const AUTH_COOKIE: &str = "auth";

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while extracting or using the session credential.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No session credential was presented.
    #[error("missing session credential: no `{AUTH_COOKIE}` cookie")]
    MissingCredential,

    /// The upstream platform rejected the credential.
    #[error("upstream rejected session credential")]
    Rejected,
}

// =============================================================================
// Session Token
// =============================================================================

/// An opaque upstream session credential scoped to one browser session.
///
/// The `Debug` implementation redacts the value for safe logging.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
}

impl SessionToken {
    /// Create a token from a raw cookie value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] if the value is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, AuthError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AuthError::MissingCredential);
        }
        Ok(Self { value })
    }

    /// Extract the token from a `Cookie` request header value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingCredential`] if the header does not carry
    /// a non-empty `auth` cookie.
    pub fn from_cookie_header(header: &str) -> Result<Self, AuthError> {
        header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                (name.trim() == AUTH_COOKIE).then(|| value.trim())
            })
            .find(|value| !value.is_empty())
            .map_or(Err(AuthError::MissingCredential), Self::new)
    }

    /// The raw credential value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Render the credential as a `Cookie` header value for upstream calls.
    #[must_use]
    pub fn as_cookie_header(&self) -> String {
        format!("{AUTH_COOKIE}={}", self.value)
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionToken")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_value_is_missing_credential() {
        assert!(matches!(
            SessionToken::new(""),
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            SessionToken::new("   "),
            Err(AuthError::MissingCredential)
        ));
    }

    #[test]
    fn extracts_auth_cookie_among_others() {
        let token =
            SessionToken::from_cookie_header("theme=dark; auth=authcookie_abc123; lang=en")
                .unwrap();
        assert_eq!(token.value(), "authcookie_abc123");
    }

    #[test]
    fn missing_auth_cookie_is_error() {
        assert!(matches!(
            SessionToken::from_cookie_header("theme=dark; lang=en"),
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            SessionToken::from_cookie_header("auth="),
            Err(AuthError::MissingCredential)
        ));
    }

    #[test]
    fn cookie_header_round_trip() {
        let token = SessionToken::new("authcookie_xyz").unwrap();
        assert_eq!(token.as_cookie_header(), "auth=authcookie_xyz");
    }

    #[test]
    fn debug_is_redacted() {
        let token = SessionToken::new("authcookie_secret").unwrap();
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
