//! In-memory authentication state
//!
//! Holds the token and refresh code for the lifetime of the process. The pair
//! is stored as a single `Option<Credentials>`, so it is either fully set or
//! fully cleared; there is no way to observe one field without the other.
//! Nothing here is persisted.

use std::sync::{PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};

/// A token together with the refresh code that renews it
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Short-lived access token sent with each request
    pub token: SecretString,
    /// Longer-lived code exchanged for a new token
    pub refresh_code: SecretString,
}

impl Credentials {
    pub fn new(token: impl Into<String>, refresh_code: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
            refresh_code: SecretString::from(refresh_code.into()),
        }
    }
}

/// Shared holder for the current session
///
/// Wrap it in an `Arc` and hand the same instance to every client that should
/// see the same login.
#[derive(Debug, Default)]
pub struct AuthStore {
    session: RwLock<Option<Credentials>>,
}

impl AuthStore {
    /// Create an empty (logged out) store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that starts with the given credentials
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            session: RwLock::new(Some(credentials)),
        }
    }

    /// Current access token, if one is held
    pub fn token(&self) -> Option<SecretString> {
        self.read(|creds| creds.token.clone())
    }

    /// Current refresh code, if one is held
    pub fn refresh_code(&self) -> Option<SecretString> {
        self.read(|creds| creds.refresh_code.clone())
    }

    /// Copy of the full credential pair
    pub fn snapshot(&self) -> Option<Credentials> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The credential pair, only if both halves are non-empty
    pub fn refreshable(&self) -> Option<Credentials> {
        self.snapshot().filter(|creds| {
            !creds.token.expose_secret().is_empty()
                && !creds.refresh_code.expose_secret().is_empty()
        })
    }

    /// Whether a token is currently held
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Replace both credentials in one write
    pub fn set_credentials(&self, credentials: Credentials) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = Some(credentials);
    }

    /// Clear both credentials (logout)
    pub fn reset(&self) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    // Empty strings count as absent.
    fn read(&self, field: impl Fn(&Credentials) -> SecretString) -> Option<SecretString> {
        let guard = self.session.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .map(field)
            .filter(|secret| !secret.expose_secret().is_empty())
    }
}

/// Mask a secret for display, keeping only its edges
pub fn mask_secret(secret: &SecretString) -> String {
    let exposed = secret.expose_secret();
    let len = exposed.chars().count();
    if len <= 8 {
        "*".repeat(len)
    } else {
        let head: String = exposed.chars().take(4).collect();
        let tail: String = exposed.chars().skip(len - 4).collect();
        format!("{}...{}", head, tail)
    }
}
