//! Source of the bearer token used for the namespace handshake.

use parking_lot::RwLock;

/// Supplies the current access token, if the user is signed in
///
/// Read once per activation of an [`OrderSync`](crate::sync::OrderSync).
/// Refreshing or expiring tokens is the store's business.
pub trait SessionStore: Send + Sync {
    /// Current bearer token
    fn access_token(&self) -> Option<String>;
}

/// In-memory session store
#[derive(Debug, Default)]
pub struct SharedSession {
    token: RwLock<Option<String>>,
}

impl SharedSession {
    /// Create a signed-out session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session holding `token`
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Replace the token
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    /// Sign out
    pub fn clear(&self) {
        *self.token.write() = None;
    }
}

impl SessionStore for SharedSession {
    fn access_token(&self) -> Option<String> {
        self.token.read().clone().filter(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_lifecycle() {
        let session = SharedSession::new();
        assert_eq!(session.access_token(), None);

        session.set_token("abc");
        assert_eq!(session.access_token().as_deref(), Some("abc"));

        session.set_token("");
        assert_eq!(session.access_token(), None);

        session.clear();
        assert_eq!(SharedSession::with_token("t").access_token().as_deref(), Some("t"));
    }
}
