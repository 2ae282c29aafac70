//! Bearer token registry.
//!
//! Maps opaque tokens to usernames. Tokens are either preloaded from
//! configuration or issued at runtime (tests, embedding). How a user obtains
//! a token is outside this server.

use std::collections::HashMap;

use parking_lot::RwLock;
use uuid::Uuid;

/// Thread-safe token → username map.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: RwLock<HashMap<String, String>>,
}

impl TokenRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry preloaded with `token → username` entries.
    #[must_use]
    pub fn with_tokens(tokens: HashMap<String, String>) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    /// Issues a new random token for `username` and returns it.
    pub fn issue(&self, username: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens
            .write()
            .insert(token.clone(), username.to_string());
        token
    }

    /// Returns the username a token was issued to.
    #[must_use]
    pub fn username_for(&self, token: &str) -> Option<String> {
        if token.is_empty() {
            return None;
        }
        self.tokens.read().get(token).cloned()
    }

    /// Withdraws a token. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }
}
