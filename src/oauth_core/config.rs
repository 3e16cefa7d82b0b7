//! Lifespans and token generation settings for the grant handlers.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use super::types::TokenKind;

// One hundred years; longer lifespans are clamped.
const MAX_LIFESPAN: u64 = 100 * 365 * 24 * 3600;

/// Grant configuration. Lifespans are in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrantConfig {
    /// Lifetime of access tokens.
    pub access_token_lifespan: u64,
    /// Lifetime of refresh tokens.
    pub refresh_token_lifespan: u64,
    /// Lifetime of authorization codes.
    pub authorize_code_lifespan: u64,
    /// Random bytes in every HMAC token key.
    pub hmac_entropy: usize,
}

impl Default for GrantConfig {
    fn default() -> Self {
        GrantConfig {
            access_token_lifespan: 3600,
            refresh_token_lifespan: 30 * 24 * 3600,
            authorize_code_lifespan: 600,
            hmac_entropy: 32,
        }
    }
}

impl GrantConfig {
    /// Creates a configuration with default lifespans.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Sets the access token lifespan.
    pub fn access_token_lifespan(mut self, seconds: u64) -> Self {
        self.access_token_lifespan = seconds;
        self
    }

    /// Sets the refresh token lifespan.
    pub fn refresh_token_lifespan(mut self, seconds: u64) -> Self {
        self.refresh_token_lifespan = seconds;
        self
    }

    /// Sets the authorization code lifespan.
    pub fn authorize_code_lifespan(mut self, seconds: u64) -> Self {
        self.authorize_code_lifespan = seconds;
        self
    }

    /// Sets the HMAC key entropy in bytes.
    pub fn hmac_entropy(mut self, bytes: usize) -> Self {
        self.hmac_entropy = bytes;
        self
    }

    /// Lifespan configured for `kind`.
    pub fn lifespan(&self, kind: TokenKind) -> Duration {
        let seconds = match kind {
            TokenKind::AccessToken => self.access_token_lifespan,
            TokenKind::RefreshToken => self.refresh_token_lifespan,
            TokenKind::AuthorizeCode => self.authorize_code_lifespan,
        };
        Duration::seconds(seconds.min(MAX_LIFESPAN) as i64)
    }
}
