//! HMAC-SHA256 opaque token strategy using `ring`.
//!
//! Tokens look like `<key>.<signature>`, both parts base64url without padding.
//! Storage only ever sees the signature part.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use super::context::RequestContext;
use super::error::{OAuthError, OAuthResult};
use super::oauth_provider::{AccessTokenStrategy, AuthorizeCodeStrategy, RefreshTokenStrategy};
use super::types::Request;

/// Minimum length of the HMAC secret in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Opaque token strategy backing access tokens, refresh tokens and authorization codes.
pub struct HmacShaStrategy {
    key: hmac::Key,
    entropy: usize,
    rng: SystemRandom,
}

impl HmacShaStrategy {
    /// Creates a strategy from a secret of at least [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: &[u8]) -> OAuthResult<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(OAuthError::server_error(format!(
                "The HMAC secret must be at least {MIN_SECRET_LEN} bytes long"
            )));
        }
        Ok(HmacShaStrategy {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
            entropy: 32,
            rng: SystemRandom::new(),
        })
    }

    /// Sets the number of random bytes in each token key.
    pub fn entropy(mut self, bytes: usize) -> Self {
        self.entropy = bytes.max(16);
        self
    }

    fn generate(&self) -> OAuthResult<(String, String)> {
        let mut key = vec![0u8; self.entropy];
        self.rng
            .fill(&mut key)
            .map_err(|_| OAuthError::server_error("Unable to gather entropy for a new token"))?;
        let tag = hmac::sign(&self.key, &key);
        let signature = URL_SAFE_NO_PAD.encode(tag.as_ref());
        let token = format!("{}.{}", URL_SAFE_NO_PAD.encode(&key), signature);
        Ok((token, signature))
    }

    fn signature(token: &str) -> String {
        token
            .split_once('.')
            .map(|(_, sig)| sig.to_string())
            .unwrap_or_default()
    }

    fn validate(&self, token: &str) -> OAuthResult<()> {
        let (key, sig) = token
            .split_once('.')
            .ok_or_else(|| OAuthError::invalid_grant("The token format is invalid"))?;
        let key = URL_SAFE_NO_PAD
            .decode(key)
            .map_err(|_| OAuthError::invalid_grant("The token key is not valid base64url"))?;
        let sig = URL_SAFE_NO_PAD
            .decode(sig)
            .map_err(|_| OAuthError::invalid_grant("The token signature is not valid base64url"))?;
        hmac::verify(&self.key, &key, &sig)
            .map_err(|_| OAuthError::invalid_grant("The token signature does not match"))
    }
}

#[async_trait]
impl AccessTokenStrategy for HmacShaStrategy {
    fn access_token_signature(&self, token: &str) -> String {
        Self::signature(token)
    }

    async fn generate_access_token(&self, _ctx: &RequestContext, _request: &Request) -> OAuthResult<(String, String)> {
        self.generate()
    }
}

#[async_trait]
impl RefreshTokenStrategy for HmacShaStrategy {
    fn refresh_token_signature(&self, token: &str) -> String {
        Self::signature(token)
    }

    async fn generate_refresh_token(&self, _ctx: &RequestContext, _request: &Request) -> OAuthResult<(String, String)> {
        self.generate()
    }

    async fn validate_refresh_token(&self, _ctx: &RequestContext, token: &str) -> OAuthResult<()> {
        self.validate(token)
    }
}

#[async_trait]
impl AuthorizeCodeStrategy for HmacShaStrategy {
    fn authorize_code_signature(&self, code: &str) -> String {
        Self::signature(code)
    }

    async fn generate_authorize_code(&self, _ctx: &RequestContext, _request: &Request) -> OAuthResult<(String, String)> {
        self.generate()
    }

    async fn validate_authorize_code(&self, _ctx: &RequestContext, code: &str) -> OAuthResult<()> {
        self.validate(code)
    }
}
