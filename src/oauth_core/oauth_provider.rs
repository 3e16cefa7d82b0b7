//! Capabilities the grant handlers need from the host: token strategies,
//! token storage and the resource owner credential store.

use async_trait::async_trait;
use super::context::RequestContext;
use super::error::OAuthResult;
use super::types::{Request, StoredRequest};

/// Generates access tokens and derives their storage signatures.
#[async_trait]
pub trait AccessTokenStrategy: Send + Sync + 'static {
    /// Storage signature of an access token value.
    fn access_token_signature(&self, token: &str) -> String;

    /// Returns `(token, signature)`.
    async fn generate_access_token(&self, ctx: &RequestContext, request: &Request) -> OAuthResult<(String, String)>;
}

/// Generates and validates refresh tokens.
#[async_trait]
pub trait RefreshTokenStrategy: Send + Sync + 'static {
    fn refresh_token_signature(&self, token: &str) -> String;

    /// Returns `(token, signature)`.
    async fn generate_refresh_token(&self, ctx: &RequestContext, request: &Request) -> OAuthResult<(String, String)>;

    /// Checks the integrity of a presented refresh token. Fails with `InvalidGrant`.
    async fn validate_refresh_token(&self, ctx: &RequestContext, token: &str) -> OAuthResult<()>;
}

/// Generates and validates authorization codes.
#[async_trait]
pub trait AuthorizeCodeStrategy: Send + Sync + 'static {
    fn authorize_code_signature(&self, code: &str) -> String;

    /// Returns `(code, signature)`.
    async fn generate_authorize_code(&self, ctx: &RequestContext, request: &Request) -> OAuthResult<(String, String)>;

    /// Checks the integrity of a presented code. Fails with `InvalidGrant`.
    async fn validate_authorize_code(&self, ctx: &RequestContext, code: &str) -> OAuthResult<()>;
}

/// Persists access token sessions keyed by signature.
#[async_trait]
pub trait AccessTokenStorage: Send + Sync + 'static {
    async fn create_access_token_session(&self, ctx: &RequestContext, signature: &str, request: StoredRequest) -> OAuthResult<()>;

    /// Fails with `NotFound` for unknown signatures.
    async fn get_access_token_session(&self, ctx: &RequestContext, signature: &str) -> OAuthResult<StoredRequest>;

    async fn delete_access_token_session(&self, ctx: &RequestContext, signature: &str) -> OAuthResult<()>;
}

/// Persists refresh token sessions keyed by signature.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync + 'static {
    async fn create_refresh_token_session(&self, ctx: &RequestContext, signature: &str, request: StoredRequest) -> OAuthResult<()>;

    /// Fails with `NotFound` for unknown or revoked signatures.
    async fn get_refresh_token_session(&self, ctx: &RequestContext, signature: &str) -> OAuthResult<StoredRequest>;

    async fn revoke_refresh_token(&self, ctx: &RequestContext, signature: &str) -> OAuthResult<()>;

    /// Atomically revokes `old_signature`, together with the access tokens
    /// issued under the same request id, and creates `new_signature`.
    /// Concurrent readers observe either the old or the new token, never both.
    /// Fails with `NotFound` if `old_signature` is no longer active.
    async fn rotate_refresh_token(
        &self,
        ctx: &RequestContext,
        old_signature: &str,
        new_signature: &str,
        request: StoredRequest,
    ) -> OAuthResult<()>;
}

/// Persists authorization code sessions keyed by signature.
#[async_trait]
pub trait AuthorizeCodeStorage: Send + Sync + 'static {
    async fn create_authorize_code_session(&self, ctx: &RequestContext, signature: &str, request: StoredRequest) -> OAuthResult<()>;

    /// Fails with `NotFound` for unknown or already used codes.
    async fn get_authorize_code_session(&self, ctx: &RequestContext, signature: &str) -> OAuthResult<StoredRequest>;

    /// Marks a code as used. Fails with `NotFound` if it already was.
    async fn invalidate_authorize_code_session(&self, ctx: &RequestContext, signature: &str) -> OAuthResult<()>;
}

/// Resource owner credential store used by the password grant.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    /// `Ok` on success, `NotFound` for unknown users or wrong passwords,
    /// anything else for lookup failures.
    async fn authenticate(&self, ctx: &RequestContext, username: &str, password: &str) -> OAuthResult<()>;
}
