//! In-memory default implementations of the storage and credential traits.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::instrument;
use super::context::RequestContext;
use super::error::{OAuthError, OAuthResult};
use super::oauth_provider::{AccessTokenStorage, AuthorizeCodeStorage, CredentialStore, RefreshTokenStorage};
use super::types::StoredRequest;

#[derive(Default)]
struct Sessions {
    access_tokens: HashMap<String, StoredRequest>,
    refresh_tokens: HashMap<String, StoredRequest>,
    authorize_codes: HashMap<String, StoredRequest>,
}

/// In-memory storage backend for token sessions, authorization codes and
/// resource owner credentials.
///
/// All token sessions sit behind a single lock so that refresh token rotation
/// is observed as one step.
#[derive(Clone, Default)]
pub struct MemoryStore {
    sessions: Arc<RwLock<Sessions>>,
    users: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource owner.
    pub fn with_user(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.add_user(username, password);
        self
    }

    /// Registers or replaces a resource owner.
    pub fn add_user(&self, username: impl Into<String>, password: impl Into<String>) {
        self.users.insert(username.into(), password.into());
    }

    /// Number of active access token sessions.
    pub async fn access_token_count(&self) -> usize {
        self.sessions.read().await.access_tokens.len()
    }

    /// Number of active refresh token sessions.
    pub async fn refresh_token_count(&self) -> usize {
        self.sessions.read().await.refresh_tokens.len()
    }
}

#[async_trait]
impl AccessTokenStorage for MemoryStore {
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id))]
    async fn create_access_token_session(&self, _ctx: &RequestContext, signature: &str, request: StoredRequest) -> OAuthResult<()> {
        let mut guard = self.sessions.write().await;
        guard.access_tokens.insert(signature.to_string(), request);
        Ok(())
    }

    async fn get_access_token_session(&self, _ctx: &RequestContext, signature: &str) -> OAuthResult<StoredRequest> {
        let guard = self.sessions.read().await;
        guard.access_tokens.get(signature).cloned().ok_or(OAuthError::NotFound)
    }

    async fn delete_access_token_session(&self, _ctx: &RequestContext, signature: &str) -> OAuthResult<()> {
        let mut guard = self.sessions.write().await;
        guard.access_tokens.remove(signature);
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStorage for MemoryStore {
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id))]
    async fn create_refresh_token_session(&self, _ctx: &RequestContext, signature: &str, request: StoredRequest) -> OAuthResult<()> {
        let mut guard = self.sessions.write().await;
        guard.refresh_tokens.insert(signature.to_string(), request);
        Ok(())
    }

    async fn get_refresh_token_session(&self, _ctx: &RequestContext, signature: &str) -> OAuthResult<StoredRequest> {
        let guard = self.sessions.read().await;
        guard.refresh_tokens.get(signature).cloned().ok_or(OAuthError::NotFound)
    }

    async fn revoke_refresh_token(&self, _ctx: &RequestContext, signature: &str) -> OAuthResult<()> {
        let mut guard = self.sessions.write().await;
        guard.refresh_tokens.remove(signature);
        Ok(())
    }

    #[instrument(skip_all, level = "debug", fields(request_id = %request.id))]
    async fn rotate_refresh_token(
        &self,
        _ctx: &RequestContext,
        old_signature: &str,
        new_signature: &str,
        request: StoredRequest,
    ) -> OAuthResult<()> {
        let mut guard = self.sessions.write().await;
        let old = guard.refresh_tokens.remove(old_signature).ok_or(OAuthError::NotFound)?;
        guard.access_tokens.retain(|_, stored| stored.id != old.id);
        guard.refresh_tokens.insert(new_signature.to_string(), request);
        Ok(())
    }
}

#[async_trait]
impl AuthorizeCodeStorage for MemoryStore {
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id))]
    async fn create_authorize_code_session(&self, _ctx: &RequestContext, signature: &str, request: StoredRequest) -> OAuthResult<()> {
        let mut guard = self.sessions.write().await;
        guard.authorize_codes.insert(signature.to_string(), request);
        Ok(())
    }

    async fn get_authorize_code_session(&self, _ctx: &RequestContext, signature: &str) -> OAuthResult<StoredRequest> {
        let guard = self.sessions.read().await;
        guard.authorize_codes.get(signature).cloned().ok_or(OAuthError::NotFound)
    }

    async fn invalidate_authorize_code_session(&self, _ctx: &RequestContext, signature: &str) -> OAuthResult<()> {
        let mut guard = self.sessions.write().await;
        guard.authorize_codes.remove(signature).map(|_| ()).ok_or(OAuthError::NotFound)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn authenticate(&self, _ctx: &RequestContext, username: &str, password: &str) -> OAuthResult<()> {
        match self.users.get(username) {
            Some(entry) if entry.value() == password => Ok(()),
            _ => Err(OAuthError::NotFound),
        }
    }
}
