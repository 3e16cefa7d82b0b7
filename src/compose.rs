//! Wires configuration, storage and token strategy into ready-made endpoints.

use std::sync::Arc;
use crate::handler::{
    AuthorizeEndpoint, AuthorizeExplicitGrantHandler, AuthorizeImplicitGrantHandler, ClientCredentialsGrantHandler,
    RefreshTokenGrantHandler, ResourceOwnerPasswordCredentialsGrantHandler, TokenEndpoint,
};
use crate::oauth_core::config::GrantConfig;
use crate::oauth_core::crypto::HmacShaStrategy;
use crate::oauth_core::error::OAuthResult;
use crate::oauth_core::grant_helpers::HandleHelper;
use crate::oauth_core::memory::MemoryStore;
use crate::oauth_core::oauth_provider::{
    AccessTokenStorage, AccessTokenStrategy, AuthorizeCodeStorage, AuthorizeCodeStrategy, CredentialStore,
    RefreshTokenStorage, RefreshTokenStrategy,
};

/// Token and authorize endpoints sharing one store and one token strategy.
#[derive(Clone)]
pub struct GrantProvider {
    pub token_endpoint: TokenEndpoint,
    pub authorize_endpoint: AuthorizeEndpoint,
}

/// Builds both endpoints with every core handler registered.
///
/// Token endpoint order: authorization code, refresh token, client
/// credentials, password, implicit.
pub fn compose_all<S, T>(config: GrantConfig, store: Arc<S>, strategy: Arc<T>) -> GrantProvider
where
    S: AccessTokenStorage + RefreshTokenStorage + AuthorizeCodeStorage + CredentialStore,
    T: AccessTokenStrategy + RefreshTokenStrategy + AuthorizeCodeStrategy,
{
    let helper = HandleHelper::new(
        strategy.clone(),
        store.clone(),
        strategy.clone(),
        store.clone(),
        config,
    );
    let explicit = Arc::new(AuthorizeExplicitGrantHandler::new(strategy, store.clone(), helper.clone()));
    let implicit = Arc::new(AuthorizeImplicitGrantHandler::new(helper.clone()));

    let token_endpoint = TokenEndpoint::new()
        .handler(explicit.clone())
        .handler(Arc::new(RefreshTokenGrantHandler::new(helper.clone())))
        .handler(Arc::new(ClientCredentialsGrantHandler::new(helper.clone())))
        .handler(Arc::new(ResourceOwnerPasswordCredentialsGrantHandler::new(store, helper)))
        .handler(implicit.clone());
    let authorize_endpoint = AuthorizeEndpoint::new().handler(explicit).handler(implicit);

    GrantProvider { token_endpoint, authorize_endpoint }
}

/// Composes endpoints backed by a fresh [`MemoryStore`] and an
/// [`HmacShaStrategy`] keyed with `secret`.
pub fn compose_memory(config: GrantConfig, secret: &[u8]) -> OAuthResult<(GrantProvider, Arc<MemoryStore>)> {
    let store = Arc::new(MemoryStore::new());
    let strategy = Arc::new(HmacShaStrategy::new(secret)?.entropy(config.hmac_entropy));
    Ok((compose_all(config, store.clone(), strategy), store))
}
