//! Grant handlers and the endpoint dispatchers that drive them.
//!
//! Every handler checks, in this order: the client is allowed the grant type,
//! every requested scope is covered by the client's scopes, the requested
//! audience is covered by the client's audience, then its own credentials or
//! grant state.

pub mod authorize_code;
pub mod client_credentials;
pub mod implicit;
pub mod refresh_token;
pub mod resource_owner;

use std::sync::Arc;
use async_trait::async_trait;
use tracing::{debug, instrument, warn};
use crate::oauth_core::context::RequestContext;
use crate::oauth_core::error::{ErrorKind, OAuthError, OAuthResult};
use crate::oauth_core::strategy::{AudienceMatchingStrategy, ScopeStrategy};
use crate::oauth_core::types::{AccessRequest, AccessResponse, AuthorizeRequest, AuthorizeResponse, Request};

pub use authorize_code::AuthorizeExplicitGrantHandler;
pub use client_credentials::ClientCredentialsGrantHandler;
pub use implicit::AuthorizeImplicitGrantHandler;
pub use refresh_token::RefreshTokenGrantHandler;
pub use resource_owner::ResourceOwnerPasswordCredentialsGrantHandler;

/// Two-phase contract of a token endpoint grant handler.
///
/// Both methods return [`OAuthError::UnknownRequest`] when the request's grant
/// type is not the handler's own.
#[async_trait]
pub trait TokenEndpointHandler: Send + Sync + 'static {
    /// Validates and authorizes the request. Persists nothing.
    async fn handle_token_endpoint_request(&self, ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()>;

    /// Issues the tokens of an authorized request into `response`.
    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()>;
}

/// Authorize endpoint handler, keyed on the response type.
#[async_trait]
pub trait AuthorizeEndpointHandler: Send + Sync + 'static {
    async fn handle_authorize_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> OAuthResult<()>;
}

/// Client permission, scope and audience checks shared by all handlers.
pub(crate) fn check_client(
    request: &Request,
    grant_type: &str,
    scope_strategy: &dyn ScopeStrategy,
    audience_strategy: &dyn AudienceMatchingStrategy,
) -> OAuthResult<()> {
    let client = request.client();
    if !client.grant_types.has(grant_type) {
        return Err(OAuthError::invalid_request(format!(
            "The client is not allowed to use authorization grant \"{grant_type}\""
        )));
    }
    for scope in request.requested_scopes().iter() {
        if !scope_strategy.matches(&client.scopes, scope) {
            return Err(OAuthError::invalid_scope(format!(
                "The client is not allowed to request scope \"{scope}\""
            )));
        }
    }
    if !audience_strategy.matches(&client.audience, request.requested_audience()) {
        return Err(OAuthError::invalid_request(format!(
            "Requested audience \"{}\" has not been whitelisted by the client",
            request.requested_audience().join(" ")
        )));
    }
    Ok(())
}

/// The client must be registered for the response type it asks for.
pub(crate) fn check_response_type(request: &AuthorizeRequest, response_type: &str) -> OAuthResult<()> {
    if !request.client().response_types.has(response_type) {
        return Err(OAuthError::invalid_request(format!(
            "The client is not allowed to request response type \"{response_type}\""
        )));
    }
    Ok(())
}

/// A redirect URI, when given, must be registered for the client.
pub(crate) fn check_redirect_uri(request: &AuthorizeRequest) -> OAuthResult<()> {
    match request.redirect_uri() {
        Some(uri) if !request.client().redirect_uris.iter().any(|r| r == uri) => Err(
            OAuthError::invalid_request(format!("The redirect URI \"{uri}\" is not registered for the client")),
        ),
        _ => Ok(()),
    }
}

/// Ordered chain of token endpoint handlers.
#[derive(Clone, Default)]
pub struct TokenEndpoint {
    handlers: Vec<Arc<dyn TokenEndpointHandler>>,
}

impl TokenEndpoint {
    /// Creates an endpoint without handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the chain.
    pub fn handler(mut self, handler: Arc<dyn TokenEndpointHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offers the request to every handler. Fails with the first rejection, or
    /// with `UnsupportedGrantType` when no handler claims the request.
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id(), grant_types = %request.grant_types().join(" ")))]
    pub async fn handle_token_endpoint_request(&self, ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()> {
        let mut found = false;
        for handler in &self.handlers {
            ctx.check()?;
            match handler.handle_token_endpoint_request(ctx, request).await {
                Ok(()) => found = true,
                Err(err) if err.is(ErrorKind::UnknownRequest) => continue,
                Err(err) => {
                    warn!(error = %err, error_code = err.error_code(), hint = err.hint().unwrap_or_default(), "token endpoint request rejected");
                    return Err(err);
                }
            }
        }
        if !found {
            warn!("no handler is responsible for the token endpoint request");
            return Err(OAuthError::UnsupportedGrantType);
        }
        request.mark_authorized();
        debug!("token endpoint request authorized");
        Ok(())
    }

    /// Lets every handler populate `response`. The request must have been
    /// authorized by [`TokenEndpoint::handle_token_endpoint_request`].
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id()))]
    pub async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !request.is_authorized() {
            return Err(OAuthError::server_error("The access request has not been authorized"));
        }
        for handler in &self.handlers {
            ctx.check()?;
            match handler.populate_token_endpoint_response(ctx, request, response).await {
                Ok(()) => {}
                Err(err) if err.is(ErrorKind::UnknownRequest) => continue,
                Err(err) => {
                    warn!(error = %err, error_code = err.error_code(), hint = err.hint().unwrap_or_default(), "token endpoint response failed");
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Runs both phases and returns the populated response.
    pub async fn new_access_response(&self, ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<AccessResponse> {
        self.handle_token_endpoint_request(ctx, request).await?;
        let mut response = AccessResponse::new();
        self.populate_token_endpoint_response(ctx, request, &mut response).await?;
        if response.access_token().is_empty() {
            return Err(OAuthError::server_error("No handler issued an access token"));
        }
        Ok(response)
    }
}

/// Ordered chain of authorize endpoint handlers.
#[derive(Clone, Default)]
pub struct AuthorizeEndpoint {
    handlers: Vec<Arc<dyn AuthorizeEndpointHandler>>,
}

impl AuthorizeEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the chain.
    pub fn handler(mut self, handler: Arc<dyn AuthorizeEndpointHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Offers the request to every handler and returns the redirect parameters.
    /// The host is expected to have granted the consented scopes beforehand.
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id(), response_types = %request.response_types().join(" ")))]
    pub async fn new_authorize_response(&self, ctx: &RequestContext, request: &mut AuthorizeRequest) -> OAuthResult<AuthorizeResponse> {
        let mut response = AuthorizeResponse::new();
        let mut found = false;
        for handler in &self.handlers {
            ctx.check()?;
            match handler.handle_authorize_endpoint_request(ctx, request, &mut response).await {
                Ok(()) => found = true,
                Err(err) if err.is(ErrorKind::UnknownRequest) => continue,
                Err(err) => {
                    warn!(error = %err, error_code = err.error_code(), hint = err.hint().unwrap_or_default(), "authorize endpoint request rejected");
                    return Err(err);
                }
            }
        }
        if !found {
            return Err(OAuthError::UnsupportedResponseType);
        }
        Ok(response)
    }
}
