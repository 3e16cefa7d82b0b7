//! Authorization code grant (RFC 6749 section 4.1).

use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;
use super::{check_client, check_redirect_uri, check_response_type, AuthorizeEndpointHandler, TokenEndpointHandler};
use crate::oauth_core::context::RequestContext;
use crate::oauth_core::error::{OAuthError, OAuthResult};
use crate::oauth_core::grant_helpers::HandleHelper;
use crate::oauth_core::oauth_provider::{AuthorizeCodeStorage, AuthorizeCodeStrategy};
use crate::oauth_core::strategy::{
    AudienceMatchingStrategy, DefaultAudienceMatchingStrategy, HierarchicScopeStrategy, ScopeStrategy,
};
use crate::oauth_core::types::{
    grant_type, now_utc, response_type, AccessRequest, AccessResponse, AuthorizeRequest, AuthorizeResponse,
    TokenKind,
};

/// Issues authorization codes at the authorize endpoint and exchanges them
/// for tokens at the token endpoint.
///
/// A refresh token accompanies the access token whenever the client may use
/// the `refresh_token` grant. Codes are single use: the code is invalidated
/// before any token is issued, so a storage failure during issuance leaves the
/// code spent and the client has to restart the authorization.
pub struct AuthorizeExplicitGrantHandler {
    authorize_code_strategy: Arc<dyn AuthorizeCodeStrategy>,
    authorize_code_storage: Arc<dyn AuthorizeCodeStorage>,
    helper: HandleHelper,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
}

impl AuthorizeExplicitGrantHandler {
    pub fn new(
        authorize_code_strategy: Arc<dyn AuthorizeCodeStrategy>,
        authorize_code_storage: Arc<dyn AuthorizeCodeStorage>,
        helper: HandleHelper,
    ) -> Self {
        AuthorizeExplicitGrantHandler {
            authorize_code_strategy,
            authorize_code_storage,
            helper,
            scope_strategy: Arc::new(HierarchicScopeStrategy),
            audience_strategy: Arc::new(DefaultAudienceMatchingStrategy),
        }
    }

    pub fn scope_strategy(mut self, strategy: Arc<dyn ScopeStrategy>) -> Self {
        self.scope_strategy = strategy;
        self
    }

    pub fn audience_strategy(mut self, strategy: Arc<dyn AudienceMatchingStrategy>) -> Self {
        self.audience_strategy = strategy;
        self
    }

    fn code_signature(&self, request: &AccessRequest) -> OAuthResult<String> {
        request
            .form_value("code")
            .map(|code| self.authorize_code_strategy.authorize_code_signature(code))
            .ok_or_else(|| OAuthError::invalid_request("The authorization code is missing from the POST body"))
    }
}

#[async_trait]
impl AuthorizeEndpointHandler for AuthorizeExplicitGrantHandler {
    async fn handle_authorize_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> OAuthResult<()> {
        if !request.response_types().exact(response_type::CODE) {
            return Err(OAuthError::UnknownRequest);
        }
        check_response_type(request, response_type::CODE)?;
        check_client(request, grant_type::AUTHORIZATION_CODE, &*self.scope_strategy, &*self.audience_strategy)?;
        check_redirect_uri(request)?;

        self.helper.stamp_expiry(request.session_mut(), TokenKind::AuthorizeCode);
        let (code, signature) = ctx
            .run(self.authorize_code_strategy.generate_authorize_code(ctx, request))
            .await
            .map_err(OAuthError::into_server_error)?;
        ctx.run(self.authorize_code_storage.create_authorize_code_session(ctx, &signature, request.sanitize(&[])))
            .await
            .map_err(OAuthError::into_server_error)?;
        debug!("authorization code issued");

        response.add_query("code", code);
        if let Some(state) = request.state() {
            response.add_query("state", state);
        }
        if !request.granted_scopes().is_empty() {
            response.add_query("scope", request.granted_scopes().join(" "));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenEndpointHandler for AuthorizeExplicitGrantHandler {
    async fn handle_token_endpoint_request(&self, ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::AUTHORIZATION_CODE) {
            return Err(OAuthError::UnknownRequest);
        }
        check_client(request, grant_type::AUTHORIZATION_CODE, &*self.scope_strategy, &*self.audience_strategy)?;

        let code = request
            .form_value("code")
            .ok_or_else(|| OAuthError::invalid_request("The authorization code is missing from the POST body"))?
            .to_string();
        match ctx.run(self.authorize_code_strategy.validate_authorize_code(ctx, &code)).await {
            Ok(()) => {}
            Err(err @ OAuthError::InvalidGrant { .. }) => return Err(err),
            Err(OAuthError::NotFound) => {
                return Err(OAuthError::invalid_grant("The authorization code is malformed or not known"));
            }
            Err(err) => return Err(err.into_server_error()),
        }
        let signature = self.authorize_code_strategy.authorize_code_signature(&code);
        let stored = match ctx.run(self.authorize_code_storage.get_authorize_code_session(ctx, &signature)).await {
            Ok(stored) => stored,
            Err(OAuthError::NotFound) => {
                return Err(OAuthError::invalid_grant("The authorization code is unknown or has already been used"));
            }
            Err(err) => return Err(err.into_server_error()),
        };

        if stored.client_id != request.client().id {
            return Err(OAuthError::invalid_grant("The authorization code was issued to another client"));
        }
        if stored.session.is_expired(TokenKind::AuthorizeCode, now_utc()) {
            return Err(OAuthError::invalid_grant("The authorization code has expired"));
        }
        if let Some(uri) = stored.redirect_uri.as_deref() {
            if request.form_value("redirect_uri") != Some(uri) {
                return Err(OAuthError::invalid_grant(
                    "The redirect_uri does not match the one used in the authorization request",
                ));
            }
        }

        request.adopt(&stored);
        let issue_refresh = request.client().grant_types.has(grant_type::REFRESH_TOKEN);
        let session = request.session_mut();
        self.helper.stamp_expiry(session, TokenKind::AccessToken);
        if issue_refresh {
            self.helper.stamp_expiry(session, TokenKind::RefreshToken);
        }
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::AUTHORIZATION_CODE) {
            return Err(OAuthError::UnknownRequest);
        }
        let signature = self.code_signature(request)?;
        match ctx.run(self.authorize_code_storage.invalidate_authorize_code_session(ctx, &signature)).await {
            Ok(()) => {}
            Err(OAuthError::NotFound) => {
                return Err(OAuthError::invalid_grant("The authorization code has already been used"));
            }
            Err(err) => return Err(err.into_server_error()),
        }

        self.helper.issue_access_token(ctx, request, response).await?;
        if request.client().grant_types.has(grant_type::REFRESH_TOKEN) {
            self.helper.issue_refresh_token(ctx, request, response).await?;
        }
        Ok(())
    }
}
