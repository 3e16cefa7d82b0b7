//! Implicit grant (RFC 6749 section 4.2).

use std::sync::Arc;
use async_trait::async_trait;
use super::{check_client, check_redirect_uri, check_response_type, AuthorizeEndpointHandler, TokenEndpointHandler};
use crate::oauth_core::context::RequestContext;
use crate::oauth_core::error::{OAuthError, OAuthResult};
use crate::oauth_core::grant_helpers::HandleHelper;
use crate::oauth_core::strategy::{
    AudienceMatchingStrategy, DefaultAudienceMatchingStrategy, HierarchicScopeStrategy, ScopeStrategy,
};
use crate::oauth_core::types::{
    grant_type, response_type, AccessRequest, AccessResponse, AuthorizeRequest, AuthorizeResponse, TokenKind,
};

/// Issues access tokens directly, either from the authorize endpoint
/// (`response_type=token`) or for token endpoint requests carrying the
/// `implicit` grant type. Never issues refresh tokens.
pub struct AuthorizeImplicitGrantHandler {
    helper: HandleHelper,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
}

impl AuthorizeImplicitGrantHandler {
    pub fn new(helper: HandleHelper) -> Self {
        AuthorizeImplicitGrantHandler {
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
}

#[async_trait]
impl TokenEndpointHandler for AuthorizeImplicitGrantHandler {
    async fn handle_token_endpoint_request(&self, _ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::IMPLICIT) {
            return Err(OAuthError::UnknownRequest);
        }
        check_client(request, grant_type::IMPLICIT, &*self.scope_strategy, &*self.audience_strategy)?;
        self.helper.stamp_expiry(request.session_mut(), TokenKind::AccessToken);
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::IMPLICIT) {
            return Err(OAuthError::UnknownRequest);
        }
        self.helper.issue_access_token(ctx, request, response).await
    }
}

#[async_trait]
impl AuthorizeEndpointHandler for AuthorizeImplicitGrantHandler {
    async fn handle_authorize_endpoint_request(
        &self,
        ctx: &RequestContext,
        request: &mut AuthorizeRequest,
        response: &mut AuthorizeResponse,
    ) -> OAuthResult<()> {
        if !request.response_types().exact(response_type::TOKEN) {
            return Err(OAuthError::UnknownRequest);
        }
        check_response_type(request, response_type::TOKEN)?;
        check_client(request, grant_type::IMPLICIT, &*self.scope_strategy, &*self.audience_strategy)?;
        check_redirect_uri(request)?;

        self.helper.stamp_expiry(request.session_mut(), TokenKind::AccessToken);
        let mut issued = AccessResponse::new();
        self.helper.issue_access_token(ctx, request, &mut issued).await?;

        response.add_fragment("access_token", issued.access_token());
        response.add_fragment("token_type", issued.token_type());
        if let Some(expires_in) = issued.expires_in() {
            response.add_fragment("expires_in", expires_in.to_string());
        }
        if !issued.scope().is_empty() {
            response.add_fragment("scope", issued.scope());
        }
        if let Some(state) = request.state() {
            response.add_fragment("state", state);
        }
        Ok(())
    }
}
