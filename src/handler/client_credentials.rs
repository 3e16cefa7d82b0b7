//! Client credentials grant (RFC 6749 section 4.4).

use std::sync::Arc;
use async_trait::async_trait;
use super::{check_client, TokenEndpointHandler};
use crate::oauth_core::context::RequestContext;
use crate::oauth_core::error::{OAuthError, OAuthResult};
use crate::oauth_core::grant_helpers::HandleHelper;
use crate::oauth_core::strategy::{
    AudienceMatchingStrategy, DefaultAudienceMatchingStrategy, HierarchicScopeStrategy, ScopeStrategy,
};
use crate::oauth_core::types::{grant_type, AccessRequest, AccessResponse, TokenKind};

/// Issues access tokens to confidential clients acting on their own behalf.
/// Never issues refresh tokens.
pub struct ClientCredentialsGrantHandler {
    helper: HandleHelper,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
}

impl ClientCredentialsGrantHandler {
    pub fn new(helper: HandleHelper) -> Self {
        ClientCredentialsGrantHandler {
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
impl TokenEndpointHandler for ClientCredentialsGrantHandler {
    async fn handle_token_endpoint_request(&self, _ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::CLIENT_CREDENTIALS) {
            return Err(OAuthError::UnknownRequest);
        }
        check_client(request, grant_type::CLIENT_CREDENTIALS, &*self.scope_strategy, &*self.audience_strategy)?;
        if request.client().public {
            return Err(OAuthError::invalid_grant(
                "The client is public and thus not allowed to use grant type \"client_credentials\"",
            ));
        }

        // Without a resource owner every requested scope and audience is granted.
        let scopes = request.requested_scopes().clone();
        for scope in scopes.iter() {
            request.grant_scope(scope);
        }
        let audience = request.requested_audience().clone();
        for aud in audience.iter() {
            request.grant_audience(aud);
        }
        self.helper.stamp_expiry(request.session_mut(), TokenKind::AccessToken);
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::CLIENT_CREDENTIALS) {
            return Err(OAuthError::UnknownRequest);
        }
        self.helper.issue_access_token(ctx, request, response).await
    }
}
