//! Resource owner password credentials grant (RFC 6749 section 4.3).

use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;
use super::{check_client, TokenEndpointHandler};
use crate::oauth_core::context::RequestContext;
use crate::oauth_core::error::{OAuthError, OAuthResult};
use crate::oauth_core::grant_helpers::HandleHelper;
use crate::oauth_core::oauth_provider::CredentialStore;
use crate::oauth_core::strategy::{
    AudienceMatchingStrategy, DefaultAudienceMatchingStrategy, HierarchicScopeStrategy, ScopeStrategy,
};
use crate::oauth_core::types::{grant_type, AccessRequest, AccessResponse, TokenKind, OFFLINE_SCOPE};

/// Exchanges a username and password for tokens. A refresh token is issued
/// only when the `offline` scope was granted.
pub struct ResourceOwnerPasswordCredentialsGrantHandler {
    credential_store: Arc<dyn CredentialStore>,
    helper: HandleHelper,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
}

impl ResourceOwnerPasswordCredentialsGrantHandler {
    pub fn new(credential_store: Arc<dyn CredentialStore>, helper: HandleHelper) -> Self {
        ResourceOwnerPasswordCredentialsGrantHandler {
            credential_store,
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
impl TokenEndpointHandler for ResourceOwnerPasswordCredentialsGrantHandler {
    async fn handle_token_endpoint_request(&self, ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::PASSWORD) {
            return Err(OAuthError::UnknownRequest);
        }
        check_client(request, grant_type::PASSWORD, &*self.scope_strategy, &*self.audience_strategy)?;

        let (username, password) = match (request.form_value("username"), request.form_value("password")) {
            (Some(u), Some(p)) => (u.to_string(), p.to_string()),
            _ => return Err(OAuthError::invalid_request("Username or password are missing from the POST body")),
        };
        match ctx.run(self.credential_store.authenticate(ctx, &username, &password)).await {
            Ok(()) => {}
            Err(OAuthError::NotFound) => {
                return Err(OAuthError::request_unauthorized(
                    "Unable to authenticate the provided username and password credentials",
                ));
            }
            Err(err) => return Err(err.into_server_error()),
        }
        debug!("resource owner authenticated");

        let session = request.session_mut();
        session.username = Some(username);
        self.helper.stamp_expiry(session, TokenKind::AccessToken);
        self.helper.stamp_expiry(session, TokenKind::RefreshToken);
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::PASSWORD) {
            return Err(OAuthError::UnknownRequest);
        }
        self.helper.issue_access_token(ctx, request, response).await?;
        if request.granted_scopes().has(OFFLINE_SCOPE) {
            self.helper.issue_refresh_token(ctx, request, response).await?;
        }
        Ok(())
    }
}
