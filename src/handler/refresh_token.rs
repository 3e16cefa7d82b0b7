//! Refresh token grant with rotation (RFC 6749 section 6).

use std::sync::Arc;
use async_trait::async_trait;
use tracing::debug;
use super::{check_client, TokenEndpointHandler};
use crate::oauth_core::context::RequestContext;
use crate::oauth_core::error::{OAuthError, OAuthResult};
use crate::oauth_core::grant_helpers::HandleHelper;
use crate::oauth_core::strategy::{
    AudienceMatchingStrategy, DefaultAudienceMatchingStrategy, HierarchicScopeStrategy, ScopeStrategy,
};
use crate::oauth_core::types::{grant_type, now_utc, AccessRequest, AccessResponse, TokenKind, OFFLINE_SCOPE};

/// Exchanges a refresh token for a new access token and a new refresh token.
/// The presented refresh token is revoked in the same storage step that
/// creates its successor.
pub struct RefreshTokenGrantHandler {
    helper: HandleHelper,
    scope_strategy: Arc<dyn ScopeStrategy>,
    audience_strategy: Arc<dyn AudienceMatchingStrategy>,
}

impl RefreshTokenGrantHandler {
    pub fn new(helper: HandleHelper) -> Self {
        RefreshTokenGrantHandler {
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

    fn presented_token(request: &AccessRequest) -> OAuthResult<String> {
        request
            .form_value("refresh_token")
            .map(str::to_string)
            .ok_or_else(|| OAuthError::invalid_request("The refresh token is missing from the POST body"))
    }
}

#[async_trait]
impl TokenEndpointHandler for RefreshTokenGrantHandler {
    async fn handle_token_endpoint_request(&self, ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::REFRESH_TOKEN) {
            return Err(OAuthError::UnknownRequest);
        }
        check_client(request, grant_type::REFRESH_TOKEN, &*self.scope_strategy, &*self.audience_strategy)?;

        let token = Self::presented_token(request)?;
        let strategy = self.helper.refresh_token_strategy();
        match ctx.run(strategy.validate_refresh_token(ctx, &token)).await {
            Ok(()) => {}
            Err(err @ OAuthError::InvalidGrant { .. }) => return Err(err),
            Err(OAuthError::NotFound) => {
                return Err(OAuthError::invalid_grant("The refresh token is malformed or not known"));
            }
            Err(err) => return Err(err.into_server_error()),
        }
        let signature = strategy.refresh_token_signature(&token);
        let stored = match ctx
            .run(self.helper.refresh_token_storage().get_refresh_token_session(ctx, &signature))
            .await
        {
            Ok(stored) => stored,
            Err(OAuthError::NotFound) => {
                return Err(OAuthError::invalid_grant("The refresh token is unknown or has been revoked"));
            }
            Err(err) => return Err(err.into_server_error()),
        };

        if stored.client_id != request.client().id {
            return Err(OAuthError::invalid_grant("The refresh token was issued to another client"));
        }
        if stored.session.is_expired(TokenKind::RefreshToken, now_utc()) {
            return Err(OAuthError::invalid_grant("The refresh token has expired"));
        }
        if !stored.granted_scopes.has(OFFLINE_SCOPE) {
            return Err(OAuthError::invalid_scope(format!(
                "The client was not granted scope \"{OFFLINE_SCOPE}\" and may thus not perform the \"refresh_token\" grant"
            )));
        }

        request.adopt(&stored);
        let session = request.session_mut();
        self.helper.stamp_expiry(session, TokenKind::AccessToken);
        self.helper.stamp_expiry(session, TokenKind::RefreshToken);
        debug!("refresh token accepted");
        Ok(())
    }

    async fn populate_token_endpoint_response(
        &self,
        ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !request.grant_types().exact(grant_type::REFRESH_TOKEN) {
            return Err(OAuthError::UnknownRequest);
        }
        let token = Self::presented_token(request)?;
        let old_signature = self.helper.refresh_token_strategy().refresh_token_signature(&token);

        // Rotation revokes the access tokens of the old grant, so it runs first.
        self.helper.rotate_refresh_token(ctx, request, &old_signature, response).await?;
        self.helper.issue_access_token(ctx, request, response).await
    }
}
