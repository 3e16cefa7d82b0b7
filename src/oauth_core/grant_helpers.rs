use std::sync::Arc;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, instrument};
use super::config::GrantConfig;
use super::context::RequestContext;
use super::error::{OAuthError, OAuthResult};
use super::oauth_provider::{AccessTokenStorage, AccessTokenStrategy, RefreshTokenStorage, RefreshTokenStrategy};
use super::types::{now_utc, AccessResponse, Request, Session, TokenKind, BEARER};

/// Response extension key holding the refresh token.
pub const REFRESH_TOKEN_EXTRA: &str = "refresh_token";

/// Generates, persists and reports access and refresh tokens for the grant handlers.
#[derive(Clone)]
pub struct HandleHelper {
    access_token_strategy: Arc<dyn AccessTokenStrategy>,
    access_token_storage: Arc<dyn AccessTokenStorage>,
    refresh_token_strategy: Arc<dyn RefreshTokenStrategy>,
    refresh_token_storage: Arc<dyn RefreshTokenStorage>,
    config: GrantConfig,
}

impl HandleHelper {
    /// Constructs a new helper.
    pub fn new(
        access_token_strategy: Arc<dyn AccessTokenStrategy>,
        access_token_storage: Arc<dyn AccessTokenStorage>,
        refresh_token_strategy: Arc<dyn RefreshTokenStrategy>,
        refresh_token_storage: Arc<dyn RefreshTokenStorage>,
        config: GrantConfig,
    ) -> Self {
        HandleHelper {
            access_token_strategy,
            access_token_storage,
            refresh_token_strategy,
            refresh_token_storage,
            config,
        }
    }

    pub fn config(&self) -> &GrantConfig {
        &self.config
    }

    pub fn refresh_token_strategy(&self) -> &Arc<dyn RefreshTokenStrategy> {
        &self.refresh_token_strategy
    }

    pub fn refresh_token_storage(&self) -> &Arc<dyn RefreshTokenStorage> {
        &self.refresh_token_storage
    }

    /// Sets the expiry of `kind` to now plus its configured lifespan.
    pub fn stamp_expiry(&self, session: &mut Session, kind: TokenKind) -> DateTime<Utc> {
        let expires_at = now_utc() + self.config.lifespan(kind);
        session.set_expires_at(kind, expires_at);
        expires_at
    }

    // Keeps an expiry stamped while the request was authorized.
    fn ensure_expiry(&self, session: &mut Session, kind: TokenKind) -> DateTime<Utc> {
        match session.expires_at(kind) {
            Some(at) => at,
            None => self.stamp_expiry(session, kind),
        }
    }

    /// Generate an access token, persist its session and write it into `response`.
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id()))]
    pub async fn issue_access_token(
        &self,
        ctx: &RequestContext,
        request: &mut Request,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        let expires_at = self.ensure_expiry(request.session_mut(), TokenKind::AccessToken);
        let (token, signature) = ctx
            .run(self.access_token_strategy.generate_access_token(ctx, request))
            .await
            .map_err(OAuthError::into_server_error)?;
        ctx.run(self.access_token_storage.create_access_token_session(ctx, &signature, request.sanitize(&[])))
            .await
            .map_err(OAuthError::into_server_error)?;

        response.set_access_token(token);
        response.set_token_type(BEARER);
        response.set_expires_in(seconds_until(expires_at));
        response.set_scopes(request.granted_scopes());
        debug!("access token issued");
        Ok(())
    }

    /// Generate a refresh token, persist its session and add it to `response`.
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id()))]
    pub async fn issue_refresh_token(
        &self,
        ctx: &RequestContext,
        request: &mut Request,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        self.ensure_expiry(request.session_mut(), TokenKind::RefreshToken);
        let (token, signature) = ctx
            .run(self.refresh_token_strategy.generate_refresh_token(ctx, request))
            .await
            .map_err(OAuthError::into_server_error)?;
        ctx.run(self.refresh_token_storage.create_refresh_token_session(ctx, &signature, request.sanitize(&[])))
            .await
            .map_err(OAuthError::into_server_error)?;

        response.set_extra(REFRESH_TOKEN_EXTRA, Value::String(token));
        debug!("refresh token issued");
        Ok(())
    }

    /// Replace the refresh token with signature `old_signature` by a new one.
    /// A token that was already rotated fails with `InvalidGrant`.
    #[instrument(skip_all, level = "debug", fields(request_id = %request.id()))]
    pub async fn rotate_refresh_token(
        &self,
        ctx: &RequestContext,
        request: &mut Request,
        old_signature: &str,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        self.ensure_expiry(request.session_mut(), TokenKind::RefreshToken);
        let (token, signature) = ctx
            .run(self.refresh_token_strategy.generate_refresh_token(ctx, request))
            .await
            .map_err(OAuthError::into_server_error)?;
        let stored = request.sanitize(&[]);
        match ctx
            .run(self.refresh_token_storage.rotate_refresh_token(ctx, old_signature, &signature, stored))
            .await
        {
            Ok(()) => {}
            Err(OAuthError::NotFound) => {
                return Err(OAuthError::invalid_grant("The refresh token has already been used"));
            }
            Err(err) => return Err(err.into_server_error()),
        }

        response.set_extra(REFRESH_TOKEN_EXTRA, Value::String(token));
        debug!("refresh token rotated");
        Ok(())
    }
}

fn seconds_until(at: DateTime<Utc>) -> u64 {
    (at - now_utc()).num_seconds().max(0) as u64
}
