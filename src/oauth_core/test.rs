use std::sync::Arc;
use std::time::Duration;
use chrono::Timelike;
use super::config::GrantConfig;
use super::context::RequestContext;
use super::crypto::HmacShaStrategy;
use super::error::{ErrorKind, OAuthError};
use super::oauth_provider::{AccessTokenStrategy, RefreshTokenStrategy};
use super::strategy::*;
use super::types::*;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_hierarchic_scope_strategy() {
    let s = HierarchicScopeStrategy;
    let granted = strings(&["a.b", "offline"]);
    assert!(s.matches(&granted, "a.b"));
    assert!(s.matches(&granted, "a.b.c"));
    assert!(s.matches(&granted, "offline"));
    assert!(!s.matches(&granted, "a.bc"));
    assert!(!s.matches(&granted, "a"));
    assert!(!s.matches(&[], "foo-scope"));
}

#[test]
fn test_exact_and_wildcard_scope_strategies() {
    let granted = strings(&["read.*", "write"]);
    assert!(ExactScopeStrategy.matches(&granted, "write"));
    assert!(!ExactScopeStrategy.matches(&granted, "read.users"));
    assert!(WildcardScopeStrategy.matches(&granted, "read.users"));
    assert!(!WildcardScopeStrategy.matches(&granted, "read.users.email"));
    assert!(WildcardScopeStrategy.matches(&granted, "write"));
    assert!(!WildcardScopeStrategy.matches(&granted, "write.all"));
}

#[test]
fn test_default_audience_strategy() {
    let s = DefaultAudienceMatchingStrategy;
    let client = strings(&["https://www.ory.sh/api", "urn:service"]);
    // Empty requests always match
    assert!(s.matches(&[], &[]));
    assert!(s.matches(&client, &[]));
    assert!(s.matches(&client, &strings(&["https://www.ory.sh/api"])));
    assert!(s.matches(&client, &strings(&["https://www.ory.sh/api/users"])));
    assert!(s.matches(&client, &strings(&["https://www.ory.sh/api/", "urn:service"])));
    assert!(!s.matches(&client, &strings(&["https://www.ory.sh/apix"])));
    assert!(!s.matches(&client, &strings(&["http://www.ory.sh/api"])));
    assert!(!s.matches(&client, &strings(&["https://www.ory.sh:8443/api"])));
    assert!(!s.matches(&client, &strings(&["urn:service:child"])));
    assert!(!s.matches(&[], &strings(&["https://www.ory.sh/api"])));
}

#[test]
fn test_exact_audience_strategy() {
    let client = strings(&["https://www.ory.sh/api"]);
    assert!(ExactAudienceMatchingStrategy.matches(&client, &strings(&["https://www.ory.sh/api"])));
    assert!(!ExactAudienceMatchingStrategy.matches(&client, &strings(&["https://www.ory.sh/api/users"])));
}

#[test]
fn test_arguments_set_semantics() {
    let mut args = Arguments::from(["password", "password", "refresh_token"]);
    assert_eq!(args.len(), 2);
    assert!(args.has("refresh_token"));
    assert!(!args.exact("password"));
    args = Arguments::from(["password"]);
    assert!(args.exact("password"));
    args.append("offline");
    assert_eq!(args.join(" "), "password offline");
}

#[test]
fn test_granted_scopes_stay_within_requested() {
    let client = Arc::new(Client::new("c"));
    let mut request = Request::new(client)
        .with_requested_scopes(["foo", "offline"])
        .with_requested_audience(["https://api.local"]);
    assert!(request.grant_scope("offline"));
    assert!(!request.grant_scope("admin"));
    assert!(!request.grant_audience("https://other.local"));
    assert!(request.grant_audience("https://api.local"));
    assert_eq!(request.granted_scopes(), &Arguments::from(["offline"]));
    assert_eq!(request.granted_audience(), &Arguments::from(["https://api.local"]));
}

#[test]
fn test_sanitize_strips_form() {
    let client = Arc::new(Client::new("client1"));
    let request = Request::new(client)
        .with_form_value("username", "peter")
        .with_form_value("password", "pan")
        .with_form_value("redirect_uri", "https://app.local/cb");
    let stored = request.sanitize(&[]);
    assert!(stored.form.is_empty());
    assert_eq!(stored.client_id, "client1");
    assert_eq!(stored.id, request.id());
    let stored = request.sanitize(&["redirect_uri"]);
    assert_eq!(stored.form.len(), 1);
    assert_eq!(stored.form["redirect_uri"], "https://app.local/cb");
}

#[test]
fn test_session_expiry() {
    let mut session = Session::new();
    let now = now_utc();
    assert_eq!(now.nanosecond(), 0);
    assert!(!session.is_expired(TokenKind::AccessToken, now));
    session.set_expires_at(TokenKind::AccessToken, now - chrono::Duration::seconds(1));
    assert!(session.is_expired(TokenKind::AccessToken, now));
    assert!(session.expires_at(TokenKind::RefreshToken).is_none());
    // Sessions survive a JSON round trip with their expiry map
    let json = serde_json::to_string(&session).unwrap();
    let back: Session = serde_json::from_str(&json).unwrap();
    assert_eq!(back, session);
}

#[test]
fn test_access_response_json() {
    let mut resp = AccessResponse::new();
    resp.set_access_token("at");
    resp.set_token_type(BEARER);
    resp.set_expires_in(3600);
    resp.set_scopes(&Arguments::from(["a", "offline"]));
    resp.set_extra("refresh_token", "rt");
    let v = resp.to_json();
    assert_eq!(v["access_token"], "at");
    assert_eq!(v["token_type"], "bearer");
    assert_eq!(v["expires_in"], 3600);
    assert_eq!(v["scope"], "a offline");
    assert_eq!(v["refresh_token"], "rt");
}

#[test]
fn test_config_defaults_and_json() {
    let config = GrantConfig::default();
    assert_eq!(config.lifespan(TokenKind::AccessToken), chrono::Duration::hours(1));
    assert_eq!(config.lifespan(TokenKind::AuthorizeCode), chrono::Duration::minutes(10));
    let config = GrantConfig::from_json(r#"{ "access_token_lifespan": 60 }"#).unwrap();
    assert_eq!(config.access_token_lifespan, 60);
    assert_eq!(config.refresh_token_lifespan, GrantConfig::default().refresh_token_lifespan);
    let config = GrantConfig::new().refresh_token_lifespan(120).hmac_entropy(48);
    assert_eq!(config.lifespan(TokenKind::RefreshToken), chrono::Duration::minutes(2));
    assert_eq!(config.hmac_entropy, 48);
}

#[test]
fn test_error_kinds_and_mapping() {
    let cases = vec![
        (OAuthError::UnknownRequest, ErrorKind::UnknownRequest, "invalid_request", 400),
        (OAuthError::UnsupportedGrantType, ErrorKind::UnsupportedGrantType, "unsupported_grant_type", 400),
        (OAuthError::invalid_request("x"), ErrorKind::InvalidRequest, "invalid_request", 400),
        (OAuthError::invalid_scope("x"), ErrorKind::InvalidScope, "invalid_scope", 400),
        (OAuthError::invalid_grant("x"), ErrorKind::InvalidGrant, "invalid_grant", 400),
        (OAuthError::request_unauthorized("x"), ErrorKind::RequestUnauthorized, "request_unauthorized", 401),
        (OAuthError::server_error("x"), ErrorKind::ServerError, "server_error", 500),
    ];
    for (err, kind, code, status) in cases {
        assert_eq!(err.kind(), kind, "Kind for {:?}", err);
        assert_eq!(err.error_code(), code, "Code for {:?}", err);
        assert_eq!(err.status_code(), status, "Status for {:?}", err);
    }
    // Display does not depend on the hint
    assert_eq!(OAuthError::invalid_scope("a").to_string(), OAuthError::invalid_scope("b").to_string());
    let body = OAuthError::invalid_scope("scope \"x\"").to_json();
    assert_eq!(body["error"], "invalid_scope");
    assert_eq!(body["error_hint"], "scope \"x\"");
    assert!(OAuthError::server_error("db down").to_json().get("error_hint").is_none());
}

#[test]
fn test_into_server_error_keeps_cause() {
    use std::error::Error;
    let err = OAuthError::NotFound.into_server_error();
    assert!(err.is(ErrorKind::ServerError));
    assert!(err.source().is_some());
    let err = OAuthError::server_error("boom").into_server_error();
    assert_eq!(err.hint(), Some("boom"));
}

#[tokio::test]
async fn test_hmac_strategy_generate_and_validate() {
    let strategy = HmacShaStrategy::new(&[7u8; 32]).unwrap();
    let ctx = RequestContext::new();
    let request = Request::new(Arc::new(Client::new("c")));
    let (token, signature) = strategy.generate_refresh_token(&ctx, &request).await.unwrap();
    assert_eq!(strategy.refresh_token_signature(&token), signature);
    assert!(!token.contains(' '));
    strategy.validate_refresh_token(&ctx, &token).await.unwrap();

    // Tampered or foreign tokens are rejected
    let other = HmacShaStrategy::new(&[8u8; 32]).unwrap();
    let err = other.validate_refresh_token(&ctx, &token).await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidGrant));
    let err = strategy.validate_refresh_token(&ctx, "not-a-token").await.unwrap_err();
    assert!(err.is(ErrorKind::InvalidGrant));

    let (a, _) = strategy.generate_access_token(&ctx, &request).await.unwrap();
    let (b, _) = strategy.generate_access_token(&ctx, &request).await.unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_hmac_strategy_rejects_short_secret() {
    let err = HmacShaStrategy::new(b"short").err().unwrap();
    assert!(err.is(ErrorKind::ServerError));
}

#[tokio::test]
async fn test_request_context_cancellation() {
    let ctx = RequestContext::new();
    assert!(ctx.check().is_ok());
    let value = ctx.run(async { Ok(5) }).await.unwrap();
    assert_eq!(value, 5);

    ctx.cancel();
    assert!(ctx.check().unwrap_err().is(ErrorKind::ServerError));
    let err = ctx.run(async { Ok(()) }).await.unwrap_err();
    assert!(err.is(ErrorKind::ServerError));
}

#[tokio::test]
async fn test_request_context_deadline() {
    let ctx = RequestContext::new().timeout(Duration::from_millis(20));
    let err = ctx
        .run(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::ServerError));
    assert!(ctx.check().is_err());
}
