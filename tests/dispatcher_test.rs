use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use starberry_grant::oauth_core::types::{grant_type, OFFLINE_SCOPE};
use starberry_grant::{
    compose_memory, AccessRequest, AccessResponse, Client, ErrorKind, GrantConfig, OAuthError, OAuthResult, Request,
    RequestContext, TokenEndpoint, TokenEndpointHandler,
};

/// Handler that claims one grant type and answers with a scripted result.
struct ScriptedHandler {
    grant: &'static str,
    reject_with: Option<fn() -> OAuthError>,
    token: Option<&'static str>,
    handled: AtomicUsize,
    populated: AtomicUsize,
}

impl ScriptedHandler {
    fn accepting(grant: &'static str, token: Option<&'static str>) -> Arc<Self> {
        Arc::new(ScriptedHandler {
            grant,
            reject_with: None,
            token,
            handled: AtomicUsize::new(0),
            populated: AtomicUsize::new(0),
        })
    }

    fn rejecting(grant: &'static str, err: fn() -> OAuthError) -> Arc<Self> {
        Arc::new(ScriptedHandler {
            grant,
            reject_with: Some(err),
            token: None,
            handled: AtomicUsize::new(0),
            populated: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenEndpointHandler for ScriptedHandler {
    async fn handle_token_endpoint_request(&self, _ctx: &RequestContext, request: &mut AccessRequest) -> OAuthResult<()> {
        if !request.grant_types().exact(self.grant) {
            return Err(OAuthError::UnknownRequest);
        }
        self.handled.fetch_add(1, Ordering::SeqCst);
        match self.reject_with {
            Some(err) => Err(err()),
            None => Ok(()),
        }
    }

    async fn populate_token_endpoint_response(
        &self,
        _ctx: &RequestContext,
        request: &mut AccessRequest,
        response: &mut AccessResponse,
    ) -> OAuthResult<()> {
        if !request.grant_types().exact(self.grant) {
            return Err(OAuthError::UnknownRequest);
        }
        self.populated.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.token {
            response.set_access_token(token);
        }
        Ok(())
    }
}

fn request_for(grant: &str) -> AccessRequest {
    AccessRequest::new([grant], Request::new(Arc::new(Client::new("c").grant_types([grant]))))
}

#[tokio::test]
async fn test_unclaimed_request_is_unsupported() {
    let handler = ScriptedHandler::accepting(grant_type::PASSWORD, Some("t"));
    let endpoint = TokenEndpoint::new().handler(handler.clone());
    let mut request = request_for("urn:custom");
    let err = endpoint
        .handle_token_endpoint_request(&RequestContext::new(), &mut request)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::UnsupportedGrantType));
    assert_eq!(err.error_code(), "unsupported_grant_type");
    assert!(!request.is_authorized());
    assert_eq!(handler.handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_endpoint_rejects_everything() {
    let endpoint = TokenEndpoint::new();
    assert!(endpoint.is_empty());
    let mut request = request_for(grant_type::PASSWORD);
    let err = endpoint.new_access_response(&RequestContext::new(), &mut request).await.unwrap_err();
    assert!(err.is(ErrorKind::UnsupportedGrantType));
}

#[tokio::test]
async fn test_rejection_is_returned_unmasked() {
    let first = ScriptedHandler::rejecting(grant_type::PASSWORD, || OAuthError::invalid_scope("nope"));
    let second = ScriptedHandler::accepting(grant_type::PASSWORD, Some("t"));
    let endpoint = TokenEndpoint::new().handler(first.clone()).handler(second.clone());
    assert_eq!(endpoint.len(), 2);

    let mut request = request_for(grant_type::PASSWORD);
    let err = endpoint
        .handle_token_endpoint_request(&RequestContext::new(), &mut request)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::InvalidScope));
    assert_eq!(err.hint(), Some("nope"));
    assert_eq!(second.handled.load(Ordering::SeqCst), 0);
    assert!(!request.is_authorized());
}

#[tokio::test]
async fn test_every_claiming_handler_runs() {
    let first = ScriptedHandler::accepting(grant_type::PASSWORD, None);
    let second = ScriptedHandler::accepting(grant_type::PASSWORD, Some("issued"));
    let other = ScriptedHandler::accepting(grant_type::CLIENT_CREDENTIALS, Some("wrong"));
    let endpoint = TokenEndpoint::new().handler(first.clone()).handler(other.clone()).handler(second.clone());

    let mut request = request_for(grant_type::PASSWORD);
    let response = endpoint.new_access_response(&RequestContext::new(), &mut request).await.unwrap();
    assert_eq!(response.access_token(), "issued");
    assert!(request.is_authorized());
    for handler in [&first, &second] {
        assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
        assert_eq!(handler.populated.load(Ordering::SeqCst), 1);
    }
    assert_eq!(other.handled.load(Ordering::SeqCst), 0);
    assert_eq!(other.populated.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_populate_requires_authorization() {
    let handler = ScriptedHandler::accepting(grant_type::PASSWORD, Some("t"));
    let endpoint = TokenEndpoint::new().handler(handler.clone());
    let mut request = request_for(grant_type::PASSWORD);
    let mut response = AccessResponse::new();
    let err = endpoint
        .populate_token_endpoint_response(&RequestContext::new(), &mut request, &mut response)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::ServerError));
    assert_eq!(handler.populated.load(Ordering::SeqCst), 0);
    assert!(response.access_token().is_empty());
}

#[tokio::test]
async fn test_missing_access_token_is_a_server_error() {
    let handler = ScriptedHandler::accepting(grant_type::PASSWORD, None);
    let endpoint = TokenEndpoint::new().handler(handler);
    let mut request = request_for(grant_type::PASSWORD);
    let err = endpoint.new_access_response(&RequestContext::new(), &mut request).await.unwrap_err();
    assert!(err.is(ErrorKind::ServerError));
    assert_eq!(err.status_code(), 500);
}

#[tokio::test]
async fn test_cancelled_context_stops_dispatch() {
    let handler = ScriptedHandler::accepting(grant_type::PASSWORD, Some("t"));
    let endpoint = TokenEndpoint::new().handler(handler.clone());
    let ctx = RequestContext::new();
    ctx.cancel();
    let mut request = request_for(grant_type::PASSWORD);
    let err = endpoint.new_access_response(&ctx, &mut request).await.unwrap_err();
    assert!(err.is(ErrorKind::ServerError));
    assert_eq!(handler.handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_context_persists_nothing() {
    let (provider, store) = compose_memory(GrantConfig::default(), &[42u8; 32]).unwrap();
    store.add_user("peter", "pan");
    let client = Arc::new(
        Client::new("cli")
            .grant_types([grant_type::PASSWORD])
            .scopes([OFFLINE_SCOPE]),
    );
    let mut request = AccessRequest::new(
        [grant_type::PASSWORD],
        Request::new(client)
            .with_requested_scopes([OFFLINE_SCOPE])
            .with_form_value("username", "peter")
            .with_form_value("password", "pan"),
    );
    request.grant_scope(OFFLINE_SCOPE);

    let ctx = RequestContext::new();
    provider.token_endpoint.handle_token_endpoint_request(&ctx, &mut request).await.unwrap();
    ctx.cancel();
    let mut response = AccessResponse::new();
    let err = provider
        .token_endpoint
        .populate_token_endpoint_response(&ctx, &mut request, &mut response)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::ServerError));
    assert!(response.access_token().is_empty());
    assert_eq!(store.access_token_count().await, 0);
    assert_eq!(store.refresh_token_count().await, 0);
}
