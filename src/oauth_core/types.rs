//! OAuth2 grant primitives: clients, sessions, requests and responses.

use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Grant type identifiers understood by the core handlers.
pub mod grant_type {
    pub const AUTHORIZATION_CODE: &str = "authorization_code";
    pub const CLIENT_CREDENTIALS: &str = "client_credentials";
    pub const IMPLICIT: &str = "implicit";
    pub const PASSWORD: &str = "password";
    pub const REFRESH_TOKEN: &str = "refresh_token";
}

/// Response type identifiers understood by the authorize endpoint handlers.
pub mod response_type {
    pub const CODE: &str = "code";
    pub const TOKEN: &str = "token";
}

/// Scope that signals a refresh token should be issued.
pub const OFFLINE_SCOPE: &str = "offline";

/// Token type reported for every access token.
pub const BEARER: &str = "bearer";

/// Current UTC time truncated to whole seconds.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Ordered set of strings (grant types, scopes, audiences).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Vec<String>);

impl Arguments {
    /// Creates an empty set.
    pub fn new() -> Self {
        Arguments(Vec::new())
    }

    /// Returns true if `item` is a member.
    pub fn has(&self, item: &str) -> bool {
        self.0.iter().any(|a| a == item)
    }

    /// Returns true if the set holds `item` and nothing else.
    pub fn exact(&self, item: &str) -> bool {
        self.0.len() == 1 && self.0[0] == item
    }

    /// Appends `item` unless it is already present.
    pub fn append(&mut self, item: impl Into<String>) {
        let item = item.into();
        if !self.has(&item) {
            self.0.push(item);
        }
    }

    /// Joins the members with `sep`.
    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }
}

impl Deref for Arguments {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Arguments {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut args = Arguments::new();
        for item in iter {
            args.append(item);
        }
        args
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Arguments {
    fn from(items: [S; N]) -> Self {
        items.into_iter().collect()
    }
}

impl From<Vec<String>> for Arguments {
    fn from(items: Vec<String>) -> Self {
        items.into_iter().collect()
    }
}

/// Kinds of tokens whose expiry a session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    AccessToken,
    RefreshToken,
    AuthorizeCode,
}

/// Represents an OAuth 2.0 client application, as registered with the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier.
    pub id: String,
    /// Allowed redirect URIs.
    pub redirect_uris: Vec<String>,
    /// Grant types the client may use.
    pub grant_types: Arguments,
    /// Response types the client may request at the authorize endpoint.
    pub response_types: Arguments,
    /// Scopes the client may request.
    pub scopes: Arguments,
    /// Audiences the client may request.
    pub audience: Arguments,
    /// Public clients cannot keep a secret.
    pub public: bool,
}

impl Client {
    /// Creates a confidential client with no permissions.
    pub fn new(id: impl Into<String>) -> Self {
        Client { id: id.into(), ..Default::default() }
    }

    /// Sets the allowed grant types.
    pub fn grant_types<S: Into<String>>(mut self, grant_types: impl IntoIterator<Item = S>) -> Self {
        self.grant_types = grant_types.into_iter().collect();
        self
    }

    /// Sets the allowed response types.
    pub fn response_types<S: Into<String>>(mut self, response_types: impl IntoIterator<Item = S>) -> Self {
        self.response_types = response_types.into_iter().collect();
        self
    }

    /// Sets the allowed scopes.
    pub fn scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.scopes = scopes.into_iter().collect();
        self
    }

    /// Sets the allowed audiences.
    pub fn audience<S: Into<String>>(mut self, audience: impl IntoIterator<Item = S>) -> Self {
        self.audience = audience.into_iter().collect();
        self
    }

    /// Sets the allowed redirect URIs.
    pub fn redirect_uris<S: Into<String>>(mut self, uris: impl IntoIterator<Item = S>) -> Self {
        self.redirect_uris = uris.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the client as public.
    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }
}

/// Per-request state persisted next to every token signature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Subject the tokens are issued for.
    pub subject: Option<String>,
    /// Resource owner username, set by the password grant.
    pub username: Option<String>,
    expires_at: HashMap<TokenKind, DateTime<Utc>>,
    /// Additional claims carried with the session.
    pub extra: Map<String, Value>,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn set_expires_at(&mut self, kind: TokenKind, at: DateTime<Utc>) {
        self.expires_at.insert(kind, at);
    }

    pub fn expires_at(&self, kind: TokenKind) -> Option<DateTime<Utc>> {
        self.expires_at.get(&kind).copied()
    }

    /// True when an expiry is recorded for `kind` and lies before `now`.
    pub fn is_expired(&self, kind: TokenKind, now: DateTime<Utc>) -> bool {
        self.expires_at(kind).is_some_and(|at| at < now)
    }
}

/// Sanitized, value-type snapshot of a request as it is persisted by storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRequest {
    pub id: String,
    pub requested_at: DateTime<Utc>,
    pub client_id: String,
    pub requested_scopes: Arguments,
    pub granted_scopes: Arguments,
    pub requested_audience: Arguments,
    pub granted_audience: Arguments,
    /// Only the allow-listed form parameters.
    pub form: HashMap<String, String>,
    pub redirect_uri: Option<String>,
    pub session: Session,
}

/// Fields shared by token and authorize endpoint requests.
#[derive(Debug, Clone)]
pub struct Request {
    id: String,
    requested_at: DateTime<Utc>,
    client: Arc<Client>,
    requested_scopes: Arguments,
    granted_scopes: Arguments,
    requested_audience: Arguments,
    granted_audience: Arguments,
    form: HashMap<String, String>,
    session: Session,
}

impl Request {
    /// Creates a request on behalf of an already resolved client.
    pub fn new(client: Arc<Client>) -> Self {
        Request {
            id: Uuid::new_v4().to_string(),
            requested_at: now_utc(),
            client,
            requested_scopes: Arguments::new(),
            granted_scopes: Arguments::new(),
            requested_audience: Arguments::new(),
            granted_audience: Arguments::new(),
            form: HashMap::new(),
            session: Session::new(),
        }
    }

    /// Sets the requested scopes.
    pub fn with_requested_scopes<S: Into<String>>(mut self, scopes: impl IntoIterator<Item = S>) -> Self {
        self.requested_scopes = scopes.into_iter().collect();
        self
    }

    /// Sets the requested audiences. They cannot be changed afterwards.
    pub fn with_requested_audience<S: Into<String>>(mut self, audience: impl IntoIterator<Item = S>) -> Self {
        self.requested_audience = audience.into_iter().collect();
        self
    }

    /// Adds a form parameter.
    pub fn with_form_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }

    /// Replaces the session.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn requested_scopes(&self) -> &Arguments {
        &self.requested_scopes
    }

    pub fn granted_scopes(&self) -> &Arguments {
        &self.granted_scopes
    }

    pub fn requested_audience(&self) -> &Arguments {
        &self.requested_audience
    }

    pub fn granted_audience(&self) -> &Arguments {
        &self.granted_audience
    }

    /// Grants a requested scope. Scopes that were never requested are ignored.
    pub fn grant_scope(&mut self, scope: &str) -> bool {
        if !self.requested_scopes.has(scope) {
            return false;
        }
        self.granted_scopes.append(scope);
        true
    }

    /// Grants a requested audience. Audiences that were never requested are ignored.
    pub fn grant_audience(&mut self, audience: &str) -> bool {
        if !self.requested_audience.has(audience) {
            return false;
        }
        self.granted_audience.append(audience);
        true
    }

    pub fn form_value(&self, key: &str) -> Option<&str> {
        self.form.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Projects the request into the record persisted by storage, keeping only
    /// the form parameters named in `allowed_params`.
    pub fn sanitize(&self, allowed_params: &[&str]) -> StoredRequest {
        let form = self
            .form
            .iter()
            .filter(|(k, _)| allowed_params.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        StoredRequest {
            id: self.id.clone(),
            requested_at: self.requested_at,
            client_id: self.client.id.clone(),
            requested_scopes: self.requested_scopes.clone(),
            granted_scopes: self.granted_scopes.clone(),
            requested_audience: self.requested_audience.clone(),
            granted_audience: self.granted_audience.clone(),
            form,
            redirect_uri: None,
            session: self.session.clone(),
        }
    }

    /// Continues a grant recorded earlier: takes over its id, scopes, granted
    /// audiences and session. The requested audience of this request is kept.
    pub(crate) fn adopt(&mut self, stored: &StoredRequest) {
        self.id = stored.id.clone();
        self.requested_scopes = stored.requested_scopes.clone();
        self.granted_scopes = stored.granted_scopes.clone();
        self.granted_audience = stored.granted_audience.clone();
        self.session = stored.session.clone();
    }
}

/// A parsed token endpoint request.
#[derive(Debug, Clone)]
pub struct AccessRequest {
    request: Request,
    grant_types: Arguments,
    authorized: bool,
}

impl AccessRequest {
    pub fn new<S: Into<String>>(grant_types: impl IntoIterator<Item = S>, request: Request) -> Self {
        AccessRequest {
            request,
            grant_types: grant_types.into_iter().collect(),
            authorized: false,
        }
    }

    pub fn grant_types(&self) -> &Arguments {
        &self.grant_types
    }

    /// True once every handler has been offered the request and none rejected it.
    pub fn is_authorized(&self) -> bool {
        self.authorized
    }

    pub(crate) fn mark_authorized(&mut self) {
        self.authorized = true;
    }
}

impl Deref for AccessRequest {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.request
    }
}

impl DerefMut for AccessRequest {
    fn deref_mut(&mut self) -> &mut Request {
        &mut self.request
    }
}

/// A parsed authorize endpoint request.
#[derive(Debug, Clone)]
pub struct AuthorizeRequest {
    request: Request,
    response_types: Arguments,
    redirect_uri: Option<String>,
    state: Option<String>,
}

impl AuthorizeRequest {
    pub fn new<S: Into<String>>(response_types: impl IntoIterator<Item = S>, request: Request) -> Self {
        AuthorizeRequest {
            request,
            response_types: response_types.into_iter().collect(),
            redirect_uri: None,
            state: None,
        }
    }

    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn response_types(&self) -> &Arguments {
        &self.response_types
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Like [`Request::sanitize`], additionally recording the redirect URI so
    /// the token endpoint can compare it later.
    pub fn sanitize(&self, allowed_params: &[&str]) -> StoredRequest {
        let mut stored = self.request.sanitize(allowed_params);
        stored.redirect_uri = self.redirect_uri.clone();
        stored
    }
}

impl Deref for AuthorizeRequest {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.request
    }
}

impl DerefMut for AuthorizeRequest {
    fn deref_mut(&mut self) -> &mut Request {
        &mut self.request
    }
}

/// Token endpoint output, built up by the handlers that accept a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccessResponse {
    access_token: String,
    token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    scope: String,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl AccessResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn set_token_type(&mut self, token_type: impl Into<String>) {
        self.token_type = token_type.into();
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    /// Lifetime of the access token in seconds.
    pub fn set_expires_in(&mut self, seconds: u64) {
        self.expires_in = Some(seconds);
    }

    pub fn expires_in(&self) -> Option<u64> {
        self.expires_in
    }

    pub fn set_scopes(&mut self, scopes: &Arguments) {
        self.scope = scopes.join(" ");
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extra.insert(key.into(), value.into());
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// The response as the JSON document of RFC 6749 section 5.1.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Authorize endpoint output: parameters for the redirect query or fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuthorizeResponse {
    query: BTreeMap<String, String>,
    fragment: BTreeMap<String, String>,
}

impl AuthorizeResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.insert(key.into(), value.into());
    }

    pub fn add_fragment(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fragment.insert(key.into(), value.into());
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn fragment(&self) -> &BTreeMap<String, String> {
        &self.fragment
    }

    pub fn is_empty(&self) -> bool {
        self.query.is_empty() && self.fragment.is_empty()
    }
}
