//! Error taxonomy shared by the strategies, storage and grant handlers.

use std::error::Error as StdError;
use serde_json::{json, Value};

/// Boxed cause wrapped by server errors.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Result alias used throughout the crate.
pub type OAuthResult<T> = Result<T, OAuthError>;

/// Discriminant of an [`OAuthError`], compared instead of formatted messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownRequest,
    UnsupportedGrantType,
    UnsupportedResponseType,
    InvalidRequest,
    InvalidScope,
    InvalidGrant,
    RequestUnauthorized,
    NotFound,
    ServerError,
}

/// Core OAuth2 error kinds.
///
/// The `Display` text of a variant never depends on its hint, so two errors of
/// the same kind always format the same way. Hints carry the detail.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// The handler is not responsible for the request. Only fatal when no
    /// handler at all claims it.
    #[error("The handler is not responsible for this request")]
    UnknownRequest,

    /// No handler claimed the token endpoint request.
    #[error("The authorization grant type is not supported by the authorization server")]
    UnsupportedGrantType,

    /// No handler claimed the authorize endpoint request.
    #[error("The authorization server does not support obtaining a token using this method")]
    UnsupportedResponseType,

    /// Missing or malformed parameters, audience not allowed, or grant type not allowed for the client.
    #[error("The request is missing a required parameter, includes an invalid parameter value, includes a parameter more than once, or is otherwise malformed")]
    InvalidRequest { hint: String },

    /// Requested scope exceeds what the client may request.
    #[error("The requested scope is invalid, unknown, or malformed")]
    InvalidScope { hint: String },

    /// The authorization code or refresh token is invalid, expired, revoked or bound to another client.
    #[error("The provided authorization grant (e.g., authorization code, resource owner credentials) or refresh token is invalid, expired, revoked, does not match the redirection URI used in the authorization request, or was issued to another client")]
    InvalidGrant { hint: String },

    /// Credentials were explicitly rejected.
    #[error("The request could not be authorized")]
    RequestUnauthorized { hint: String },

    /// A storage or credential lookup found nothing.
    #[error("Could not find the requested resource(s)")]
    NotFound,

    /// Storage, credential store or token generation failed, or the request context was cancelled.
    #[error("The authorization server encountered an unexpected condition that prevented it from fulfilling the request")]
    ServerError {
        hint: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl OAuthError {
    pub fn invalid_request(hint: impl Into<String>) -> Self {
        OAuthError::InvalidRequest { hint: hint.into() }
    }

    pub fn invalid_scope(hint: impl Into<String>) -> Self {
        OAuthError::InvalidScope { hint: hint.into() }
    }

    pub fn invalid_grant(hint: impl Into<String>) -> Self {
        OAuthError::InvalidGrant { hint: hint.into() }
    }

    pub fn request_unauthorized(hint: impl Into<String>) -> Self {
        OAuthError::RequestUnauthorized { hint: hint.into() }
    }

    pub fn server_error(hint: impl Into<String>) -> Self {
        OAuthError::ServerError { hint: hint.into(), source: None }
    }

    /// Server error wrapping an underlying cause.
    pub fn server_error_with(hint: impl Into<String>, source: impl Into<BoxError>) -> Self {
        OAuthError::ServerError { hint: hint.into(), source: Some(source.into()) }
    }

    /// Converts any error into a server error, keeping the original as the cause.
    /// Server errors are returned unchanged.
    pub fn into_server_error(self) -> Self {
        match self {
            err @ OAuthError::ServerError { .. } => err,
            other => {
                let hint = other.to_string();
                OAuthError::server_error_with(hint, other)
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            OAuthError::UnknownRequest => ErrorKind::UnknownRequest,
            OAuthError::UnsupportedGrantType => ErrorKind::UnsupportedGrantType,
            OAuthError::UnsupportedResponseType => ErrorKind::UnsupportedResponseType,
            OAuthError::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            OAuthError::InvalidScope { .. } => ErrorKind::InvalidScope,
            OAuthError::InvalidGrant { .. } => ErrorKind::InvalidGrant,
            OAuthError::RequestUnauthorized { .. } => ErrorKind::RequestUnauthorized,
            OAuthError::NotFound => ErrorKind::NotFound,
            OAuthError::ServerError { .. } => ErrorKind::ServerError,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind() == kind
    }

    pub fn hint(&self) -> Option<&str> {
        match self {
            OAuthError::InvalidRequest { hint }
            | OAuthError::InvalidScope { hint }
            | OAuthError::InvalidGrant { hint }
            | OAuthError::RequestUnauthorized { hint }
            | OAuthError::ServerError { hint, .. } => Some(hint.as_str()),
            _ => None,
        }
    }

    /// The RFC 6749 error code.
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::UnknownRequest | ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::UnsupportedGrantType => "unsupported_grant_type",
            ErrorKind::UnsupportedResponseType => "unsupported_response_type",
            ErrorKind::InvalidScope => "invalid_scope",
            ErrorKind::InvalidGrant => "invalid_grant",
            ErrorKind::RequestUnauthorized => "request_unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ServerError => "server_error",
        }
    }

    /// HTTP status a host should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::RequestUnauthorized => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::ServerError => 500,
            _ => 400,
        }
    }

    /// JSON error body with `error`, `error_description` and, when present, `error_hint`.
    pub fn to_json(&self) -> Value {
        let mut body = json!({
            "error": self.error_code(),
            "error_description": self.to_string(),
        });
        // Server error hints may describe internals.
        if let Some(hint) = self.hint().filter(|_| !self.is(ErrorKind::ServerError)) {
            body["error_hint"] = Value::String(hint.to_string());
        }
        body
    }
}
