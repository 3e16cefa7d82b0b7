//! OAuth2 grant handling for Starberry: the token endpoint dispatcher, the
//! grant handlers and the strategies and storage they are built on.

pub mod oauth_core;
pub mod handler;
pub mod compose;

pub use oauth_core::config::GrantConfig;
pub use oauth_core::context::RequestContext;
pub use oauth_core::error::{ErrorKind, OAuthError, OAuthResult};
pub use oauth_core::grant_helpers::HandleHelper;
pub use oauth_core::memory::MemoryStore;
pub use oauth_core::crypto::HmacShaStrategy;
pub use oauth_core::strategy::{
    AudienceMatchingStrategy, DefaultAudienceMatchingStrategy, ExactAudienceMatchingStrategy, ExactScopeStrategy,
    HierarchicScopeStrategy, ScopeStrategy, WildcardScopeStrategy,
};
pub use oauth_core::oauth_provider::{
    AccessTokenStorage, AccessTokenStrategy, AuthorizeCodeStorage, AuthorizeCodeStrategy, CredentialStore,
    RefreshTokenStorage, RefreshTokenStrategy,
};
pub use oauth_core::types::{
    AccessRequest, AccessResponse, Arguments, AuthorizeRequest, AuthorizeResponse, Client, Request, Session,
    StoredRequest, TokenKind,
};
pub use handler::{
    AuthorizeEndpoint, AuthorizeEndpointHandler, AuthorizeExplicitGrantHandler, AuthorizeImplicitGrantHandler,
    ClientCredentialsGrantHandler, RefreshTokenGrantHandler, ResourceOwnerPasswordCredentialsGrantHandler,
    TokenEndpoint, TokenEndpointHandler,
};
pub use compose::{compose_all, compose_memory, GrantProvider};
