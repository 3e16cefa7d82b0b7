//! Scope and audience matching strategies.

use url::Url;

/// Decides whether a requested scope is covered by a set of granted scopes.
pub trait ScopeStrategy: Send + Sync + 'static {
    fn matches(&self, granted: &[String], requested: &str) -> bool;
}

/// `a.b` covers `a.b` and `a.b.c`, but not `a.bc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchicScopeStrategy;

impl ScopeStrategy for HierarchicScopeStrategy {
    fn matches(&self, granted: &[String], requested: &str) -> bool {
        granted.iter().any(|g| {
            requested == g
                || (requested.starts_with(g.as_str()) && requested.as_bytes().get(g.len()) == Some(&b'.'))
        })
    }
}

/// Plain string equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactScopeStrategy;

impl ScopeStrategy for ExactScopeStrategy {
    fn matches(&self, granted: &[String], requested: &str) -> bool {
        granted.iter().any(|g| g == requested)
    }
}

/// `*` in a granted scope stands for exactly one dot-separated segment,
/// so `read.*` covers `read.users` but not `read.users.email`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WildcardScopeStrategy;

impl ScopeStrategy for WildcardScopeStrategy {
    fn matches(&self, granted: &[String], requested: &str) -> bool {
        granted.iter().any(|g| {
            if !g.contains('*') {
                return g == requested;
            }
            let pattern: Vec<&str> = g.split('.').collect();
            let segments: Vec<&str> = requested.split('.').collect();
            pattern.len() == segments.len()
                && pattern.iter().zip(&segments).all(|(p, s)| *p == "*" || p == s)
        })
    }
}

/// Decides whether requested audiences are permitted by a client's audiences.
pub trait AudienceMatchingStrategy: Send + Sync + 'static {
    fn matches(&self, client_audience: &[String], requested: &[String]) -> bool;
}

/// Every requested audience must equal a registered one or, for URLs, live
/// under it: same scheme, host and port, and a path below the registered path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAudienceMatchingStrategy;

impl AudienceMatchingStrategy for DefaultAudienceMatchingStrategy {
    fn matches(&self, client_audience: &[String], requested: &[String]) -> bool {
        requested
            .iter()
            .all(|req| client_audience.iter().any(|reg| audience_contains(reg, req)))
    }
}

/// Every requested audience must be registered verbatim.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactAudienceMatchingStrategy;

impl AudienceMatchingStrategy for ExactAudienceMatchingStrategy {
    fn matches(&self, client_audience: &[String], requested: &[String]) -> bool {
        requested.iter().all(|req| client_audience.contains(req))
    }
}

fn audience_contains(registered: &str, requested: &str) -> bool {
    if registered == requested {
        return true;
    }
    match (Url::parse(registered), Url::parse(requested)) {
        (Ok(reg), Ok(req)) => {
            reg.scheme() == req.scheme()
                && reg.host_str().is_some()
                && reg.host_str() == req.host_str()
                && reg.port_or_known_default() == req.port_or_known_default()
                && path_contains(reg.path(), req.path())
        }
        _ => false,
    }
}

fn path_contains(registered: &str, requested: &str) -> bool {
    let base = registered.trim_end_matches('/');
    let path = requested.trim_end_matches('/');
    path == base || (path.starts_with(base) && path[base.len()..].starts_with('/'))
}
