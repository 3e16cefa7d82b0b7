//! Caller-supplied request context carrying cancellation and deadline.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use super::error::{OAuthError, OAuthResult};

/// Cancellation scope of a single endpoint invocation.
///
/// Every storage and strategy call made on behalf of a request runs through
/// [`RequestContext::run`], so cancelling the token or passing the deadline
/// aborts the call and surfaces a server error.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    cancellation: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context tied to an existing cancellation token, e.g. one owned by the connection.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        RequestContext { cancellation: token, deadline: None }
    }

    /// Sets a deadline `timeout` from now.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Sets an absolute deadline.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Fails if the context was cancelled or its deadline has passed.
    pub fn check(&self) -> OAuthResult<()> {
        if self.cancellation.is_cancelled() {
            return Err(OAuthError::server_error("The request context was cancelled"));
        }
        if self.deadline.is_some_and(|d| d <= Instant::now()) {
            return Err(OAuthError::server_error("The request context deadline was exceeded"));
        }
        Ok(())
    }

    /// Drives `fut` unless the context is cancelled or times out first.
    pub async fn run<F, T>(&self, fut: F) -> OAuthResult<T>
    where
        F: Future<Output = OAuthResult<T>>,
    {
        self.check()?;
        let deadline = self.deadline;
        let expired = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => {
                Err(OAuthError::server_error("The request context was cancelled"))
            }
            _ = expired => {
                Err(OAuthError::server_error("The request context deadline was exceeded"))
            }
            res = fut => res,
        }
    }
}
