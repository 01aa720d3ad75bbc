//! Bearer token capability handed to the Graph client.
//!
//! The client never sees OAuth credentials; it only asks an
//! [`AccessTokenSource`] for a token before each request.

use std::future::Future;
use std::pin::Pin;

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxing keeps [`AccessTokenSource`] object-safe so sessions can hold an
/// `Arc<dyn AccessTokenSource>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can produce a valid bearer token.
pub trait AccessTokenSource: Send + Sync {
    /// Returns a token valid for at least the next request, refreshing it if
    /// needed.
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>>;
}

/// A fixed token, for tests and one-off tooling.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl AccessTokenSource for StaticToken {
    fn access_token(&self) -> BoxFuture<'_, ProviderResult<String>> {
        Box::pin(async move { Ok(self.0.clone()) })
    }
}
