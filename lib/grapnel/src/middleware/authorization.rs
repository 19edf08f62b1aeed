//! Authorization header middleware.
//!
//! Interfaces declare the scheme with an `Authorization` header
//! (`.header("Authorization", "Bearer")`); this layer fetches the token
//! just before sending and writes `"{scheme} {token}"`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::header::AUTHORIZATION;
use tower::{Layer, Service};
use tracing::trace;

use crate::{Error, Request, Response, Result};

type TokenFuture = Pin<Box<dyn Future<Output = Result<String>> + Send>>;
type TokenGetter = Arc<dyn Fn() -> TokenFuture + Send + Sync>;

/// Layer that fills declared `Authorization` headers with a fetched token.
///
/// Requests without an `Authorization` header pass through untouched and the
/// getter is not called.
///
/// # Example
///
/// ```no_run
/// use grapnel::HyperClient;
/// use grapnel::middleware::AuthorizationLayer;
///
/// let client = HyperClient::builder()
///     .layer(AuthorizationLayer::new(|| async { Ok("t0k3n".to_string()) }))
///     .build();
/// ```
#[derive(Clone)]
pub struct AuthorizationLayer {
    getter: TokenGetter,
}

impl fmt::Debug for AuthorizationLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationLayer").finish_non_exhaustive()
    }
}

impl AuthorizationLayer {
    /// Create a layer calling `getter` once per authorized request.
    pub fn new<F, Fut>(getter: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        Self {
            getter: Arc::new(move || Box::pin(getter()) as TokenFuture),
        }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = Authorization<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Authorization {
            inner,
            getter: Arc::clone(&self.getter),
        }
    }
}

/// Service produced by [`AuthorizationLayer`].
#[derive(Clone)]
pub struct Authorization<S> {
    inner: S,
    getter: TokenGetter,
}

impl<S: fmt::Debug> fmt::Debug for Authorization<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S> Service<Request> for Authorization<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        // Take the service that was polled ready, leave the clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let getter = Arc::clone(&self.getter);

        Box::pin(async move {
            let scheme = request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.split_whitespace().next())
                .map(str::to_owned);

            if let Some(scheme) = scheme {
                let token = getter().await?;
                trace!(%scheme, "authorization token fetched");
                request.set_header(AUTHORIZATION.as_str(), Some(&format!("{scheme} {token}")))?;
            }

            inner.call(request).await
        })
    }
}
