//! The transport seam.
//!
//! The core never talks to the network: it hands resolved [`Request`]s to an
//! [`HttpClient`] and decodes the [`Response`]s it gets back. The `grapnel`
//! crate provides a hyper-based implementation; tests use recording fakes.

use std::future::Future;
use std::sync::Arc;

use crate::{Request, Response, Result};

/// Sends HTTP requests.
///
/// Requests passed to [`execute`](HttpClient::execute) are resolved: their
/// [`url`](Request::url) is absolute.
///
/// # Example
///
/// ```
/// use grapnel_core::{Content, HttpClient, Request, Response, Result};
/// use http::HeaderMap;
///
/// struct Echo;
///
/// impl HttpClient for Echo {
///     async fn execute(&self, request: Request) -> Result<Response> {
///         let content = Content::text(request.uri());
///         Ok(Response::new(200, HeaderMap::new(), Some(content)))
///     }
/// }
/// ```
pub trait HttpClient: Send + Sync {
    /// Send `request` and return the response once its head is received.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<T: HttpClient> HttpClient for Arc<T> {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        T::execute(self, request)
    }
}

impl<T: HttpClient> HttpClient for &T {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        T::execute(self, request)
    }
}
