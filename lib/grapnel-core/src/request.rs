//! HTTP requests.
//!
//! A [`Request`] starts with a relative target (`/users/42?expand=true`) and
//! becomes absolute once [`Request::resolve`] joins it to a base address.
//!
//! # Example
//!
//! ```
//! use grapnel_core::{Method, Request};
//!
//! let mut request = Request::builder(Method::Get, "/users?page=1")
//!     .header("Accept", "application/json")
//!     .build()
//!     .expect("valid request");
//!
//! request
//!     .resolve(&"https://api.example.com/v1".parse().expect("url"))
//!     .expect("resolved");
//! assert_eq!(
//!     request.uri(),
//!     "https://api.example.com/users?page=1"
//! );
//! ```

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Extensions;
use tracing::debug;
use url::Url;

use crate::{Content, Error, Method, Result, is_content_header};

/// An HTTP request with method, target, headers and optional content.
#[derive(Debug)]
pub struct Request {
    method: Method,
    target: String,
    url: Option<Url>,
    headers: HeaderMap,
    content: Option<Content>,
    extensions: Extensions,
}

impl Request {
    /// Creates a new [`RequestBuilder`] for a relative (or absolute) target.
    #[must_use]
    pub fn builder(method: Method, target: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, target.into())
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// The target as built, before resolution.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Absolute URL, once resolved.
    #[must_use]
    pub const fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// The absolute URL if resolved, else the relative target.
    #[must_use]
    pub fn uri(&self) -> String {
        self.url
            .as_ref()
            .map_or_else(|| self.target.clone(), ToString::to_string)
    }

    /// Join the target to `base`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the joined URL is invalid.
    pub fn resolve(&mut self, base: &Url) -> Result<()> {
        let url = base.join(&self.target)?;
        debug!(target = %self.target, %url, "resolved request URI");
        self.url = Some(url);
        Ok(())
    }

    /// Transport headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to transport headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Single header value by name, looking at transport then content headers.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.content.as_ref().and_then(|c| c.headers().get(name)))
            .and_then(|value| value.to_str().ok())
    }

    /// Request content.
    #[must_use]
    pub const fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    /// Take the content out of the request.
    pub fn take_content(&mut self) -> Option<Content> {
        self.content.take()
    }

    /// Request extensions.
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable access to extensions.
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    /// Set or remove a header by name.
    ///
    /// Any previous value is removed from both transport and content headers.
    /// `None` only removes. Content-class headers are written to the content,
    /// and dropped when there is no content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] for an invalid name or value.
    pub fn set_header(&mut self, name: &str, value: Option<&str>) -> Result<()> {
        let name = parse_name(name)?;
        self.headers.remove(&name);
        if let Some(content) = self.content.as_mut() {
            content.headers_mut().remove(&name);
        }

        let Some(value) = value else {
            return Ok(());
        };
        let value = parse_value(&name, value)?;

        if is_content_header(&name) {
            match self.content.as_mut() {
                Some(content) => {
                    content.headers_mut().insert(name, value);
                }
                None => debug!(header = %name, "content header dropped: request has no content"),
            }
        } else {
            self.headers.insert(name, value);
        }
        Ok(())
    }

    /// Consume into (method, url, headers, content, extensions).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] if the request was never resolved.
    pub fn into_parts(self) -> Result<(Method, Url, HeaderMap, Option<Content>, Extensions)> {
        let url = self.url.ok_or_else(|| {
            Error::invalid_operation(format!(
                "request target `{}` must be resolved against a base address",
                self.target
            ))
        })?;
        Ok((
            self.method,
            url,
            self.headers,
            self.content,
            self.extensions,
        ))
    }
}

fn parse_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::invalid_request(format!("invalid header name `{name}`: {e}")))
}

fn parse_value(name: &HeaderName, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| Error::invalid_request(format!("invalid value for header `{name}`: {e}")))
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug)]
pub struct RequestBuilder {
    request: Request,
    error: Option<Error>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, target: String) -> Self {
        let url = Url::parse(&target).ok();
        Self {
            request: Request {
                method,
                target,
                url,
                headers: HeaderMap::new(),
                content: None,
                extensions: Extensions::new(),
            },
            error: None,
        }
    }

    /// Sets a header, replacing any previous value.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_none()
            && let Err(err) = self.request.set_header(name, Some(value))
        {
            self.error = Some(err);
        }
        self
    }

    /// Sets the request content.
    #[must_use]
    pub fn content(mut self, content: Content) -> Self {
        self.request.content = Some(content);
        self
    }

    /// Inserts a request extension.
    #[must_use]
    pub fn extension<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.request.extensions.insert(value);
        self
    }

    /// Builds the [`Request`].
    ///
    /// # Errors
    ///
    /// Returns the first error recorded while setting headers.
    pub fn build(self) -> Result<Request> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.request),
        }
    }
}
