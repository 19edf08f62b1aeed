//! HTTP responses.
//!
//! [`Response`] carries status, reason phrase, transport headers and the
//! content as received from the transport. Bodies are streamed: dropping the
//! response releases the connection.
//!
//! # Example
//!
//! ```ignore
//! let user: User = response.json().await?;
//! ```

use http::HeaderMap;

use crate::{Content, Result};

/// HTTP response with status, headers, and optional content.
#[derive(Debug)]
pub struct Response {
    status: u16,
    reason: Option<String>,
    headers: HeaderMap,
    content: Option<Content>,
}

impl Response {
    /// Creates a new response; the reason phrase defaults to the canonical one.
    #[must_use]
    pub fn new(status: u16, headers: HeaderMap, content: Option<Content>) -> Self {
        let reason = http::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .map(str::to_owned);
        Self {
            status,
            reason,
            headers,
            content,
        }
    }

    /// Override the reason phrase.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Reason phrase, if known.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Transport headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Single header value by name, looking at transport then content headers.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.content.as_ref().and_then(|c| c.headers().get(name)))
            .and_then(|value| value.to_str().ok())
    }

    /// Response content.
    #[must_use]
    pub const fn content(&self) -> Option<&Content> {
        self.content.as_ref()
    }

    /// Consume into content; an absent body yields empty content.
    #[must_use]
    pub fn into_content(self) -> Content {
        self.content.unwrap_or_default()
    }

    /// Consume into (status, reason, headers, content).
    #[must_use]
    pub fn into_parts(self) -> (u16, Option<String>, HeaderMap, Option<Content>) {
        (self.status, self.reason, self.headers, self.content)
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Status is 4xx.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    /// Status is 5xx.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500 && self.status < 600
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let bytes = self.into_content().read_to_bytes().await?;
        crate::from_json(&bytes)
    }

    /// Read the body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the body is not valid UTF-8.
    pub async fn text(self) -> Result<String> {
        self.into_content().read_to_string().await
    }
}
