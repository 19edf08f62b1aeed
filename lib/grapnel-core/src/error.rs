//! Error types for grapnel.
//!
//! [`Error`] is the single error type returned by every fallible operation.
//! Non-success HTTP responses are reported as [`Error::Api`], which carries an
//! [`ApiError`] with the full failure context (verb, URI, status, headers and
//! the best-effort captured body).

use std::fmt;

use derive_more::{Display, Error, From};
use http::HeaderMap;
use tracing::warn;

use crate::{CancelSignal, Method, Response};

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for grapnel operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The server answered with a non-success status code.
    #[display("{_0}")]
    #[from]
    Api(#[error(not(source))] Box<ApiError>),

    /// An argument cannot be used the way its parameter role requires.
    #[display("invalid argument: {_0}")]
    #[from(skip)]
    InvalidArgument(#[error(not(source))] String),

    /// A precondition of the call is not met (e.g. no base address).
    #[display("invalid operation: {_0}")]
    #[from(skip)]
    InvalidOperation(#[error(not(source))] String),

    /// A method descriptor violates one of its invariants.
    #[display("invalid method descriptor: {_0}")]
    #[from(skip)]
    InvalidDescriptor(#[error(not(source))] String),

    /// No method with that name carries HTTP metadata.
    #[display("method `{_0}` must be defined and have an HTTP method")]
    #[from(skip)]
    UnknownMethod(#[error(not(source))] String),

    /// The method name is overloaded and no argument types were supplied.
    #[display("method `{_0}` exists more than once, argument types must be supplied")]
    #[from(skip)]
    AmbiguousMethod(#[error(not(source))] String),

    /// No overload accepts that many arguments.
    #[display("method `{method}` has no overload taking {arity} argument(s)")]
    #[from(skip)]
    ArityMismatch {
        /// Requested method name.
        method: String,
        /// Number of supplied arguments.
        arity: usize,
    },

    /// Several overloads share the arity but none matches the argument types exactly.
    #[display("method `{method}` has no overload matching ({types})")]
    #[from(skip)]
    NoMatchingOverload {
        /// Requested method name.
        method: String,
        /// Rendered argument types.
        types: String,
    },

    /// The call was cancelled.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// Invalid request configuration (header names, values, URIs).
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// I/O error while reading a file or a body stream.
    #[display("I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_urlencoded::ser::Error),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        Self::Api(Box::new(error))
    }
}

impl Error {
    /// Create an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an invalid operation error.
    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation(message.into())
    }

    /// Create an invalid descriptor error.
    #[must_use]
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor(message.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` if the call was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The structured API error, if the server answered with a failure status.
    #[must_use]
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(error) => Some(error),
            _ => None,
        }
    }

    /// Returns the HTTP status code if this is an API error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.api().map(ApiError::status)
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Returns `true` if this is a 404 Not Found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

// ============================================================================
// API Error
// ============================================================================

/// Failure context of a call that received a non-success status.
///
/// The response body is captured once, on a best-effort basis: if reading it
/// fails (or the call is cancelled while reading), the error is still produced
/// with its verb, URI, status and headers, and [`ApiError::content`] is `None`.
#[derive(Debug, Clone)]
pub struct ApiError {
    method: Method,
    uri: String,
    status: u16,
    reason: Option<String>,
    headers: HeaderMap,
    content_headers: Option<HeaderMap>,
    content: Option<String>,
}

impl ApiError {
    /// Create an error record without captured content.
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>, status: u16, headers: HeaderMap) -> Self {
        Self {
            method,
            uri: uri.into(),
            status,
            reason: http::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .map(str::to_owned),
            headers,
            content_headers: None,
            content: None,
        }
    }

    /// Attach captured body text.
    #[must_use]
    pub fn with_content(mut self, content_headers: HeaderMap, content: impl Into<String>) -> Self {
        self.content_headers = Some(content_headers);
        self.content = Some(content.into());
        self
    }

    /// Build the error from a failed response, consuming it.
    ///
    /// Reading the body is raced against `cancel`; any failure during the
    /// capture is logged and swallowed.
    pub async fn capture(
        method: Method,
        uri: impl Into<String>,
        response: Response,
        cancel: &CancelSignal,
    ) -> Self {
        let (status, reason, headers, content) = response.into_parts();
        let mut error = Self::new(method, uri, status, headers);
        if let Some(reason) = reason {
            error.reason = Some(reason);
        }

        let Some(content) = content else {
            return error;
        };
        error.content_headers = Some(content.headers().clone());

        match cancel.run(content.read_to_bytes()).await {
            Ok(bytes) => error.content = Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(err) => warn!(
                status,
                uri = %error.uri,
                error = %err,
                "could not capture error response body"
            ),
        }

        error
    }

    /// HTTP method of the failed request.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// URI of the failed request.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
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

    /// Response (transport) headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response content headers, when the response had content.
    #[must_use]
    pub fn content_headers(&self) -> Option<&HeaderMap> {
        self.content_headers.as_ref()
    }

    /// Captured body text, when the capture succeeded.
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    /// Returns `true` if non-blank body text was captured.
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Try to decode the captured body as JSON.
    ///
    /// Returns `None` when there is no captured content.
    ///
    /// # Example
    ///
    /// ```ignore
    /// #[derive(Debug, Deserialize)]
    /// struct Problem {
    ///     code: String,
    /// }
    ///
    /// if let Some(api) = err.api()
    ///     && let Some(Ok(problem)) = api.content_as::<Problem>()
    /// {
    ///     println!("server said: {}", problem.code);
    /// }
    /// ```
    pub fn content_as<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        if !self.has_content() {
            return None;
        }
        self.content
            .as_deref()
            .map(|content| crate::from_json(content.as_bytes()))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response status code does not indicate success: {} ({}).",
            self.status,
            self.reason.as_deref().unwrap_or("")
        )
    }
}

impl std::error::Error for ApiError {}
