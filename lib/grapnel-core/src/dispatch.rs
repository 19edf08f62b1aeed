//! Decoding responses into the declared return shape.

use std::fmt;
use std::sync::Arc;

use futures_util::TryStreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    ApiError, ByteStream, CancelSignal, Content, Error, JsonSerializer, Method, Response, Result,
    ReturnShape, Serializer,
};

/// The decoded result of a call.
pub enum Outcome {
    /// No value.
    Unit,
    /// The raw response, owned by the caller.
    Response(Response),
    /// The response content, owned by the caller.
    Content(Content),
    /// The response body as a byte stream.
    Stream(ByteStream),
    /// The response body as text.
    Text(String),
    /// The deserialized body.
    Value(Value),
}

impl Outcome {
    fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Response(_) => "response",
            Self::Content(_) => "content",
            Self::Stream(_) => "stream",
            Self::Text(_) => "text",
            Self::Value(_) => "value",
        }
    }

    fn mismatch(&self, expected: &str) -> Error {
        Error::invalid_operation(format!(
            "expected a {expected} outcome, the call produced a {}",
            self.kind()
        ))
    }

    /// The raw response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for any other outcome.
    pub fn into_response(self) -> Result<Response> {
        match self {
            Self::Response(response) => Ok(response),
            other => Err(other.mismatch("response")),
        }
    }

    /// The response content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for any other outcome.
    pub fn into_content(self) -> Result<Content> {
        match self {
            Self::Content(content) => Ok(content),
            other => Err(other.mismatch("content")),
        }
    }

    /// The body stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for any other outcome.
    pub fn into_stream(self) -> Result<ByteStream> {
        match self {
            Self::Stream(stream) => Ok(stream),
            other => Err(other.mismatch("stream")),
        }
    }

    /// The body text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for any other outcome.
    pub fn into_text(self) -> Result<String> {
        match self {
            Self::Text(text) => Ok(text),
            other => Err(other.mismatch("text")),
        }
    }

    /// The deserialized body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for any other outcome.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Self::Value(value) => Ok(value),
            other => Err(other.mismatch("value")),
        }
    }

    /// The deserialized body, converted into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOperation`] for non-value outcomes and
    /// [`Error::JsonDeserialization`] if the value does not fit `T`.
    pub fn into_json<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        crate::from_value(self.into_value()?)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("Unit"),
            Self::Response(response) => f.debug_tuple("Response").field(response).finish(),
            Self::Content(content) => f.debug_tuple("Content").field(content).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Turns responses into [`Outcome`]s or [`ApiError`]s.
#[derive(Debug, Clone)]
pub struct ResponseDispatcher {
    serializer: Arc<dyn Serializer>,
}

impl Default for ResponseDispatcher {
    fn default() -> Self {
        Self::new(Arc::new(JsonSerializer))
    }
}

impl ResponseDispatcher {
    /// Create a dispatcher deserializing values with `serializer`.
    #[must_use]
    pub fn new(serializer: Arc<dyn Serializer>) -> Self {
        Self { serializer }
    }

    /// Decode `response` into `shape`.
    ///
    /// The status is checked first whatever the shape: a non-success status
    /// becomes [`Error::Api`], with the body captured on a best-effort basis.
    /// Reading bodies is bounded by `cancel`.
    ///
    /// A `Value` shape with an empty body decodes to `null`.
    ///
    /// # Errors
    ///
    /// - [`Error::Api`] for a non-success status,
    /// - [`Error::Cancelled`] if `cancel` fires while reading,
    /// - read or deserialization errors.
    pub async fn decode(
        &self,
        shape: &ReturnShape,
        method: Method,
        uri: &str,
        response: Response,
        cancel: &CancelSignal,
    ) -> Result<Outcome> {
        if !response.is_success() {
            let error = ApiError::capture(method, uri, response, cancel).await;
            warn!(
                %method,
                uri,
                status = error.status(),
                "request failed"
            );
            return Err(error.into());
        }

        let outcome = match shape {
            ReturnShape::Unit => {
                let mut body = response.into_content().into_stream();
                let drained = cancel
                    .run(async move {
                        while body.try_next().await?.is_some() {}
                        Ok::<_, Error>(())
                    })
                    .await;
                match drained {
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(err) => debug!(%method, uri, error = %err, "discarded unreadable body"),
                    Ok(()) => {}
                }
                Outcome::Unit
            }
            ReturnShape::Response => Outcome::Response(response),
            ReturnShape::Content => Outcome::Content(response.into_content()),
            ReturnShape::Stream => Outcome::Stream(response.into_content().into_stream()),
            ReturnShape::Text => {
                Outcome::Text(cancel.run(response.into_content().read_to_string()).await?)
            }
            ReturnShape::Value { type_name } => {
                let bytes = cancel.run(response.into_content().read_to_bytes()).await?;
                let value = if bytes.iter().all(u8::is_ascii_whitespace) {
                    Value::Null
                } else {
                    self.serializer.deserialize(&bytes)?
                };
                debug!(%method, uri, type_name, "decoded response value");
                Outcome::Value(value)
            }
        };
        Ok(outcome)
    }
}
