//! Request and response content.
//!
//! A [`Content`] pairs content-class headers (`Content-Type`,
//! `Content-Disposition`, ...) with a [`Body`]. Bodies are pulled lazily by the
//! transport: files are read chunk by chunk and JSON values are serialized
//! chunk by chunk once the body stream is first polled.

use std::fmt;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::{StreamExt, TryStreamExt, future, stream};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use tokio::io::AsyncReadExt;

use crate::serializer::{self, Serializer};
use crate::{Multipart, Result};

/// Content-Type of text bodies and text multipart parts.
pub const TEXT_MEDIA_TYPE: &str = "text/plain; charset=utf-8";

/// Content-Type of URL-encoded form bodies.
pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

const FILE_CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Returns `true` for header names that describe the content rather than the
/// message.
///
/// ```
/// use grapnel_core::is_content_header;
/// use http::header;
///
/// assert!(is_content_header(&header::CONTENT_TYPE));
/// assert!(!is_content_header(&header::ACCEPT));
/// ```
#[must_use]
pub fn is_content_header(name: &HeaderName) -> bool {
    name.as_str().starts_with("content-")
        || *name == header::EXPIRES
        || *name == header::LAST_MODIFIED
        || *name == header::ALLOW
}

// ============================================================================
// Body
// ============================================================================

/// Payload of a [`Content`].
#[derive(Default)]
pub enum Body {
    /// No payload.
    #[default]
    Empty,
    /// In-memory bytes.
    Bytes(Bytes),
    /// Caller-supplied or transport-supplied byte stream.
    Stream(ByteStream),
    /// An opened file, read in chunks when the body is pulled.
    File(tokio::fs::File),
    /// A structured value serialized when the body is pulled.
    Json {
        /// Value to serialize.
        value: Value,
        /// Serializer writing the value.
        serializer: Arc<dyn Serializer>,
    },
    /// A multipart container.
    Multipart(Multipart),
}

impl Body {
    /// Turn the body into a stream of chunks.
    #[must_use]
    pub fn into_stream(self) -> ByteStream {
        match self {
            Self::Empty => Box::pin(stream::empty::<Result<Bytes>>()),
            Self::Bytes(bytes) => Box::pin(stream::once(future::ready(Ok::<_, crate::Error>(
                bytes,
            )))),
            Self::Stream(stream) => stream,
            Self::File(file) => file_stream(file),
            Self::Json { value, serializer } => Box::pin(
                stream::once(future::lazy(move |_| {
                    serializer::encode_stream(value, serializer)
                }))
                .flatten(),
            ),
            Self::Multipart(multipart) => multipart.into_stream(),
        }
    }

    /// Returns `true` for [`Body::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::File(_) => f.write_str("File(..)"),
            Self::Json { value, .. } => f.debug_tuple("Json").field(value).finish(),
            Self::Multipart(multipart) => f.debug_tuple("Multipart").field(multipart).finish(),
        }
    }
}

fn file_stream(file: tokio::fs::File) -> ByteStream {
    Box::pin(stream::try_unfold(file, |mut file| async move {
        let mut chunk = BytesMut::with_capacity(FILE_CHUNK_SIZE);
        let read = file.read_buf(&mut chunk).await?;
        Ok::<_, crate::Error>((read > 0).then(|| (chunk.freeze(), file)))
    }))
}

// ============================================================================
// Content
// ============================================================================

/// Content headers plus a body.
#[derive(Debug, Default)]
pub struct Content {
    headers: HeaderMap,
    body: Body,
}

impl Content {
    /// Wrap a body without any content header.
    #[must_use]
    pub fn new(body: Body) -> Self {
        Self {
            headers: HeaderMap::new(),
            body,
        }
    }

    /// Assemble content from already split headers and body.
    #[must_use]
    pub const fn from_parts(headers: HeaderMap, body: Body) -> Self {
        Self { headers, body }
    }

    /// Text content with `text/plain; charset=utf-8`.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(Body::Bytes(Bytes::from(text.into())))
            .with_content_type(HeaderValue::from_static(TEXT_MEDIA_TYPE))
    }

    /// Raw bytes without content type.
    #[must_use]
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::new(Body::Bytes(bytes.into()))
    }

    /// A byte stream without content type.
    #[must_use]
    pub fn stream(stream: ByteStream) -> Self {
        Self::new(Body::Stream(stream))
    }

    /// Open `path` for reading and stream it as the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be opened.
    pub fn file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(Body::File(tokio::fs::File::from_std(file))))
    }

    /// A structured value, serialized with `serializer` when the body is pulled.
    #[must_use]
    pub fn json(value: Value, serializer: Arc<dyn Serializer>) -> Self {
        let media_type = HeaderValue::from_str(serializer.media_type());
        let content = Self::new(Body::Json { value, serializer });
        match media_type {
            Ok(media_type) => content.with_content_type(media_type),
            Err(_) => content,
        }
    }

    /// URL-encoded form content from ordered key/value pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if form encoding fails.
    pub fn form_url_encoded<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let pairs = pairs.into_iter().collect::<Vec<_>>();
        let encoded = serde_urlencoded::to_string(pairs)?;
        Ok(Self::new(Body::Bytes(Bytes::from(encoded)))
            .with_content_type(HeaderValue::from_static(FORM_MEDIA_TYPE)))
    }

    /// A multipart container, announcing its boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the boundary is not a valid header value.
    pub fn multipart(multipart: Multipart) -> Result<Self> {
        let content_type = HeaderValue::from_str(&multipart.content_type())
            .map_err(|e| crate::Error::invalid_request(format!("invalid boundary: {e}")))?;
        Ok(Self::new(Body::Multipart(multipart)).with_content_type(content_type))
    }

    /// Set the `Content-Type` header.
    #[must_use]
    pub fn with_content_type(mut self, content_type: HeaderValue) -> Self {
        self.headers.insert(header::CONTENT_TYPE, content_type);
        self
    }

    /// Content headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable content headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The `Content-Type` header, if set and printable.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    /// The body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Split into headers and body.
    #[must_use]
    pub fn into_parts(self) -> (HeaderMap, Body) {
        (self.headers, self.body)
    }

    /// Consume the content as a stream of chunks.
    #[must_use]
    pub fn into_stream(self) -> ByteStream {
        self.body.into_stream()
    }

    /// Read the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by the body stream.
    pub async fn read_to_bytes(self) -> Result<Bytes> {
        if let Body::Bytes(bytes) = self.body {
            return Ok(bytes);
        }
        let mut stream = self.into_stream();
        let mut buffer = BytesMut::new();
        while let Some(chunk) = stream.try_next().await? {
            buffer.extend_from_slice(&chunk);
        }
        Ok(buffer.freeze())
    }

    /// Read the whole body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or the body is not valid UTF-8.
    pub async fn read_to_string(self) -> Result<String> {
        let bytes = self.read_to_bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            crate::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

/// Collect a stream into memory. Used by tests and by callers holding a raw stream.
///
/// # Errors
///
/// Returns the first error produced by the stream.
pub async fn collect_stream(stream: ByteStream) -> Result<Bytes> {
    stream
        .try_fold(BytesMut::new(), |mut buffer, chunk| async move {
            buffer.extend_from_slice(&chunk);
            Ok(buffer)
        })
        .await
        .map(BytesMut::freeze)
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Self::bytes(bytes)
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Box a stream of chunks.
pub fn byte_stream<S>(stream: S) -> ByteStream
where
    S: Stream<Item = Result<Bytes>> + Send + 'static,
{
    Box::pin(stream)
}

/// A stream yielding the given chunks.
#[must_use]
pub fn chunks<I>(chunks: I) -> ByteStream
where
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: Send + 'static,
{
    Box::pin(stream::iter(chunks).map(Ok::<_, crate::Error>))
}
