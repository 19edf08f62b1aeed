//! Body serialization.
//!
//! Structured values travel through the request pipeline as
//! [`serde_json::Value`]; a [`Serializer`] turns them into wire bytes and back.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::stream;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::{ByteStream, Result};

/// Content-Type of serialized JSON bodies.
pub const JSON_MEDIA_TYPE: &str = "application/json; charset=utf-8";

/// Capability that writes structured values to bodies and reads them back.
pub trait Serializer: fmt::Debug + Send + Sync {
    /// Write `value` into `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the writer fails.
    fn serialize(&self, value: &Value, writer: &mut dyn io::Write) -> Result<()>;

    /// Read a value from a complete body.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid encoding.
    fn deserialize(&self, bytes: &[u8]) -> Result<Value>;

    /// Content-Type announced for bodies written by this serializer.
    fn media_type(&self) -> &'static str {
        JSON_MEDIA_TYPE
    }
}

/// [`Serializer`] backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value, writer: &mut dyn io::Write) -> Result<()> {
        serde_json::to_writer(writer, value).map_err(Into::into)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        from_json(bytes)
    }
}

/// Largest chunk emitted while a value is being serialized.
pub const JSON_CHUNK_SIZE: usize = 16 * 1024;

/// Chunks in flight between the serializing thread and the body stream.
const JSON_CHANNEL_CAPACITY: usize = 4;

/// Serialize `value` on the blocking pool, yielding chunks of at most
/// [`JSON_CHUNK_SIZE`] bytes as they are written.
///
/// Must be polled inside a tokio runtime. Dropping the stream stops the
/// serializer at its next chunk.
pub(crate) fn encode_stream(value: Value, serializer: Arc<dyn Serializer>) -> ByteStream {
    let (tx, rx) = mpsc::channel(JSON_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let mut writer = ChunkWriter {
            buffer: BytesMut::with_capacity(JSON_CHUNK_SIZE),
            tx,
        };
        let result = serializer
            .serialize(&value, &mut writer)
            .and_then(|()| writer.finish().map_err(Into::into));
        if let Err(err) = result {
            // the receiver may be gone already
            let _ = writer.tx.blocking_send(Err(err));
        }
    });

    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }))
}

/// [`io::Write`] adapter forwarding full chunks to a body stream.
struct ChunkWriter {
    buffer: BytesMut,
    tx: mpsc::Sender<Result<Bytes>>,
}

impl ChunkWriter {
    fn send(&self, chunk: Bytes) -> io::Result<()> {
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "request body dropped"))
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let rest = self.buffer.split().freeze();
        self.send(rest)
    }
}

impl io::Write for ChunkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(data);
        while self.buffer.len() >= JSON_CHUNK_SIZE {
            let chunk = self.buffer.split_to(JSON_CHUNK_SIZE).freeze();
            self.send(chunk)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use grapnel_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// Uses `serde_path_to_error` so the error names the exact path to the field
/// that failed to deserialize (e.g. `user.address.city`).
///
/// # Errors
///
/// Returns [`crate::Error::JsonDeserialization`] if decoding fails.
///
/// # Example
///
/// ```
/// use grapnel_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let user: User = from_json(br#"{"name":"Alice"}"#).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}

/// Convert an already decoded value into a typed one, keeping path context.
///
/// # Errors
///
/// Returns [`crate::Error::JsonDeserialization`] if the value does not fit `T`.
pub fn from_value<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })
}
