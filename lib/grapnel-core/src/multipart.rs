//! Multipart form data.
//!
//! [`MultipartItem`] is what callers pass for attachment parameters when they
//! need control over the file name or content type of a part. [`Multipart`]
//! is the assembled container the request factory builds, encoded as a
//! `multipart/form-data` stream when the transport pulls the body.
//!
//! # Example
//!
//! ```ignore
//! use grapnel_core::MultipartItem;
//!
//! let report = MultipartItem::bytes(pdf_bytes, "report.pdf")?
//!     .with_content_type("application/pdf")?;
//! let photo = MultipartItem::file("/tmp/photo.jpg")?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::{StreamExt, stream};
use http::HeaderValue;
use http::header::{self, HeaderName};

use crate::{ByteStream, Content, Error, Result};

/// Boundary token separating multipart parts.
pub const MULTIPART_BOUNDARY: &str = "----GrapnelFormBoundary";

// ============================================================================
// Multipart Item
// ============================================================================

/// Where the bytes of a [`MultipartItem`] come from.
pub enum PartSource {
    /// In-memory bytes.
    Bytes(Bytes),
    /// A readable stream.
    Stream(ByteStream),
    /// A file on disk, opened when the request is built.
    File(PathBuf),
    /// Pre-built content, sent as is.
    Content(Content),
}

impl fmt::Debug for PartSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Content(content) => f.debug_tuple("Content").field(content).finish(),
        }
    }
}

/// A caller-described multipart part.
///
/// Every item carries a file name; it can also override the form field name
/// the part is sent under and set a content type.
#[derive(Debug)]
pub struct MultipartItem {
    source: PartSource,
    file_name: String,
    field_name: Option<String>,
    content_type: Option<HeaderValue>,
}

impl MultipartItem {
    /// A part holding `data`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `file_name` is blank.
    pub fn bytes(data: impl Into<Bytes>, file_name: impl Into<String>) -> Result<Self> {
        Self::with_source(PartSource::Bytes(data.into()), file_name.into())
    }

    /// A part reading `stream`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `file_name` is blank.
    pub fn stream(stream: ByteStream, file_name: impl Into<String>) -> Result<Self> {
        Self::with_source(PartSource::Stream(stream), file_name.into())
    }

    /// A part wrapping pre-built content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `file_name` is blank or contains
    /// a line break.
    pub fn content(content: Content, file_name: impl Into<String>) -> Result<Self> {
        Self::with_source(PartSource::Content(content), file_name.into())
    }

    /// A part reading the file at `path`, named after the file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `path` is empty or has no file name.
    pub fn file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_argument("a file part requires a file"));
        }
        let file_name = file_name_of(&path)?;
        Ok(Self {
            source: PartSource::File(path),
            file_name,
            field_name: None,
            content_type: None,
        })
    }

    fn with_source(source: PartSource, file_name: String) -> Result<Self> {
        check_file_name(&file_name)?;
        Ok(Self {
            source,
            file_name,
            field_name: None,
            content_type: None,
        })
    }

    /// Override the file name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `file_name` is blank or contains
    /// a line break.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Result<Self> {
        let file_name = file_name.into();
        check_file_name(&file_name)?;
        self.file_name = file_name;
        Ok(self)
    }

    /// Send the part under `field_name` instead of the parameter's field name.
    #[must_use]
    pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Set the part's `Content-Type`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the value is not a valid header value.
    pub fn with_content_type(mut self, content_type: &str) -> Result<Self> {
        let value = HeaderValue::from_str(content_type).map_err(|e| {
            Error::invalid_argument(format!("invalid content type `{content_type}`: {e}"))
        })?;
        self.content_type = Some(value);
        Ok(self)
    }

    /// The part's file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The field name override, if any.
    #[must_use]
    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    /// The part's content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_ref().and_then(|v| v.to_str().ok())
    }

    /// Where the bytes come from.
    #[must_use]
    pub const fn source(&self) -> &PartSource {
        &self.source
    }

    /// Turn the item into a form part named `field_name` unless overridden.
    ///
    /// File sources are opened here.
    pub(crate) fn into_form_part(self, field_name: &str) -> Result<FormPart> {
        let mut content = match self.source {
            PartSource::Bytes(bytes) => Content::bytes(bytes),
            PartSource::Stream(stream) => Content::stream(stream),
            PartSource::File(path) => Content::file(&path)?,
            PartSource::Content(content) => content,
        };
        if let Some(content_type) = self.content_type {
            content = content.with_content_type(content_type);
        }
        let name = self.field_name.unwrap_or_else(|| field_name.to_owned());
        FormPart::new(name, Some(self.file_name), content)
    }
}

fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.trim().is_empty() {
        return Err(Error::invalid_argument(
            "a multipart item requires a non-blank file name",
        ));
    }
    check_disposition_text("file name", file_name)
}

/// Names end up inside a quoted `Content-Disposition` parameter.
fn check_disposition_text(what: &str, text: &str) -> Result<()> {
    if text.contains(['\r', '\n']) {
        return Err(Error::invalid_argument(format!(
            "multipart {what} `{}` contains a line break",
            text.escape_debug()
        )));
    }
    Ok(())
}

/// Write `text` as the inside of a quoted parameter, `"` becoming `%22`.
fn put_quoted(buf: &mut BytesMut, text: &str) {
    for (index, piece) in text.split('"').enumerate() {
        if index > 0 {
            buf.put_slice(b"%22");
        }
        buf.put_slice(piece.as_bytes());
    }
}

/// The final path component of `path`, as text.
pub(crate) fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            Error::invalid_argument(format!("`{}` does not name a file", path.display()))
        })
}

// ============================================================================
// Form Part
// ============================================================================

/// One part of an assembled [`Multipart`] container.
#[derive(Debug)]
pub struct FormPart {
    name: String,
    file_name: Option<String>,
    content: Content,
}

impl FormPart {
    /// Create a part.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the field name or file name
    /// contains a line break.
    pub fn new(
        name: impl Into<String>,
        file_name: Option<String>,
        content: Content,
    ) -> Result<Self> {
        let name = name.into();
        check_disposition_text("field name", &name)?;
        if let Some(file_name) = &file_name {
            check_disposition_text("file name", file_name)?;
        }
        Ok(Self {
            name,
            file_name,
            content,
        })
    }

    /// Form field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name announced in the disposition, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The part's content.
    #[must_use]
    pub const fn content(&self) -> &Content {
        &self.content
    }

    /// The part's content, consuming the part.
    #[must_use]
    pub fn into_content(self) -> Content {
        self.content
    }

    fn head(&self, boundary: &str) -> Bytes {
        let mut buf = BytesMut::new();

        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"\r\n");

        buf.put_slice(b"Content-Disposition: form-data; name=\"");
        put_quoted(&mut buf, &self.name);
        buf.put_slice(b"\"");
        if let Some(file_name) = &self.file_name {
            buf.put_slice(b"; filename=\"");
            put_quoted(&mut buf, file_name);
            buf.put_slice(b"\"");
        }
        buf.put_slice(b"\r\n");

        for (name, value) in self.content.headers() {
            if *name == header::CONTENT_DISPOSITION {
                continue;
            }
            buf.put_slice(canonical_name(name).as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"\r\n");
        buf.freeze()
    }
}

/// `content-type` -> `Content-Type`.
fn canonical_name(name: &HeaderName) -> String {
    name.as_str()
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + chars.as_str()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

// ============================================================================
// Multipart
// ============================================================================

/// An ordered multipart container.
#[derive(Debug)]
pub struct Multipart {
    boundary: String,
    parts: Vec<FormPart>,
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

impl Multipart {
    /// Create an empty container with the fixed boundary.
    #[must_use]
    pub fn new() -> Self {
        Self::with_boundary(MULTIPART_BOUNDARY)
    }

    /// Create an empty container with a custom boundary.
    ///
    /// The boundary should be a unique string that doesn't appear in any part data.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            parts: Vec::new(),
        }
    }

    /// Append a part.
    pub fn push(&mut self, part: FormPart) {
        self.parts.push(part);
    }

    /// Get the boundary string.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Get the parts, in emission order.
    #[must_use]
    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Take the parts out of the container.
    #[must_use]
    pub fn into_parts(self) -> Vec<FormPart> {
        self.parts
    }

    /// Returns `multipart/form-data; boundary="<boundary>"`.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary=\"{}\"", self.boundary)
    }

    /// Encode the container as a stream; part bodies are pulled in order.
    #[must_use]
    pub fn into_stream(self) -> ByteStream {
        let Self { boundary, parts } = self;
        let mut segments: Vec<ByteStream> = Vec::with_capacity(parts.len() * 3 + 1);

        for part in parts {
            segments.push(once(part.head(&boundary)));
            segments.push(part.content.into_stream());
            segments.push(once(Bytes::from_static(b"\r\n")));
        }

        let mut tail = BytesMut::new();
        tail.put_slice(b"--");
        tail.put_slice(boundary.as_bytes());
        tail.put_slice(b"--\r\n");
        segments.push(once(tail.freeze()));

        Box::pin(stream::iter(segments).flatten())
    }
}

fn once(bytes: Bytes) -> ByteStream {
    Box::pin(stream::once(futures_util::future::ready(Ok::<_, Error>(
        bytes,
    ))))
}
