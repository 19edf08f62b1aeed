//! Call arguments.
//!
//! Methods are invoked with a positional list of [`Arg`]s. Each argument has a
//! runtime [`ArgType`] which drives overload resolution and the placement
//! rules of the request factory.

use std::any::type_name;
use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::{ByteStream, CancelSignal, Content, FieldRule, FormRules, MultipartItem, Result};

/// Runtime type of an argument, as declared by a parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArgType {
    /// Any type. The runtime type of a `null` argument.
    Any,
    /// Text.
    Text,
    /// Raw bytes.
    Bytes,
    /// A readable byte stream.
    Stream,
    /// A file reference.
    File,
    /// A [`MultipartItem`].
    Part,
    /// Pre-built [`Content`].
    Content,
    /// A serializable value, identified by its Rust type name.
    Json(&'static str),
    /// A sequence of elements of one type.
    Seq(Box<ArgType>),
    /// A cancellation signal.
    Cancel,
}

impl ArgType {
    /// The type of serialized `T` values.
    #[must_use]
    pub fn json<T: ?Sized>() -> Self {
        Self::Json(type_name::<T>())
    }

    /// A sequence of `element`.
    #[must_use]
    pub fn seq(element: Self) -> Self {
        Self::Seq(Box::new(element))
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Text => f.write_str("text"),
            Self::Bytes => f.write_str("bytes"),
            Self::Stream => f.write_str("stream"),
            Self::File => f.write_str("file"),
            Self::Part => f.write_str("multipart item"),
            Self::Content => f.write_str("content"),
            Self::Json(name) => f.write_str(name),
            Self::Seq(element) => write!(f, "[{element}]"),
            Self::Cancel => f.write_str("cancellation"),
        }
    }
}

/// A structured argument: its serialized value plus its form rules.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonArg {
    type_name: &'static str,
    value: Value,
    rules: &'static [FieldRule],
}

impl JsonArg {
    /// The Rust type name of the serialized value.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The serialized value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    /// Form rules of the serialized type.
    #[must_use]
    pub const fn rules(&self) -> &'static [FieldRule] {
        self.rules
    }

    pub(crate) fn into_value(self) -> Value {
        self.value
    }
}

/// A sequence argument.
#[derive(Debug)]
pub struct SeqArg {
    element: ArgType,
    items: Vec<Arg>,
}

impl SeqArg {
    /// Declared element type.
    #[must_use]
    pub const fn element(&self) -> &ArgType {
        &self.element
    }

    /// The elements.
    #[must_use]
    pub fn items(&self) -> &[Arg] {
        &self.items
    }

    pub(crate) fn into_items(self) -> Vec<Arg> {
        self.items
    }
}

/// One positional call argument.
pub enum Arg {
    /// Absent value.
    Null,
    /// Text.
    Text(String),
    /// Raw bytes.
    Bytes(Bytes),
    /// A readable byte stream.
    Stream(ByteStream),
    /// A file on disk.
    File(PathBuf),
    /// A caller-described multipart part.
    Part(MultipartItem),
    /// Pre-built content.
    Content(Content),
    /// A serialized value.
    Json(JsonArg),
    /// A sequence of arguments.
    Seq(SeqArg),
    /// A cancellation signal.
    Cancel(CancelSignal),
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Part(item) => f.debug_tuple("Part").field(item).finish(),
            Self::Content(content) => f.debug_tuple("Content").field(content).finish(),
            Self::Json(json) => f.debug_tuple("Json").field(json).finish(),
            Self::Seq(seq) => f.debug_tuple("Seq").field(seq).finish(),
            Self::Cancel(signal) => f.debug_tuple("Cancel").field(signal).finish(),
        }
    }
}

impl Arg {
    /// Text argument.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Bytes argument.
    #[must_use]
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Byte stream argument.
    #[must_use]
    pub fn stream(stream: ByteStream) -> Self {
        Self::Stream(stream)
    }

    /// File reference argument.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Serialize `value` into a structured argument.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Self::json_with_rules(value, &[])
    }

    /// Serialize `value`, keeping the form rules of `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn form<T: Serialize + FormRules>(value: &T) -> Result<Self> {
        Self::json_with_rules(value, T::field_rules())
    }

    fn json_with_rules<T: Serialize + ?Sized>(
        value: &T,
        rules: &'static [FieldRule],
    ) -> Result<Self> {
        Ok(Self::Json(JsonArg {
            type_name: type_name::<T>(),
            value: serde_json::to_value(value)?,
            rules,
        }))
    }

    /// A sequence of serialized values.
    ///
    /// # Errors
    ///
    /// Returns an error if an element cannot be serialized.
    pub fn json_seq<T: Serialize>(items: &[T]) -> Result<Self> {
        let items = items.iter().map(Self::json).collect::<Result<Vec<_>>>()?;
        Ok(Self::seq(ArgType::json::<T>(), items))
    }

    /// A sequence of text values.
    #[must_use]
    pub fn texts<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::seq(ArgType::Text, items.into_iter().map(Self::text))
    }

    /// A sequence of file references.
    #[must_use]
    pub fn files<I>(paths: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<PathBuf>,
    {
        Self::seq(ArgType::File, paths.into_iter().map(Self::file))
    }

    /// A sequence of multipart items.
    #[must_use]
    pub fn parts(items: impl IntoIterator<Item = MultipartItem>) -> Self {
        Self::seq(ArgType::Part, items.into_iter().map(Self::Part))
    }

    /// A sequence of arguments of the declared `element` type.
    #[must_use]
    pub fn seq(element: ArgType, items: impl IntoIterator<Item = Self>) -> Self {
        Self::Seq(SeqArg {
            element,
            items: items.into_iter().collect(),
        })
    }

    /// Returns `true` for [`Arg::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The runtime type used for overload resolution.
    #[must_use]
    pub fn arg_type(&self) -> ArgType {
        match self {
            Self::Null => ArgType::Any,
            Self::Text(_) => ArgType::Text,
            Self::Bytes(_) => ArgType::Bytes,
            Self::Stream(_) => ArgType::Stream,
            Self::File(_) => ArgType::File,
            Self::Part(_) => ArgType::Part,
            Self::Content(_) => ArgType::Content,
            Self::Json(json) => ArgType::Json(json.type_name),
            Self::Seq(seq) => ArgType::seq(seq.element.clone()),
            Self::Cancel(_) => ArgType::Cancel,
        }
    }

    /// The cancellation signal carried by this argument, if any.
    #[must_use]
    pub const fn as_cancel(&self) -> Option<&CancelSignal> {
        match self {
            Self::Cancel(signal) => Some(signal),
            _ => None,
        }
    }

    /// The value to render into a URL or header, when the argument has one.
    ///
    /// Text and serialized values qualify, as do sequences made of them.
    pub(crate) fn to_value(&self) -> Option<Value> {
        match self {
            Self::Null => Some(Value::Null),
            Self::Text(text) => Some(Value::String(text.clone())),
            Self::Json(json) => Some(json.value.clone()),
            Self::Seq(seq) => seq
                .items
                .iter()
                .map(Self::to_value)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Self::Bytes(_)
            | Self::Stream(_)
            | Self::File(_)
            | Self::Part(_)
            | Self::Content(_)
            | Self::Cancel(_) => None,
        }
    }
}

impl From<&str> for Arg {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for Arg {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Bytes> for Arg {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<PathBuf> for Arg {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<MultipartItem> for Arg {
    fn from(item: MultipartItem) -> Self {
        Self::Part(item)
    }
}

impl From<Content> for Arg {
    fn from(content: Content) -> Self {
        Self::Content(content)
    }
}

impl From<CancelSignal> for Arg {
    fn from(signal: CancelSignal) -> Self {
        Self::Cancel(signal)
    }
}

impl<T: Into<Self>> From<Option<T>> for Arg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
