//! Parameter roles.
//!
//! Every declared parameter of a method is bound to exactly one
//! [`ParameterRole`], which decides where its argument lands in the request.

use std::fmt;
use std::sync::Arc;

use crate::ArgType;

/// How a sequence argument is rendered into query values and form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollectionFormat {
    /// Repeat the key for every element: `k=a&k=b`.
    Multi,
    /// Comma separated: `k=a,b`.
    Csv,
    /// Space separated: `k=a b`.
    Ssv,
    /// Tab separated.
    Tsv,
    /// Pipe separated: `k=a|b`.
    Pipes,
    /// Format the whole sequence as a single value.
    #[default]
    Default,
}

impl CollectionFormat {
    /// Separator used to join elements, for the joining formats.
    #[must_use]
    pub const fn separator(self) -> Option<&'static str> {
        match self {
            Self::Csv => Some(","),
            Self::Ssv => Some(" "),
            Self::Tsv => Some("\t"),
            Self::Pipes => Some("|"),
            Self::Multi | Self::Default => None,
        }
    }
}

/// How a structured body argument is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BodySerialization {
    /// Serialized by the configured serializer (JSON).
    #[default]
    Json,
    /// Flattened into `application/x-www-form-urlencoded`.
    UrlEncoded,
}

/// Where an argument is placed in the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParameterRole {
    /// Substituted into the `{placeholder}` of the path template.
    Path(String),
    /// Added to the query string (or sent as a form field on multipart methods).
    Query {
        /// Query key.
        key: String,
        /// Rendering of sequence arguments.
        format: CollectionFormat,
    },
    /// Sent as the named request header.
    Header(String),
    /// Sent as the request body.
    Body(BodySerialization),
    /// Sent as a multipart field with this field name.
    Attachment(String),
    /// Cancels the call; never serialized.
    Cancellation,
}

impl fmt::Display for ParameterRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(placeholder) => write!(f, "path {{{placeholder}}}"),
            Self::Query { key, .. } => write!(f, "query `{key}`"),
            Self::Header(name) => write!(f, "header `{name}`"),
            Self::Body(BodySerialization::Json) => write!(f, "body"),
            Self::Body(BodySerialization::UrlEncoded) => write!(f, "url-encoded body"),
            Self::Attachment(field) => write!(f, "attachment `{field}`"),
            Self::Cancellation => write!(f, "cancellation"),
        }
    }
}

/// A declared parameter: name, declared type and role.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamDescriptor {
    name: String,
    ty: ArgType,
    role: ParameterRole,
}

impl ParamDescriptor {
    /// Create a parameter descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ArgType, role: ParameterRole) -> Self {
        Self {
            name: name.into(),
            ty,
            role,
        }
    }

    /// The declared parameter name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared type.
    #[must_use]
    pub const fn ty(&self) -> &ArgType {
        &self.ty
    }

    /// The role.
    #[must_use]
    pub const fn role(&self) -> &ParameterRole {
        &self.role
    }
}

/// Method name and parameters of the call that produced a request.
///
/// Stored in request extensions so middleware can tell which declared
/// operation a request belongs to.
///
/// # Example
///
/// ```ignore
/// if let Some(meta) = request.extensions().get::<ParameterMetadata>() {
///     println!("Method: {}", meta.method_name());
///     for param in meta.parameters() {
///         println!("  {}: {} ({})", param.name(), param.ty(), param.role());
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterMetadata {
    method_name: Arc<str>,
    parameters: Arc<[ParamDescriptor]>,
}

impl ParameterMetadata {
    pub(crate) const fn new(method_name: Arc<str>, parameters: Arc<[ParamDescriptor]>) -> Self {
        Self {
            method_name,
            parameters,
        }
    }

    /// The declared method name.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The declared parameters, in order.
    #[must_use]
    pub fn parameters(&self) -> &[ParamDescriptor] {
        &self.parameters
    }
}
