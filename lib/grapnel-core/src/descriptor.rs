//! Method descriptors.
//!
//! A [`MethodDescriptor`] is the parsed, validated description of one declared
//! operation. It is built once with [`MethodDescriptor::builder`] and shared
//! read-only afterwards.
//!
//! # Example
//!
//! ```
//! use grapnel_core::{ArgType, Method, MethodDescriptor, ReturnShape};
//!
//! let descriptor = MethodDescriptor::builder("get_user", Method::Get, "/users/{id}")
//!     .path("id", ArgType::Text)
//!     .query("expand", ArgType::json::<bool>())
//!     .header("Accept", "application/json")
//!     .returns(ReturnShape::Text)
//!     .build()
//!     .expect("valid descriptor");
//!
//! assert_eq!(descriptor.arity(), 2);
//! ```

use std::sync::Arc;

use crate::{
    ArgType, BodySerialization, CollectionFormat, Error, Method, ParamDescriptor,
    ParameterMetadata, ParameterRole, PathTemplate, Result,
};

/// What a successful call produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ReturnShape {
    /// Nothing; the response is dropped after the status check.
    #[default]
    Unit,
    /// The raw response.
    Response,
    /// The response content.
    Content,
    /// The response body as a byte stream.
    Stream,
    /// The response body as text.
    Text,
    /// The deserialized response body.
    Value {
        /// Rust type name of the expected value.
        type_name: &'static str,
    },
}

impl ReturnShape {
    /// The shape of a deserialized `T`.
    #[must_use]
    pub fn value<T: ?Sized>() -> Self {
        Self::Value {
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Immutable description of a declared operation.
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    name: Arc<str>,
    method: Method,
    path: PathTemplate,
    params: Arc<[ParamDescriptor]>,
    headers: Vec<(String, Option<String>)>,
    multipart: bool,
    returns: ReturnShape,
}

impl MethodDescriptor {
    /// Start describing the operation `name`.
    #[must_use]
    pub fn builder(
        name: impl Into<String>,
        method: Method,
        path: impl Into<String>,
    ) -> MethodDescriptorBuilder {
        MethodDescriptorBuilder {
            name: name.into(),
            method,
            path: path.into(),
            params: Vec::new(),
            headers: Vec::new(),
            multipart: false,
            returns: ReturnShape::Unit,
        }
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// HTTP verb.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Relative path template.
    #[must_use]
    pub const fn path(&self) -> &PathTemplate {
        &self.path
    }

    /// Declared parameters, in positional order.
    #[must_use]
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Static headers, in declaration order. `None` removes the header.
    #[must_use]
    pub fn headers(&self) -> &[(String, Option<String>)] {
        &self.headers
    }

    /// Returns `true` if the body is assembled as multipart form data.
    #[must_use]
    pub const fn is_multipart(&self) -> bool {
        self.multipart
    }

    /// Declared return shape.
    #[must_use]
    pub const fn returns(&self) -> &ReturnShape {
        &self.returns
    }

    /// Position of the cancellation parameter, if declared.
    #[must_use]
    pub fn cancellation_index(&self) -> Option<usize> {
        self.params
            .iter()
            .position(|param| *param.role() == ParameterRole::Cancellation)
    }

    /// Returns `true` if the declared parameter types are exactly `types`.
    #[must_use]
    pub fn accepts(&self, types: &[ArgType]) -> bool {
        self.params.len() == types.len()
            && self
                .params
                .iter()
                .zip(types)
                .all(|(param, ty)| param.ty() == ty)
    }

    /// Method name and parameters, for request extensions.
    #[must_use]
    pub fn metadata(&self) -> ParameterMetadata {
        ParameterMetadata::new(Arc::clone(&self.name), Arc::clone(&self.params))
    }
}

/// Builder for [`MethodDescriptor`].
#[derive(Debug, Clone)]
pub struct MethodDescriptorBuilder {
    name: String,
    method: Method,
    path: String,
    params: Vec<ParamDescriptor>,
    headers: Vec<(String, Option<String>)>,
    multipart: bool,
    returns: ReturnShape,
}

impl MethodDescriptorBuilder {
    /// Add a parameter.
    #[must_use]
    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Add a path parameter bound to the placeholder of the same name.
    #[must_use]
    pub fn path(self, name: impl Into<String>, ty: ArgType) -> Self {
        let name = name.into();
        let role = ParameterRole::Path(name.clone());
        self.param(ParamDescriptor::new(name, ty, role))
    }

    /// Add a path parameter bound to `placeholder`.
    #[must_use]
    pub fn path_as(
        self,
        name: impl Into<String>,
        placeholder: impl Into<String>,
        ty: ArgType,
    ) -> Self {
        self.param(ParamDescriptor::new(
            name,
            ty,
            ParameterRole::Path(placeholder.into()),
        ))
    }

    /// Add a query parameter keyed by its name.
    #[must_use]
    pub fn query(self, name: impl Into<String>, ty: ArgType) -> Self {
        let name = name.into();
        let role = ParameterRole::Query {
            key: name.clone(),
            format: CollectionFormat::Default,
        };
        self.param(ParamDescriptor::new(name, ty, role))
    }

    /// Add a query parameter with an explicit key and collection format.
    #[must_use]
    pub fn query_as(
        self,
        name: impl Into<String>,
        key: impl Into<String>,
        ty: ArgType,
        format: CollectionFormat,
    ) -> Self {
        let role = ParameterRole::Query {
            key: key.into(),
            format,
        };
        self.param(ParamDescriptor::new(name, ty, role))
    }

    /// Add a parameter sent as the header `header`.
    #[must_use]
    pub fn header_param(
        self,
        name: impl Into<String>,
        header: impl Into<String>,
        ty: ArgType,
    ) -> Self {
        self.param(ParamDescriptor::new(
            name,
            ty,
            ParameterRole::Header(header.into()),
        ))
    }

    /// Add the body parameter.
    #[must_use]
    pub fn body(
        self,
        name: impl Into<String>,
        ty: ArgType,
        serialization: BodySerialization,
    ) -> Self {
        self.param(ParamDescriptor::new(
            name,
            ty,
            ParameterRole::Body(serialization),
        ))
    }

    /// Add a multipart attachment sent under `field_name`.
    #[must_use]
    pub fn attachment(
        self,
        name: impl Into<String>,
        field_name: impl Into<String>,
        ty: ArgType,
    ) -> Self {
        self.param(ParamDescriptor::new(
            name,
            ty,
            ParameterRole::Attachment(field_name.into()),
        ))
    }

    /// Add the cancellation parameter.
    #[must_use]
    pub fn cancellation(self, name: impl Into<String>) -> Self {
        self.param(ParamDescriptor::new(
            name,
            ArgType::Cancel,
            ParameterRole::Cancellation,
        ))
    }

    /// Add a static header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), Some(value.into())));
        self
    }

    /// Add a static header removal.
    #[must_use]
    pub fn remove_header(mut self, name: impl Into<String>) -> Self {
        self.headers.push((name.into(), None));
        self
    }

    /// Assemble the body as multipart form data.
    #[must_use]
    pub const fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }

    /// Set the return shape.
    #[must_use]
    pub fn returns(mut self, returns: ReturnShape) -> Self {
        self.returns = returns;
        self
    }

    /// Validate and build the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDescriptor`] if:
    /// - the path does not start with `/`,
    /// - a placeholder is not bound to exactly one path parameter, or a path
    ///   parameter names no placeholder,
    /// - more than one body or cancellation parameter is declared,
    /// - an attachment is declared on a non-multipart method,
    /// - a multipart method declares a body parameter,
    /// - a multipart parameter has a type that cannot become a form part.
    pub fn build(self) -> Result<MethodDescriptor> {
        if !self.path.starts_with('/') {
            return Err(self.invalid(format!("path `{}` must start with `/`", self.path)));
        }

        let template = PathTemplate::new(self.path.as_str());
        let placeholders = template.placeholders();

        for placeholder in &placeholders {
            let bound = self
                .params
                .iter()
                .filter(|param| {
                    matches!(param.role(), ParameterRole::Path(name) if name.eq_ignore_ascii_case(placeholder))
                })
                .count();
            if bound != 1 {
                return Err(self.invalid(format!(
                    "placeholder {{{placeholder}}} must be bound to exactly one path parameter, found {bound}"
                )));
            }
        }

        let mut bodies = 0_usize;
        let mut cancellations = 0_usize;
        for param in &self.params {
            match param.role() {
                ParameterRole::Path(name) => {
                    if !placeholders.iter().any(|p| p.eq_ignore_ascii_case(name)) {
                        return Err(self.invalid(format!(
                            "path parameter `{}` has no {{{name}}} placeholder in `{}`",
                            param.name(),
                            self.path
                        )));
                    }
                }
                ParameterRole::Body(_) => bodies += 1,
                ParameterRole::Cancellation => {
                    cancellations += 1;
                    if *param.ty() != ArgType::Cancel {
                        return Err(self.invalid(format!(
                            "cancellation parameter `{}` must have the cancellation type",
                            param.name()
                        )));
                    }
                }
                ParameterRole::Attachment(_) if !self.multipart => {
                    return Err(self.invalid(format!(
                        "attachment `{}` requires a multipart method",
                        param.name()
                    )));
                }
                ParameterRole::Query { .. } | ParameterRole::Attachment(_)
                    if self.multipart && !supports_multipart(param.ty()) =>
                {
                    return Err(self.invalid(format!(
                        "parameter `{}` of type {} cannot be sent as a multipart part",
                        param.name(),
                        param.ty()
                    )));
                }
                ParameterRole::Query { .. }
                | ParameterRole::Attachment(_)
                | ParameterRole::Header(_) => {}
            }
        }

        if bodies > 1 {
            return Err(self.invalid("at most one body parameter is allowed".to_string()));
        }
        if cancellations > 1 {
            return Err(self.invalid(
                "at most one cancellation parameter is allowed".to_string(),
            ));
        }
        if self.multipart && bodies > 0 {
            return Err(self.invalid(
                "a multipart method cannot declare a body parameter".to_string(),
            ));
        }

        Ok(MethodDescriptor {
            name: Arc::from(self.name),
            method: self.method,
            path: template,
            params: Arc::from(self.params),
            headers: self.headers,
            multipart: self.multipart,
            returns: self.returns,
        })
    }

    fn invalid(&self, message: String) -> Error {
        Error::invalid_descriptor(format!("{}: {message}", self.name))
    }
}

/// Types that can become one or more multipart parts.
fn supports_multipart(ty: &ArgType) -> bool {
    match ty {
        ArgType::Seq(element) => !matches!(
            **element,
            ArgType::Seq(_) | ArgType::Content | ArgType::Cancel
        ),
        ArgType::Content | ArgType::Cancel => false,
        ArgType::Any
        | ArgType::Text
        | ArgType::Bytes
        | ArgType::Stream
        | ArgType::File
        | ArgType::Part
        | ArgType::Json(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};

    use super::*;

    #[test]
    fn build_valid_descriptor() {
        let descriptor = MethodDescriptor::builder("update", Method::Put, "/users/{ID}?v=1")
            .path("id", ArgType::Text)
            .body("user", ArgType::json::<String>(), BodySerialization::Json)
            .header_param("token", "Authorization", ArgType::Text)
            .cancellation("cancel")
            .header("Accept", "application/json")
            .remove_header("User-Agent")
            .returns(ReturnShape::value::<u64>())
            .build()
            .expect("valid");

        check!(descriptor.name() == "update");
        check!(descriptor.method() == Method::Put);
        check!(descriptor.arity() == 4);
        check!(descriptor.cancellation_index() == Some(3));
        check!(descriptor.headers().len() == 2);
        check!(!descriptor.is_multipart());
        check!(*descriptor.returns() == ReturnShape::value::<u64>());
        check!(descriptor.metadata().method_name() == "update");
    }

    #[test]
    fn accepts_exact_types() {
        let descriptor = MethodDescriptor::builder("get", Method::Get, "/items/{id}")
            .path("id", ArgType::json::<u32>())
            .query("q", ArgType::Text)
            .build()
            .expect("valid");

        check!(descriptor.accepts(&[ArgType::json::<u32>(), ArgType::Text]));
        check!(!descriptor.accepts(&[ArgType::Text, ArgType::Text]));
        check!(!descriptor.accepts(&[ArgType::json::<u32>()]));
    }

    #[test]
    fn relative_path_is_rejected() {
        let result = MethodDescriptor::builder("fetch", Method::Get, "{target}")
            .path("target", ArgType::Text)
            .build();
        let_assert!(Err(Error::InvalidDescriptor(message)) = result);
        check!(message.contains("must start with `/`"));

        let result = MethodDescriptor::builder("list", Method::Get, "users").build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);
    }

    #[test]
    fn unbound_placeholder_is_rejected() {
        let result = MethodDescriptor::builder("get", Method::Get, "/users/{id}").build();
        let_assert!(Err(Error::InvalidDescriptor(message)) = result);
        check!(message.contains("{id}"));
    }

    #[test]
    fn doubly_bound_placeholder_is_rejected() {
        let result = MethodDescriptor::builder("get", Method::Get, "/users/{id}")
            .path("id", ArgType::Text)
            .path_as("other", "ID", ArgType::Text)
            .build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);
    }

    #[test]
    fn path_param_without_placeholder_is_rejected() {
        let result = MethodDescriptor::builder("get", Method::Get, "/users")
            .path("id", ArgType::Text)
            .build();
        let_assert!(Err(Error::InvalidDescriptor(message)) = result);
        check!(message.contains("`id`"));
    }

    #[test]
    fn two_bodies_are_rejected() {
        let result = MethodDescriptor::builder("post", Method::Post, "/users")
            .body("a", ArgType::Text, BodySerialization::Json)
            .body("b", ArgType::Text, BodySerialization::Json)
            .build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);
    }

    #[test]
    fn two_cancellations_are_rejected() {
        let result = MethodDescriptor::builder("get", Method::Get, "/users")
            .cancellation("a")
            .cancellation("b")
            .build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);
    }

    #[test]
    fn attachment_requires_multipart() {
        let result = MethodDescriptor::builder("upload", Method::Post, "/files")
            .attachment("file", "file", ArgType::File)
            .build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);
    }

    #[test]
    fn multipart_rejects_body() {
        let result = MethodDescriptor::builder("upload", Method::Post, "/files")
            .multipart()
            .body("data", ArgType::Bytes, BodySerialization::Json)
            .build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);
    }

    #[test]
    fn multipart_capability_check() {
        let result = MethodDescriptor::builder("upload", Method::Post, "/files")
            .multipart()
            .attachment("content", "content", ArgType::Content)
            .build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);

        let result = MethodDescriptor::builder("upload", Method::Post, "/files")
            .multipart()
            .query("nested", ArgType::seq(ArgType::seq(ArgType::Text)))
            .build();
        let_assert!(Err(Error::InvalidDescriptor(_)) = result);

        let descriptor = MethodDescriptor::builder("upload", Method::Post, "/files")
            .multipart()
            .query("files", ArgType::seq(ArgType::File))
            .attachment("meta", "metadata", ArgType::json::<u8>())
            .attachment("part", "part", ArgType::Part)
            .build()
            .expect("valid");
        check!(descriptor.is_multipart());
    }
}
