//! Core of the grapnel declarative REST client.
//!
//! This crate compiles method descriptors and their arguments into HTTP
//! requests and decodes responses into declared shapes:
//! - [`MethodDescriptor`] - verb, path template, parameter roles and return shape
//! - [`Arg`] - a positional argument with a runtime [`ArgType`]
//! - [`RequestFactory`] - builds a [`Request`] from a descriptor and arguments
//! - [`FormValueMultimap`] - flattens structured values into form/query pairs
//! - [`ResponseDispatcher`] - turns a [`Response`] into an [`Outcome`] or an [`ApiError`]
//! - [`ServiceDefinition`] and [`ServiceRegistry`] - per-interface dispatch tables
//! - [`HttpClient`] - the transport seam
//! - [`Invoker`] - resolve, build, send, decode
//! - [`CancelSignal`] - cooperative cancellation
//!
//! # Example
//!
//! ```
//! use grapnel_core::{Arg, ArgType, Method, MethodDescriptor, RequestFactory};
//!
//! let descriptor = MethodDescriptor::builder("user", Method::Get, "/users/{login}")
//!     .path("login", ArgType::Text)
//!     .query("expand", ArgType::Text)
//!     .build()?;
//!
//! let request = RequestFactory::default().build(
//!     &descriptor,
//!     "/api",
//!     vec![Arg::text("octo cat"), Arg::text("repos")],
//! )?;
//! assert_eq!(request.target(), "/api/users/octo%20cat?expand=repos");
//! # Ok::<(), grapnel_core::Error>(())
//! ```

mod arg;
mod body;
mod cancel;
mod client;
mod descriptor;
mod dispatch;
mod error;
mod factory;
mod form;
mod formatter;
mod invoke;
mod method;
mod multipart;
mod param;
mod path_template;
pub mod prelude;
mod registry;
mod request;
mod response;
mod serializer;

pub use arg::{Arg, ArgType, JsonArg, SeqArg};
pub use body::{
    Body, ByteStream, Content, FORM_MEDIA_TYPE, TEXT_MEDIA_TYPE, byte_stream, chunks,
    collect_stream, is_content_header,
};
pub use cancel::{CancelHandle, CancelSignal};
pub use client::HttpClient;
pub use descriptor::{MethodDescriptor, MethodDescriptorBuilder, ReturnShape};
pub use dispatch::{Outcome, ResponseDispatcher};
pub use error::{ApiError, Error, Result};
pub use factory::RequestFactory;
pub use form::{FieldRule, FormRules, FormValueMultimap};
pub use formatter::{DefaultUrlParameterFormatter, Settings, UrlParameterFormatter};
pub use invoke::Invoker;
pub use method::Method;
pub use multipart::{FormPart, MULTIPART_BOUNDARY, Multipart, MultipartItem, PartSource};
pub use param::{
    BodySerialization, CollectionFormat, ParamDescriptor, ParameterMetadata, ParameterRole,
};
pub use path_template::PathTemplate;
pub use registry::{RestInterface, ServiceDefinition, ServiceRegistry};
pub use request::{Request, RequestBuilder};
pub use response::Response;
pub use serializer::{
    JSON_CHUNK_SIZE, JSON_MEDIA_TYPE, JsonSerializer, Serializer, from_json, from_value, to_json,
};

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
