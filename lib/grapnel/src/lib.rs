//! Declarative REST client for Rust.
//!
//! Describe an interface once, as method descriptors, and call it by name:
//! grapnel builds the request from the arguments, sends it through a Tower
//! middleware stack over hyper, and decodes the response into the declared
//! shape.
//!
//! # Example
//!
//! ```no_run
//! use grapnel::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! struct User {
//!     login: String,
//! }
//!
//! struct GitHub;
//!
//! impl RestInterface for GitHub {
//!     const NAME: &'static str = "github";
//!
//!     fn definition() -> Result<ServiceDefinition> {
//!         Ok(ServiceDefinition::new("github").method(
//!             MethodDescriptor::builder("user", Method::Get, "/users/{login}")
//!                 .path("login", ArgType::Text)
//!                 .header("Accept", "application/vnd.github+json")
//!                 .returns(ReturnShape::value::<User>())
//!                 .build()?,
//!         ))
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let http = HyperClient::builder().with_logging().build();
//! let github = ApiClient::for_interface::<GitHub>(http, "https://api.github.com")?;
//! let user: User = github.call("user", vec![Arg::text("octocat")]).await?;
//! # Ok(())
//! # }
//! ```

mod api_client;
mod client;
mod config;
mod connector;
pub mod middleware;
pub mod prelude;

pub use api_client::ApiClient;
pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder};

// Re-export tower for middleware composition
pub use tower;

pub use grapnel_core::{
    ApiError, Arg, ArgType, Body, BodySerialization, ByteStream, CancelHandle, CancelSignal,
    CollectionFormat, Content, DefaultUrlParameterFormatter, Error, FieldRule, FormRules,
    HttpClient, Invoker, Method, MethodDescriptor, MethodDescriptorBuilder, MultipartItem,
    Outcome, Request, RequestBuilder, RequestFactory, Response, RestInterface, Result,
    ReturnShape, ServiceDefinition, ServiceRegistry, Settings, UrlParameterFormatter, chunks,
    collect_stream, from_json, to_json,
};

// Re-export http types for status codes and headers
pub use grapnel_core::{StatusCode, header};

pub use url;
