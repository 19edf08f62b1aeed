//! Tower middleware for [`HyperClient`](crate::HyperClient).
//!
//! Layers wrap the transport in the order they are added to the builder:
//! the last layer added is the first to see a request.
//!
//! - [`LoggingLayer`] - logs requests and responses with `tracing`
//! - [`AuthorizationLayer`] - fills declared `Authorization` headers from an async token getter
//!
//! Any other Tower layer can be added with
//! [`HyperClientBuilder::layer`](crate::HyperClientBuilder::layer).

mod authorization;
mod logging;

pub use authorization::{Authorization, AuthorizationLayer};
pub use logging::{LogLevel, Logging, LoggingLayer};

pub use tower::{Layer, ServiceBuilder};
