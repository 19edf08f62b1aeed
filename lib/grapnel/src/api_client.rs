//! Interface client: a service definition bound to a transport and a base URL.

use std::sync::Arc;

use grapnel_core::{
    Arg, CancelSignal, Invoker, Outcome, RestInterface, ServiceDefinition, ServiceRegistry,
    Settings,
};
use serde::de::DeserializeOwned;
use url::Url;

use crate::{Error, HttpClient, Result};

/// Calls the methods of one interface through any [`HttpClient`].
///
/// A single transport (with its pool and middleware) can back several
/// interfaces.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use grapnel::{
///     ApiClient, Arg, ArgType, HyperClient, Method, MethodDescriptor, ReturnShape,
///     ServiceDefinition,
/// };
///
/// # async fn run() -> grapnel::Result<()> {
/// let service = ServiceDefinition::new("github").method(
///     MethodDescriptor::builder("user", Method::Get, "/users/{login}")
///         .path("login", ArgType::Text)
///         .returns(ReturnShape::value::<serde_json::Value>())
///         .build()?,
/// );
///
/// let http = HyperClient::builder().with_logging().build();
/// let github = ApiClient::new(http, "https://api.github.com", Arc::new(service))?;
/// let user: serde_json::Value = github.call("user", vec![Arg::text("octocat")]).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient<C> {
    client: C,
    base_url: Option<Url>,
    service: Arc<ServiceDefinition>,
    invoker: Invoker,
    cancel: CancelSignal,
}

impl<C: HttpClient> ApiClient<C> {
    /// Bind `service` to `client` under `base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn new(
        client: C,
        base_url: impl AsRef<str>,
        service: Arc<ServiceDefinition>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.as_ref()).map_err(Error::InvalidUrl)?;
        Ok(Self::with_url(client, Some(base_url), service))
    }

    /// Bind `service` to `client`, with an optional pre-parsed base URL.
    #[must_use]
    pub fn with_url(client: C, base_url: Option<Url>, service: Arc<ServiceDefinition>) -> Self {
        Self {
            client,
            base_url,
            invoker: Invoker::new(Arc::clone(&service), Arc::new(Settings::default())),
            service,
            cancel: CancelSignal::none(),
        }
    }

    /// Bind the interface `T`, building its definition once per process.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or the definition is invalid.
    pub fn for_interface<T: RestInterface>(client: C, base_url: impl AsRef<str>) -> Result<Self> {
        let service = ServiceRegistry::global().register_interface::<T>()?;
        Self::new(client, base_url, service)
    }

    /// A client with no base URL; every call fails until one is set.
    #[must_use]
    pub fn without_base_url(client: C, service: Arc<ServiceDefinition>) -> Self {
        Self::with_url(client, None, service)
    }

    /// Replace the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Use `settings` for parameter formatting and serialization.
    #[must_use]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.invoker = Invoker::new(Arc::clone(&self.service), Arc::new(settings));
        self
    }

    /// Bound every call by `cancel`, in addition to per-call cancellation arguments.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Call `method` and return the decoded outcome.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`].
    pub async fn invoke(&self, method: &str, args: Vec<Arg>) -> Result<Outcome> {
        self.invoker
            .invoke(&self.client, self.base_url.as_ref(), &self.cancel, method, args)
            .await
    }

    /// Call `method` and deserialize its JSON result.
    ///
    /// # Errors
    ///
    /// See [`Invoker::invoke`]; also fails if the outcome is not JSON-shaped
    /// or does not deserialize into `T`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, args: Vec<Arg>) -> Result<T> {
        self.invoke(method, args).await?.into_json()
    }

    /// The base URL, if set.
    #[must_use]
    pub const fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    /// The underlying transport.
    #[must_use]
    pub const fn inner(&self) -> &C {
        &self.client
    }

    /// The bound service definition.
    #[must_use]
    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }
}
