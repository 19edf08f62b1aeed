//! Calling a method of a service definition through a transport.

use std::sync::Arc;

use tracing::{Instrument, debug, debug_span};
use url::Url;

use crate::{
    Arg, ArgType, CancelSignal, Error, HttpClient, Outcome, RequestFactory, ResponseDispatcher,
    Result, ServiceDefinition, Settings,
};

/// Resolves methods of one service, builds their requests, sends them and
/// decodes the responses.
#[derive(Debug, Clone)]
pub struct Invoker {
    service: Arc<ServiceDefinition>,
    factory: RequestFactory,
    decoder: ResponseDispatcher,
}

impl Invoker {
    /// An invoker for `service` using `settings`.
    #[must_use]
    pub fn new(service: Arc<ServiceDefinition>, settings: Arc<Settings>) -> Self {
        let decoder = ResponseDispatcher::new(Arc::clone(settings.serializer()));
        Self {
            service,
            factory: RequestFactory::new(settings),
            decoder,
        }
    }

    /// The service this invoker calls.
    #[must_use]
    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    /// Call `method` with `args`.
    ///
    /// The overload is chosen from the runtime types of `args`. The target is
    /// prefixed with the path of `base_url` and resolved against it. A
    /// cancellation argument is linked with `cancel`; the send and the body
    /// reads are bounded by the linked signal.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidOperation`] if `base_url` is `None`,
    /// - method resolution errors ([`Error::UnknownMethod`], ...),
    /// - request construction errors,
    /// - [`Error::Cancelled`] if the linked signal fires,
    /// - transport errors, and [`Error::Api`] for non-success statuses.
    pub async fn invoke<C: HttpClient>(
        &self,
        client: &C,
        base_url: Option<&Url>,
        cancel: &CancelSignal,
        method: &str,
        args: Vec<Arg>,
    ) -> Result<Outcome> {
        let types = args.iter().map(Arg::arg_type).collect::<Vec<ArgType>>();
        let descriptor = self.service.resolve(method, Some(types.as_slice()))?;

        let base_url = base_url.ok_or_else(|| {
            Error::invalid_operation(format!(
                "{}.{method}: a base address must be set before calling the service",
                self.service.name()
            ))
        })?;

        let cancel = descriptor
            .cancellation_index()
            .and_then(|index| args.get(index))
            .and_then(Arg::as_cancel)
            .map_or_else(|| cancel.clone(), |signal| signal.linked(cancel));

        let mut request = self.factory.build(descriptor, base_url.path(), args)?;
        request.resolve(base_url)?;
        let uri = request.uri();
        let http_method = request.method();

        let span = debug_span!(
            "invoke",
            service = self.service.name(),
            method,
            http.method = %http_method,
            http.uri = %uri
        );
        async {
            debug!("sending request");
            let response = cancel.run(client.execute(request)).await?;
            debug!(status = response.status(), "received response");
            self.decoder
                .decode(descriptor.returns(), http_method, &uri, response, &cancel)
                .await
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert2::{check, let_assert};
    use bytes::Bytes;
    use http::HeaderMap;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{Content, Method, MethodDescriptor, Request, Response, ReturnShape, chunks};

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<(Method, String)>>,
        status: u16,
        body: &'static str,
    }

    impl Recording {
        fn replying(status: u16, body: &'static str) -> Self {
            Self {
                requests: Mutex::default(),
                status,
                body,
            }
        }

        fn seen(&self) -> Vec<(Method, String)> {
            self.requests.lock().expect("lock").clone()
        }
    }

    impl HttpClient for Recording {
        async fn execute(&self, request: Request) -> Result<Response> {
            self.requests
                .lock()
                .expect("lock")
                .push((request.method(), request.uri()));
            Ok(Response::new(
                self.status,
                HeaderMap::new(),
                Some(Content::stream(chunks([Bytes::from_static(
                    self.body.as_bytes(),
                )]))),
            ))
        }
    }

    struct Never;

    impl HttpClient for Never {
        async fn execute(&self, _request: Request) -> Result<Response> {
            std::future::pending().await
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u32,
        name: String,
    }

    fn invoker() -> Invoker {
        let service = ServiceDefinition::new("users")
            .method(
                MethodDescriptor::builder("get", Method::Get, "/users/{id}")
                    .path("id", ArgType::Text)
                    .returns(ReturnShape::value::<User>())
                    .build()
                    .expect("valid"),
            )
            .method(
                MethodDescriptor::builder("get", Method::Get, "/users/{id}/{part}")
                    .path("id", ArgType::Text)
                    .path("part", ArgType::Text)
                    .returns(ReturnShape::Text)
                    .build()
                    .expect("valid"),
            )
            .method(
                MethodDescriptor::builder("create", Method::Post, "/users")
                    .body("user", ArgType::json::<User>(), crate::BodySerialization::Json)
                    .cancellation("cancel")
                    .returns(ReturnShape::Response)
                    .build()
                    .expect("valid"),
            );
        Invoker::new(Arc::new(service), Arc::new(Settings::default()))
    }

    fn base() -> Url {
        Url::parse("https://api.example.com/v2").expect("url")
    }

    #[tokio::test]
    async fn invoke_resolves_overload_and_base_path() {
        let client = Recording::replying(200, r#"{"id": 7, "name": "ada"}"#);
        let outcome = invoker()
            .invoke(
                &client,
                Some(&base()),
                &CancelSignal::none(),
                "get",
                vec![Arg::text("7")],
            )
            .await
            .expect("outcome");

        check!(
            outcome.into_json::<User>().expect("user")
                == User {
                    id: 7,
                    name: "ada".to_string()
                }
        );
        check!(
            client.seen()
                == vec![(Method::Get, "https://api.example.com/v2/users/7".to_string())]
        );

        let client = Recording::replying(200, "bio");
        let outcome = invoker()
            .invoke(
                &client,
                Some(&base()),
                &CancelSignal::none(),
                "get",
                vec![Arg::text("7"), Arg::text("bio")],
            )
            .await
            .expect("outcome");
        check!(outcome.into_text().expect("text") == "bio");
    }

    #[tokio::test]
    async fn invoke_without_base_address() {
        let client = Recording::default();
        let result = invoker()
            .invoke(&client, None, &CancelSignal::none(), "get", vec![Arg::text("1")])
            .await;
        let_assert!(Err(Error::InvalidOperation(_)) = result);
        check!(client.seen().is_empty());
    }

    #[tokio::test]
    async fn invoke_unknown_method() {
        let result = invoker()
            .invoke(
                &Recording::default(),
                Some(&base()),
                &CancelSignal::none(),
                "delete",
                vec![],
            )
            .await;
        let_assert!(Err(Error::UnknownMethod(_)) = result);
    }

    #[tokio::test]
    async fn cancelled_argument_fails_before_sending() {
        let (handle, signal) = CancelSignal::pair();
        handle.cancel();
        let client = Recording::replying(201, "");

        let user = User {
            id: 1,
            name: "bob".to_string(),
        };
        let result = invoker()
            .invoke(
                &client,
                Some(&base()),
                &CancelSignal::none(),
                "create",
                vec![Arg::json(&user).expect("json"), Arg::from(signal)],
            )
            .await;
        let_assert!(Err(Error::Cancelled) = result);
        check!(client.seen().is_empty());
    }

    #[tokio::test]
    async fn client_signal_cancels_pending_send() {
        let (handle, client_signal) = CancelSignal::pair();
        let (_call_handle, call_signal) = CancelSignal::pair();
        let user = User {
            id: 1,
            name: "bob".to_string(),
        };
        let invoker = invoker();
        let base = base();
        let call = invoker.invoke(
            &Never,
            Some(&base),
            &client_signal,
            "create",
            vec![Arg::json(&user).expect("json"), Arg::from(call_signal)],
        );

        let (result, ()) = tokio::join!(call, async {
            tokio::task::yield_now().await;
            handle.cancel();
        });
        let_assert!(Err(Error::Cancelled) = result);
    }

    #[tokio::test]
    async fn api_error_carries_resolved_uri() {
        let client = Recording::replying(404, "no such user");
        let result = invoker()
            .invoke(
                &client,
                Some(&base()),
                &CancelSignal::none(),
                "get",
                vec![Arg::text("42")],
            )
            .await;
        let_assert!(Err(Error::Api(error)) = result);
        check!(error.status() == 404);
        check!(error.uri() == "https://api.example.com/v2/users/42");
        check!(error.content() == Some("no such user"));
    }
}
