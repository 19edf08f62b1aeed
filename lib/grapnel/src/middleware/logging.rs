//! Per-call `tracing` spans and events.
//!
//! Requests built from a method descriptor carry its name and path template;
//! both are recorded on the span so calls group by operation rather than by
//! concrete URI.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use grapnel_core::{ParameterMetadata, PathTemplate};
use tower::{Layer, Service};
use tracing::{Instrument, Span, debug, field, info, info_span, warn};

use crate::{Error, Request, Response, Result};

/// How much [`LoggingLayer`] reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// `debug` events with request and response headers.
    Debug,
    /// `info` events with the status and timing only.
    #[default]
    Info,
}

/// Wraps a transport so every call runs in a `grapnel.call` span.
///
/// Non-success statuses and transport errors are reported at `warn` whatever
/// the level.
///
/// ```no_run
/// use grapnel::HyperClient;
/// use grapnel::middleware::LoggingLayer;
///
/// let client = HyperClient::builder().layer(LoggingLayer::debug()).build();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

impl LoggingLayer {
    /// Info-level reporting.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Debug-level reporting.
    #[must_use]
    pub const fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// The configured level.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Service produced by [`LoggingLayer`].
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

fn call_span(request: &Request) -> Span {
    let operation = request
        .extensions()
        .get::<ParameterMetadata>()
        .map(ParameterMetadata::method_name);
    let template = request
        .extensions()
        .get::<PathTemplate>()
        .map(PathTemplate::as_str);

    info_span!(
        "grapnel.call",
        method = %request.method(),
        uri = %request.uri(),
        operation,
        template,
        status = field::Empty,
        elapsed_ms = field::Empty,
    )
}

fn report(level: LogLevel, result: &Result<Response>, elapsed_ms: u64) {
    let span = Span::current();
    span.record("elapsed_ms", elapsed_ms);

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            warn!(error = %err, elapsed_ms, "call failed");
            return;
        }
    };
    span.record("status", response.status());

    if !response.is_success() {
        warn!(status = response.status(), elapsed_ms, "unsuccessful status");
        return;
    }
    match level {
        LogLevel::Debug => debug!(
            status = response.status(),
            headers = ?response.headers(),
            content_headers = ?response.content().map(grapnel_core::Content::headers),
            "response"
        ),
        LogLevel::Info => info!(status = response.status(), elapsed_ms, "response"),
    }
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = Error> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let span = call_span(&request);
        let level = self.level;

        if level == LogLevel::Debug {
            span.in_scope(|| {
                debug!(
                    headers = ?request.headers(),
                    content_headers = ?request.content().map(grapnel_core::Content::headers),
                    "request"
                );
            });
        }

        let future = self.inner.call(request);
        Box::pin(
            async move {
                let start = Instant::now();
                let result = future.await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                report(level, &result, elapsed_ms);
                result
            }
            .instrument(span),
        )
    }
}
