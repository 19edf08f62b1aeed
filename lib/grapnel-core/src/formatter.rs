//! Rendering argument values as URL and form text.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{JsonSerializer, Serializer};

/// Renders a single value as text for a path segment, query value or form field.
pub trait UrlParameterFormatter: fmt::Debug + Send + Sync {
    /// Format `value`.
    fn format(&self, value: &Value) -> String;
}

/// Strings as is, `null` as empty, scalars via their JSON text, and
/// arrays/objects as compact JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUrlParameterFormatter;

impl UrlParameterFormatter for DefaultUrlParameterFormatter {
    fn format(&self, value: &Value) -> String {
        plain_text(value)
    }
}

/// Natural string form of a value.
pub(crate) fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Formatters and serializer used when building requests and decoding responses.
#[derive(Debug, Clone)]
pub struct Settings {
    url_parameter_formatter: Arc<dyn UrlParameterFormatter>,
    form_formatter: Arc<dyn UrlParameterFormatter>,
    serializer: Arc<dyn Serializer>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            url_parameter_formatter: Arc::new(DefaultUrlParameterFormatter),
            form_formatter: Arc::new(DefaultUrlParameterFormatter),
            serializer: Arc::new(JsonSerializer),
        }
    }
}

impl Settings {
    /// Set the formatter for path and query values.
    #[must_use]
    pub fn with_url_parameter_formatter(
        mut self,
        formatter: impl UrlParameterFormatter + 'static,
    ) -> Self {
        self.url_parameter_formatter = Arc::new(formatter);
        self
    }

    /// Set the formatter for URL-encoded body fields.
    #[must_use]
    pub fn with_form_formatter(mut self, formatter: impl UrlParameterFormatter + 'static) -> Self {
        self.form_formatter = Arc::new(formatter);
        self
    }

    /// Set the body serializer.
    #[must_use]
    pub fn with_serializer(mut self, serializer: impl Serializer + 'static) -> Self {
        self.serializer = Arc::new(serializer);
        self
    }

    /// Formatter for path and query values.
    #[must_use]
    pub fn url_parameter_formatter(&self) -> &dyn UrlParameterFormatter {
        self.url_parameter_formatter.as_ref()
    }

    /// Formatter for URL-encoded body fields.
    #[must_use]
    pub fn form_formatter(&self) -> &dyn UrlParameterFormatter {
        self.form_formatter.as_ref()
    }

    /// Body serializer.
    #[must_use]
    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }
}
