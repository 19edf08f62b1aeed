//! Compiling a method descriptor and its arguments into a [`Request`].
//!
//! Arguments are processed in positional order. Path values are substituted
//! into the template, the body argument becomes the content, header arguments
//! override static headers, and everything else becomes query values or, on
//! multipart methods, form parts.

use std::sync::Arc;

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use serde_json::Value;
use tracing::debug;
use url::form_urlencoded;

use crate::arg::JsonArg;
use crate::multipart::{FormPart, file_name_of};
use crate::path_template::substitute;
use crate::{
    Arg, BodySerialization, CollectionFormat, Content, Error, FieldRule, FormValueMultimap,
    MethodDescriptor, Multipart, ParamDescriptor, ParameterRole, Request, Result, Settings,
};

/// Characters escaped in a path value; `/` and `:` included so a value stays
/// one relative segment.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b':')
    .add(b'\\')
    .add(b'%');

/// Builds requests from descriptors and positional arguments.
#[derive(Debug, Clone, Default)]
pub struct RequestFactory {
    settings: Arc<Settings>,
}

impl RequestFactory {
    /// Create a factory using `settings`.
    #[must_use]
    pub const fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Build the request for `descriptor` called with `args`.
    ///
    /// The result carries a relative target `base_path + template`; a base
    /// path of `/` contributes nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::ArityMismatch`] if `args` does not match the declared parameters,
    /// - [`Error::InvalidArgument`] if an argument cannot fill its role,
    /// - [`Error::Io`] if a file attachment cannot be opened,
    /// - [`Error::InvalidRequest`] for invalid header names or values.
    pub fn build(
        &self,
        descriptor: &MethodDescriptor,
        base_path: &str,
        args: Vec<Arg>,
    ) -> Result<Request> {
        if args.len() != descriptor.arity() {
            return Err(Error::ArityMismatch {
                method: descriptor.name().to_owned(),
                arity: args.len(),
            });
        }

        let mut path = descriptor.path().as_str().to_owned();
        let mut content = None;
        let mut headers = descriptor.headers().to_vec();
        let mut query = Vec::new();
        let mut multipart = descriptor.is_multipart().then(Multipart::new);

        for (param, arg) in descriptor.params().iter().zip(args) {
            match param.role() {
                ParameterRole::Path(placeholder) => {
                    let value = self.url_text(param, &arg)?;
                    if value == "." || value == ".." {
                        return Err(Error::invalid_argument(format!(
                            "path parameter `{}` cannot be the dot segment `{value}`",
                            param.name()
                        )));
                    }
                    let encoded = utf8_percent_encode(&value, PATH_SEGMENT_ENCODE_SET).to_string();
                    path = substitute(&path, placeholder, &encoded);
                }
                ParameterRole::Body(serialization) => {
                    content = self.body_content(param, arg, *serialization)?;
                }
                ParameterRole::Header(name) => {
                    let value = match arg.to_value() {
                        Some(Value::Null) => None,
                        Some(value) => Some(crate::formatter::plain_text(&value)),
                        None => return Err(unsupported(param, &arg, "a header value")),
                    };
                    queue_header(&mut headers, name, value);
                }
                ParameterRole::Cancellation => {}
                _ if arg.is_null() => {}
                ParameterRole::Query { key, format } => match multipart.as_mut() {
                    Some(form) => self.push_parts(form, key, param, arg)?,
                    None => self.push_query(&mut query, key, *format, param, arg)?,
                },
                ParameterRole::Attachment(field) => {
                    let form = multipart.as_mut().ok_or_else(|| {
                        Error::invalid_descriptor(format!(
                            "{}: attachment `{}` requires a multipart method",
                            descriptor.name(),
                            param.name()
                        ))
                    })?;
                    self.push_parts(form, field, param, arg)?;
                }
            }
        }

        if let Some(form) = multipart {
            content = Some(Content::multipart(form)?);
        }

        let base_path = base_path.trim_end_matches('/');
        let target = merge_query(&format!("{base_path}{path}"), &query);

        let mut builder = Request::builder(descriptor.method(), target)
            .extension(descriptor.path().clone())
            .extension(descriptor.metadata());
        if let Some(content) = content {
            builder = builder.content(content);
        }
        let mut request = builder.build()?;
        for (name, value) in &headers {
            request.set_header(name, value.as_deref())?;
        }

        debug!(
            method = %descriptor.method(),
            name = descriptor.name(),
            target = request.target(),
            "built request"
        );
        Ok(request)
    }

    /// Render an argument for a path segment or a query value.
    fn url_text(&self, param: &ParamDescriptor, arg: &Arg) -> Result<String> {
        let value = arg
            .to_value()
            .ok_or_else(|| unsupported(param, arg, "a URL value"))?;
        Ok(self.settings.url_parameter_formatter().format(&value))
    }

    fn body_content(
        &self,
        param: &ParamDescriptor,
        arg: Arg,
        serialization: BodySerialization,
    ) -> Result<Option<Content>> {
        let content = match arg {
            Arg::Null => return Ok(None),
            Arg::Content(content) => content,
            Arg::Text(text) => Content::text(text),
            Arg::Stream(stream) => Content::stream(stream),
            Arg::Bytes(bytes) => Content::bytes(bytes),
            Arg::Json(json) => self.structured_body(json, serialization)?,
            Arg::Seq(_) => {
                let value = arg
                    .to_value()
                    .ok_or_else(|| unsupported(param, &arg, "a body"))?;
                Content::json(value, Arc::clone(self.settings.serializer()))
            }
            other => return Err(unsupported(param, &other, "a body")),
        };
        Ok(Some(content))
    }

    fn structured_body(&self, json: JsonArg, serialization: BodySerialization) -> Result<Content> {
        match serialization {
            BodySerialization::Json => Ok(Content::json(
                json.into_value(),
                Arc::clone(self.settings.serializer()),
            )),
            BodySerialization::UrlEncoded => {
                let form = FormValueMultimap::from_value(
                    json.value(),
                    json.rules(),
                    self.settings.form_formatter(),
                )?;
                Content::form_url_encoded(form.iter())
            }
        }
    }

    fn push_query(
        &self,
        query: &mut Vec<(String, String)>,
        key: &str,
        format: CollectionFormat,
        param: &ParamDescriptor,
        arg: Arg,
    ) -> Result<()> {
        let value = arg
            .to_value()
            .ok_or_else(|| unsupported(param, &arg, "a query value"))?;
        let formatter = self.settings.url_parameter_formatter();

        match (value, format.separator()) {
            (Value::Array(items), _) if format == CollectionFormat::Multi => {
                for item in items.iter().filter(|item| !item.is_null()) {
                    query.push((key.to_owned(), formatter.format(item)));
                }
            }
            (Value::Array(items), Some(separator)) => {
                let joined = items
                    .iter()
                    .map(|item| formatter.format(item))
                    .collect::<Vec<_>>()
                    .join(separator);
                query.push((key.to_owned(), joined));
            }
            (value @ Value::Object(_), _) => {
                let rules: &[FieldRule] = match &arg {
                    Arg::Json(json) => json.rules(),
                    _ => &[],
                };
                let flattened = FormValueMultimap::from_value(&value, rules, formatter)?;
                query.extend(flattened.into_pairs());
            }
            (value, _) => query.push((key.to_owned(), formatter.format(&value))),
        }
        Ok(())
    }

    fn push_parts(
        &self,
        form: &mut Multipart,
        field: &str,
        param: &ParamDescriptor,
        arg: Arg,
    ) -> Result<()> {
        match arg {
            Arg::Seq(seq) => {
                for item in seq.into_items() {
                    self.push_part(form, field, param, item)?;
                }
                Ok(())
            }
            other => self.push_part(form, field, param, other),
        }
    }

    fn push_part(
        &self,
        form: &mut Multipart,
        field: &str,
        param: &ParamDescriptor,
        arg: Arg,
    ) -> Result<()> {
        let part = match arg {
            Arg::Part(item) => item.into_form_part(field)?,
            Arg::Stream(stream) => {
                FormPart::new(field, Some(field.to_owned()), Content::stream(stream))?
            }
            Arg::Bytes(bytes) => {
                FormPart::new(field, Some(field.to_owned()), Content::bytes(bytes))?
            }
            Arg::File(path) => {
                let file_name = file_name_of(&path)?;
                FormPart::new(field, Some(file_name), Content::file(&path)?)?
            }
            Arg::Text(text) => FormPart::new(field, None, Content::text(text))?,
            Arg::Json(json) => FormPart::new(
                field,
                None,
                Content::json(json.into_value(), Arc::clone(self.settings.serializer())),
            )?,
            other => {
                return Err(Error::invalid_argument(format!(
                    "unexpected parameter type in a multipart request: parameter `{}` is {}, \
                     expected text, bytes, a stream, a file, a multipart item, a serializable \
                     value or a sequence of these",
                    param.name(),
                    describe(&other)
                )));
            }
        };
        form.push(part);
        Ok(())
    }
}

/// Replace a queued header of the same name, or append it.
fn queue_header(headers: &mut Vec<(String, Option<String>)>, name: &str, value: Option<String>) {
    match headers
        .iter_mut()
        .find(|(queued, _)| queued.eq_ignore_ascii_case(name))
    {
        Some(entry) => entry.1 = value,
        None => headers.push((name.to_owned(), value)),
    }
}

/// Append `extra` to the literal query of `target`.
fn merge_query(target: &str, extra: &[(String, String)]) -> String {
    if extra.is_empty() {
        return target.to_owned();
    }
    let (path, literal) = target.split_once('?').unwrap_or((target, ""));

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.extend_pairs(form_urlencoded::parse(literal.as_bytes()));
    serializer.extend_pairs(extra.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    let query = serializer.finish();

    if query.is_empty() {
        path.to_owned()
    } else {
        format!("{path}?{query}")
    }
}

fn describe(arg: &Arg) -> String {
    match arg {
        Arg::Null => "null".to_owned(),
        other => format!("of type {}", other.arg_type()),
    }
}

fn unsupported(param: &ParamDescriptor, arg: &Arg, usage: &str) -> Error {
    Error::invalid_argument(format!(
        "parameter `{}` ({}) is {} and cannot be used as {usage}",
        param.name(),
        param.role(),
        describe(arg)
    ))
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use http::header;
    use serde::Serialize;

    use super::*;
    use crate::{ArgType, Body, CancelSignal, FormRules, Method};

    fn factory() -> RequestFactory {
        RequestFactory::default()
    }

    fn descriptor(builder: crate::MethodDescriptorBuilder) -> MethodDescriptor {
        builder.build().expect("valid descriptor")
    }

    #[derive(Serialize)]
    struct Search {
        #[serde(rename = "q")]
        query: String,
        tags: Vec<String>,
        page: Option<u32>,
    }

    impl FormRules for Search {
        fn field_rules() -> &'static [FieldRule] {
            const RULES: &[FieldRule] = &[FieldRule::new("tags").format(CollectionFormat::Pipes)];
            RULES
        }
    }

    #[test]
    fn path_values_are_encoded_as_one_segment() {
        let d = descriptor(
            MethodDescriptor::builder("get", Method::Get, "/users/{Id}/files/{name}")
                .path("id", ArgType::json::<u32>())
                .path("name", ArgType::Text),
        );
        let request = factory()
            .build(
                &d,
                "",
                vec![Arg::json(&42_u32).expect("json"), Arg::text("a b/c?d")],
            )
            .expect("request");
        check!(request.target() == "/users/42/files/a%20b%2Fc%3Fd");
    }

    #[test]
    fn path_values_cannot_form_a_scheme() {
        let d = descriptor(
            MethodDescriptor::builder("fetch", Method::Get, "/{target}")
                .path("target", ArgType::Text),
        );
        let mut request = factory()
            .build(&d, "", vec![Arg::text("http:evil.example")])
            .expect("request");
        check!(request.target() == "/http%3Aevil.example");

        let base = url::Url::parse("https://api.example.com/").expect("base");
        request.resolve(&base).expect("resolve");
        let_assert!(Some(url) = request.url());
        check!(url.host_str() == Some("api.example.com"));
        check!(url.path() == "/http%3Aevil.example");
    }

    #[test]
    fn dot_segments_are_rejected() {
        let d = descriptor(
            MethodDescriptor::builder("profile", Method::Get, "/users/{id}/profile")
                .path("id", ArgType::Text),
        );
        for value in [".", ".."] {
            let result = factory().build(&d, "", vec![Arg::text(value)]);
            let_assert!(Err(Error::InvalidArgument(message)) = result);
            check!(message.contains("`id`"));
        }

        let request = factory()
            .build(&d, "", vec![Arg::text("...")])
            .expect("request");
        check!(request.target() == "/users/.../profile");
    }

    #[test]
    fn base_path_is_prefixed() {
        let d = descriptor(MethodDescriptor::builder("list", Method::Get, "/users"));
        check!(factory().build(&d, "/api/", vec![]).expect("request").target() == "/api/users");
        check!(factory().build(&d, "/", vec![]).expect("request").target() == "/users");
    }

    #[test]
    fn query_merges_with_template_query() {
        let d = descriptor(
            MethodDescriptor::builder("search", Method::Get, "/search?v=2")
                .query("q", ArgType::Text)
                .query("page", ArgType::json::<u32>()),
        );
        let request = factory()
            .build(
                &d,
                "",
                vec![Arg::text("rust lang"), Arg::json(&3_u32).expect("json")],
            )
            .expect("request");
        check!(request.target() == "/search?v=2&q=rust+lang&page=3");
    }

    #[test]
    fn null_query_is_skipped() {
        let d = descriptor(
            MethodDescriptor::builder("search", Method::Get, "/search")
                .query("q", ArgType::Text),
        );
        let request = factory().build(&d, "", vec![Arg::Null]).expect("request");
        check!(request.target() == "/search");
    }

    #[test]
    fn query_collection_formats() {
        let d = descriptor(
            MethodDescriptor::builder("filter", Method::Get, "/items")
                .query_as("ids", "id", ArgType::seq(ArgType::Text), CollectionFormat::Multi)
                .query_as("tags", "tags", ArgType::seq(ArgType::Text), CollectionFormat::Csv)
                .query_as("words", "w", ArgType::seq(ArgType::Text), CollectionFormat::Ssv)
                .query_as("all", "all", ArgType::seq(ArgType::Text), CollectionFormat::Default),
        );
        let request = factory()
            .build(
                &d,
                "",
                vec![
                    Arg::texts(["1", "2"]),
                    Arg::texts(["a", "b"]),
                    Arg::texts(["x", "y"]),
                    Arg::texts(["z"]),
                ],
            )
            .expect("request");
        check!(
            request.target()
                == "/items?id=1&id=2&tags=a%2Cb&w=x+y&all=%5B%22z%22%5D"
        );
    }

    #[test]
    fn structured_query_is_flattened() {
        let d = descriptor(
            MethodDescriptor::builder("search", Method::Get, "/search")
                .query("params", ArgType::json::<Search>()),
        );
        let search = Search {
            query: "grapnel".to_string(),
            tags: vec!["http".to_string(), "rest".to_string()],
            page: None,
        };
        let request = factory()
            .build(&d, "", vec![Arg::form(&search).expect("form")])
            .expect("request");
        check!(request.target() == "/search?q=grapnel&tags=http%7Crest");
    }

    #[test]
    fn static_headers_are_overridden_by_arguments() {
        let d = descriptor(
            MethodDescriptor::builder("get", Method::Get, "/")
                .header("Accept", "text/plain")
                .header("X-Api-Version", "1")
                .header_param("accept", "accept", ArgType::Text)
                .header_param("version", "X-Api-Version", ArgType::Text),
        );
        let request = factory()
            .build(&d, "", vec![Arg::text("application/json"), Arg::Null])
            .expect("request");
        check!(request.header("Accept") == Some("application/json"));
        check!(request.headers().get_all(header::ACCEPT).iter().count() == 1);
        check!(request.header("X-Api-Version").is_none());
    }

    #[test]
    fn json_body_is_deferred() {
        #[derive(Serialize)]
        struct User {
            name: &'static str,
        }

        let d = descriptor(
            MethodDescriptor::builder("create", Method::Post, "/users")
                .body("user", ArgType::json::<User>(), BodySerialization::Json),
        );
        let request = factory()
            .build(&d, "", vec![Arg::json(&User { name: "Ann" }).expect("json")])
            .expect("request");
        let_assert!(Some(content) = request.content());
        check!(content.content_type() == Some("application/json; charset=utf-8"));
        check!(matches!(content.body(), Body::Json { .. }));
    }

    #[tokio::test]
    async fn url_encoded_body() {
        let d = descriptor(
            MethodDescriptor::builder("search", Method::Post, "/search")
                .body("form", ArgType::json::<Search>(), BodySerialization::UrlEncoded),
        );
        let search = Search {
            query: "a b".to_string(),
            tags: vec!["x".to_string(), "y".to_string()],
            page: Some(2),
        };
        let mut request = factory()
            .build(&d, "", vec![Arg::form(&search).expect("form")])
            .expect("request");
        let_assert!(Some(content) = request.take_content());
        check!(content.content_type() == Some("application/x-www-form-urlencoded"));
        let body = content.read_to_string().await.expect("body");
        check!(body == "q=a+b&tags=x%7Cy&page=2");
    }

    #[tokio::test]
    async fn text_and_raw_bodies() {
        let d = descriptor(
            MethodDescriptor::builder("post", Method::Post, "/raw")
                .body("body", ArgType::Any, BodySerialization::Json),
        );

        let mut request = factory()
            .build(&d, "", vec![Arg::text("hello")])
            .expect("request");
        let_assert!(Some(content) = request.take_content());
        check!(content.content_type() == Some("text/plain; charset=utf-8"));
        check!(content.read_to_string().await.expect("body") == "hello");

        let mut request = factory()
            .build(&d, "", vec![Arg::bytes(vec![1_u8, 2])])
            .expect("request");
        let_assert!(Some(content) = request.take_content());
        check!(content.content_type().is_none());

        let request = factory().build(&d, "", vec![Arg::Null]).expect("request");
        check!(request.content().is_none());
    }

    #[test]
    fn content_header_targets_content() {
        let d = descriptor(
            MethodDescriptor::builder("post", Method::Post, "/raw")
                .header("Content-Type", "application/vnd.custom+json")
                .body("body", ArgType::Text, BodySerialization::Json),
        );
        let request = factory()
            .build(&d, "", vec![Arg::text("{}")])
            .expect("request");
        let_assert!(Some(content) = request.content());
        check!(content.content_type() == Some("application/vnd.custom+json"));
        check!(request.headers().get(header::CONTENT_TYPE).is_none());
    }

    #[test]
    fn cancellation_is_not_serialized() {
        let d = descriptor(
            MethodDescriptor::builder("get", Method::Get, "/users")
                .cancellation("cancel"),
        );
        let request = factory()
            .build(&d, "", vec![Arg::from(CancelSignal::none())])
            .expect("request");
        check!(request.target() == "/users");
        check!(request.headers().is_empty());
    }

    #[test]
    fn arity_is_checked() {
        let d = descriptor(
            MethodDescriptor::builder("get", Method::Get, "/users/{id}")
                .path("id", ArgType::Text),
        );
        let result = factory().build(&d, "", vec![]);
        let_assert!(Err(Error::ArityMismatch { arity: 0, .. }) = result);
    }

    #[test]
    fn unsupported_query_argument() {
        let d = descriptor(
            MethodDescriptor::builder("get", Method::Get, "/users")
                .query("data", ArgType::Bytes),
        );
        let result = factory().build(&d, "", vec![Arg::bytes(vec![1_u8])]);
        let_assert!(Err(Error::InvalidArgument(message)) = result);
        check!(message.contains("`data`"));
    }

    #[test]
    fn multipart_rejects_content_at_runtime() {
        let d = descriptor(
            MethodDescriptor::builder("upload", Method::Post, "/upload")
                .multipart()
                .attachment("data", "data", ArgType::Any),
        );
        let result = factory().build(&d, "", vec![Arg::Content(Content::text("x"))]);
        let_assert!(Err(Error::InvalidArgument(message)) = result);
        check!(message.contains("multipart"));
        check!(message.contains("`data`"));
    }

    #[test]
    fn request_carries_template_and_metadata() {
        let d = descriptor(
            MethodDescriptor::builder("get_user", Method::Get, "/users/{id}")
                .path("id", ArgType::Text),
        );
        let request = factory()
            .build(&d, "", vec![Arg::text("7")])
            .expect("request");
        let_assert!(Some(template) = request.extensions().get::<crate::PathTemplate>());
        check!(template.as_str() == "/users/{id}");
        let_assert!(Some(meta) = request.extensions().get::<crate::ParameterMetadata>());
        check!(meta.method_name() == "get_user");
    }
}
