//! Multipart request construction, end to end through the invoker.

#![allow(clippy::expect_used, clippy::indexing_slicing, missing_docs)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use grapnel_core::{
    Arg, ArgType, Body, CancelSignal, CollectionFormat, Content, Error, HttpClient, JSON_MEDIA_TYPE,
    Method, MethodDescriptor, MethodDescriptorBuilder, MultipartItem, Outcome, Request, Response,
    Result, ReturnShape, ServiceDefinition, Settings, TEXT_MEDIA_TYPE, chunks,
};
use grapnel_core::{Invoker, MULTIPART_BOUNDARY};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use url::Url;

const PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n";

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct RecordingClient {
    requests: Mutex<Vec<Request>>,
}

impl RecordingClient {
    fn take(&self) -> Request {
        self.requests
            .lock()
            .expect("lock")
            .pop()
            .expect("a request was sent")
    }
}

impl HttpClient for RecordingClient {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.requests.lock().expect("lock").push(request);
        Ok(Response::new(200, HeaderMap::new(), None))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelObject {
    property1: String,
    property2: Option<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct AnotherModel {
    foos: Vec<String>,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
enum AnEnum {
    Val1,
    Val2,
}

fn upload(name: &str) -> MethodDescriptorBuilder {
    MethodDescriptor::builder(name, Method::Post, "/")
        .multipart()
        .returns(ReturnShape::Response)
}

fn uploads() -> ServiceDefinition {
    let methods = [
        upload("upload_stream").query("stream", ArgType::Stream),
        upload("upload_stream_part").query("stream", ArgType::Part),
        upload("upload_bytes").query("bytes", ArgType::Bytes),
        upload("upload_bytes_part").query_as(
            "bytes",
            "ByteArrayPartParamAlias",
            ArgType::Part,
            CollectionFormat::Default,
        ),
        upload("upload_string").query_as(
            "some_string",
            "SomeStringAlias",
            ArgType::Text,
            CollectionFormat::Default,
        ),
        upload("upload_file_info")
            .query("fileInfos", ArgType::seq(ArgType::File))
            .query("anotherFile", ArgType::File),
        upload("upload_file_info_part")
            .query("fileInfos", ArgType::seq(ArgType::Part))
            .attachment("another_file", "anotherFile", ArgType::Part),
        upload("upload_json_object").query("theObject", ArgType::json::<ModelObject>()),
        upload("upload_json_objects")
            .query("theObjects", ArgType::seq(ArgType::json::<ModelObject>())),
        upload("upload_mixed_objects")
            .query("theObjects", ArgType::seq(ArgType::json::<ModelObject>()))
            .query("anotherModel", ArgType::json::<AnotherModel>())
            .query("aFile", ArgType::File)
            .query("anEnum", ArgType::json::<AnEnum>())
            .query("aString", ArgType::Text)
            .query("anInt", ArgType::json::<i32>()),
        upload("upload_with_cancellation")
            .query("aString", ArgType::Text)
            .cancellation("cancel"),
    ];

    methods
        .into_iter()
        .fold(ServiceDefinition::new("uploads"), |service, builder| {
            service.method(builder.build().expect("valid descriptor"))
        })
}

fn base() -> Url {
    Url::parse("https://api/").expect("base address")
}

/// A file in the temp directory, removed on drop.
struct TempFile(PathBuf);

impl TempFile {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("grapnel-{}-{name}", std::process::id()));
        std::fs::write(&path, PDF).expect("write temp file");
        Self(path)
    }

    fn name(&self) -> String {
        self.0
            .file_name()
            .expect("file name")
            .to_string_lossy()
            .into_owned()
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// A part as seen on the wire: (name, filename, content type, body).
#[derive(Debug)]
struct SentPart {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    body: Bytes,
}

impl SentPart {
    fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("json part")
    }

    fn text(&self) -> &str {
        std::str::from_utf8(&self.body).expect("utf-8 part")
    }
}

async fn call(client: &RecordingClient, method: &str, args: Vec<Arg>) -> Result<Outcome> {
    Invoker::new(Arc::new(uploads()), Arc::new(Settings::default()))
        .invoke(client, Some(&base()), &CancelSignal::none(), method, args)
        .await
}

async fn sent_parts(client: &RecordingClient) -> Vec<SentPart> {
    let (method, url, _, content, _) = client.take().into_parts().expect("resolved request");
    assert_eq!(method, Method::Post);
    assert_eq!(url.as_str(), "https://api/");

    let content = content.expect("multipart content");
    assert_eq!(
        content.content_type(),
        Some(format!("multipart/form-data; boundary=\"{MULTIPART_BOUNDARY}\"").as_str())
    );

    let form = match content.into_parts() {
        (_, Body::Multipart(form)) => form,
        (_, other) => panic!("expected a multipart body, got {other:?}"),
    };

    let mut sent = Vec::new();
    for part in form.into_parts() {
        let name = part.name().to_owned();
        let file_name = part.file_name().map(str::to_owned);
        let content = part.into_content();
        let content_type = content.content_type().map(str::to_owned);
        let body = content.read_to_bytes().await.expect("part body");
        sent.push(SentPart {
            name,
            file_name,
            content_type,
            body,
        });
    }
    sent
}

// ============================================================================
// Uploads
// ============================================================================

#[tokio::test]
async fn multipart_upload_should_work_with_stream() {
    let client = RecordingClient::default();
    let stream = chunks([Bytes::from_static(&PDF[..10]), Bytes::from_static(&PDF[10..])]);
    call(&client, "upload_stream", vec![Arg::stream(stream)])
        .await
        .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "stream");
    assert_eq!(parts[0].file_name.as_deref(), Some("stream"));
    assert_eq!(parts[0].content_type, None);
    assert_eq!(parts[0].body.as_ref(), PDF);
}

#[tokio::test]
async fn multipart_upload_should_work_with_byte_array() {
    let client = RecordingClient::default();
    call(&client, "upload_bytes", vec![Arg::bytes(PDF)])
        .await
        .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "bytes");
    assert_eq!(parts[0].file_name.as_deref(), Some("bytes"));
    assert_eq!(parts[0].content_type, None);
    assert_eq!(parts[0].body.as_ref(), PDF);
}

#[tokio::test]
async fn multipart_upload_should_work_with_file_info() {
    let first = TempFile::new("first.pdf");
    let second = TempFile::new("second.pdf");
    let another = TempFile::new("another.pdf");

    let client = RecordingClient::default();
    call(
        &client,
        "upload_file_info",
        vec![
            Arg::files([first.0.clone(), second.0.clone()]),
            Arg::file(&another.0),
        ],
    )
    .await
    .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 3);
    for (part, (name, file)) in parts
        .iter()
        .zip([("fileInfos", &first), ("fileInfos", &second), ("anotherFile", &another)])
    {
        assert_eq!(part.name, name);
        assert_eq!(part.file_name, Some(file.name()));
        assert_eq!(part.content_type, None);
        assert_eq!(part.body.as_ref(), PDF);
    }
}

#[tokio::test]
async fn multipart_upload_should_work_with_string() {
    let text = "This is random text";
    let client = RecordingClient::default();
    call(&client, "upload_string", vec![Arg::text(text)])
        .await
        .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "SomeStringAlias");
    assert_eq!(parts[0].file_name, None);
    assert_eq!(parts[0].content_type.as_deref(), Some(TEXT_MEDIA_TYPE));
    assert_eq!(parts[0].text(), text);
}

#[tokio::test]
async fn multipart_upload_should_work_with_stream_part() {
    let item = MultipartItem::stream(chunks([Bytes::from_static(PDF)]), "test-streampart.pdf")
        .expect("item")
        .with_content_type("application/pdf")
        .expect("content type");

    let client = RecordingClient::default();
    call(&client, "upload_stream_part", vec![Arg::from(item)])
        .await
        .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "stream");
    assert_eq!(parts[0].file_name.as_deref(), Some("test-streampart.pdf"));
    assert_eq!(parts[0].content_type.as_deref(), Some("application/pdf"));
    assert_eq!(parts[0].body.as_ref(), PDF);
}

#[tokio::test]
async fn multipart_upload_should_work_with_byte_array_part() {
    let item = MultipartItem::bytes(PDF, "test-bytearraypart.pdf")
        .expect("item")
        .with_content_type("application/pdf")
        .expect("content type");

    let client = RecordingClient::default();
    call(&client, "upload_bytes_part", vec![Arg::from(item)])
        .await
        .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "ByteArrayPartParamAlias");
    assert_eq!(parts[0].file_name.as_deref(), Some("test-bytearraypart.pdf"));
    assert_eq!(parts[0].content_type.as_deref(), Some("application/pdf"));
    assert_eq!(parts[0].body.as_ref(), PDF);
}

#[tokio::test]
async fn multipart_upload_should_work_with_file_info_part() {
    let file = TempFile::new("fileinfopart.pdf");
    let items = [
        MultipartItem::file(&file.0)
            .and_then(|item| item.with_file_name("test-fileinfopart.pdf"))
            .and_then(|item| item.with_content_type("application/pdf")),
        MultipartItem::file(&file.0).and_then(|item| item.with_file_name("test-fileinfopart2.pdf")),
    ]
    .into_iter()
    .collect::<Result<Vec<_>>>()
    .expect("items");
    let another = MultipartItem::file(&file.0)
        .and_then(|item| item.with_file_name("additionalfile.pdf"))
        .and_then(|item| item.with_content_type("application/pdf"))
        .expect("item");

    let client = RecordingClient::default();
    call(
        &client,
        "upload_file_info_part",
        vec![Arg::parts(items), Arg::from(another)],
    )
    .await
    .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 3);

    assert_eq!(parts[0].name, "fileInfos");
    assert_eq!(parts[0].file_name.as_deref(), Some("test-fileinfopart.pdf"));
    assert_eq!(parts[0].content_type.as_deref(), Some("application/pdf"));

    assert_eq!(parts[1].name, "fileInfos");
    assert_eq!(parts[1].file_name.as_deref(), Some("test-fileinfopart2.pdf"));
    assert_eq!(parts[1].content_type, None);

    assert_eq!(parts[2].name, "anotherFile");
    assert_eq!(parts[2].file_name.as_deref(), Some("additionalfile.pdf"));
    assert_eq!(parts[2].content_type.as_deref(), Some("application/pdf"));

    assert!(parts.iter().all(|part| part.body.as_ref() == PDF));
}

#[tokio::test]
async fn multipart_item_field_name_overrides_parameter() {
    let item = MultipartItem::bytes(PDF, "renamed.pdf")
        .expect("item")
        .with_field_name("document");

    let client = RecordingClient::default();
    call(&client, "upload_stream_part", vec![Arg::from(item)])
        .await
        .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts[0].name, "document");
    assert_eq!(parts[0].file_name.as_deref(), Some("renamed.pdf"));
}

#[tokio::test]
async fn multipart_upload_should_work_with_an_object() {
    let model = ModelObject {
        property1: "M1.prop1".to_string(),
        property2: Some("M1.prop2".to_string()),
    };

    let client = RecordingClient::default();
    call(
        &client,
        "upload_json_object",
        vec![Arg::json(&model).expect("json")],
    )
    .await
    .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "theObject");
    assert_eq!(parts[0].file_name, None);
    assert_eq!(parts[0].content_type.as_deref(), Some(JSON_MEDIA_TYPE));
    assert_eq!(parts[0].json::<ModelObject>(), model);
}

#[tokio::test]
async fn multipart_upload_should_work_with_objects() {
    let models = [
        ModelObject {
            property1: "M1.prop1".to_string(),
            property2: Some("M1.prop2".to_string()),
        },
        ModelObject {
            property1: "M2.prop1".to_string(),
            property2: None,
        },
    ];

    let client = RecordingClient::default();
    call(
        &client,
        "upload_json_objects",
        vec![Arg::json_seq(&models).expect("json")],
    )
    .await
    .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 2);
    for (part, model) in parts.iter().zip(&models) {
        assert_eq!(part.name, "theObjects");
        assert_eq!(part.file_name, None);
        assert_eq!(part.content_type.as_deref(), Some(JSON_MEDIA_TYPE));
        assert_eq!(&part.json::<ModelObject>(), model);
    }
}

#[tokio::test]
async fn multipart_upload_should_work_with_mixed_types() {
    let file = TempFile::new("mixed.pdf");
    let models = [
        ModelObject {
            property1: "M1.prop1".to_string(),
            property2: Some("M1.prop2".to_string()),
        },
        ModelObject {
            property1: "M2.prop1".to_string(),
            property2: None,
        },
    ];
    let another = AnotherModel {
        foos: vec!["bar1".to_string(), "bar2".to_string()],
    };

    let client = RecordingClient::default();
    call(
        &client,
        "upload_mixed_objects",
        vec![
            Arg::json_seq(&models).expect("json"),
            Arg::json(&another).expect("json"),
            Arg::file(&file.0),
            Arg::json(&AnEnum::Val2).expect("json"),
            Arg::text("frob"),
            Arg::json(&42).expect("json"),
        ],
    )
    .await
    .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 7);

    let names = parts.iter().map(|part| part.name.as_str()).collect::<Vec<_>>();
    assert_eq!(
        names,
        ["theObjects", "theObjects", "anotherModel", "aFile", "anEnum", "aString", "anInt"]
    );

    assert_eq!(parts[0].json::<ModelObject>(), models[0]);
    assert_eq!(parts[1].json::<ModelObject>(), models[1]);
    assert_eq!(parts[2].json::<AnotherModel>(), another);

    assert_eq!(parts[3].file_name, Some(file.name()));
    assert_eq!(parts[3].content_type, None);
    assert_eq!(parts[3].body.as_ref(), PDF);

    assert_eq!(parts[4].json::<AnEnum>(), AnEnum::Val2);

    assert_eq!(parts[5].content_type.as_deref(), Some(TEXT_MEDIA_TYPE));
    assert_eq!(parts[5].text(), "frob");

    assert_eq!(parts[6].json::<i32>(), 42);

    for index in [0, 1, 2, 4, 6] {
        assert_eq!(parts[index].file_name, None);
        assert_eq!(parts[index].content_type.as_deref(), Some(JSON_MEDIA_TYPE));
    }
}

#[tokio::test]
async fn multipart_body_is_encoded_with_boundary() {
    let client = RecordingClient::default();
    call(&client, "upload_string", vec![Arg::text("hello")])
        .await
        .expect("call");

    let (_, _, _, content, _) = client.take().into_parts().expect("resolved");
    let body = content
        .expect("content")
        .read_to_string()
        .await
        .expect("body");
    assert_eq!(
        body,
        format!(
            "--{MULTIPART_BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"SomeStringAlias\"\r\n\
             Content-Type: {TEXT_MEDIA_TYPE}\r\n\
             \r\n\
             hello\r\n\
             --{MULTIPART_BOUNDARY}--\r\n"
        )
    );
}

#[tokio::test]
async fn multipart_call_with_cancellation_parameter() {
    let client = RecordingClient::default();
    let (_handle, signal) = CancelSignal::pair();
    call(
        &client,
        "upload_with_cancellation",
        vec![Arg::text("frob"), Arg::from(signal)],
    )
    .await
    .expect("call");

    let parts = sent_parts(&client).await;
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "aString");
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn multipart_item_requires_file_name() {
    let err = MultipartItem::bytes(Bytes::new(), "").expect_err("no file name");
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = MultipartItem::stream(chunks([]), " ").expect_err("blank file name");
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn file_item_requires_file() {
    let err = MultipartItem::file("").expect_err("no file");
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn pre_built_content_is_rejected_in_multipart() {
    let client = RecordingClient::default();
    let result = call(
        &client,
        "upload_stream",
        vec![Arg::from(Content::text("not a stream"))],
    )
    .await;

    let message = match result {
        Err(Error::InvalidArgument(message)) => message,
        other => panic!("expected an invalid argument error, got {other:?}"),
    };
    assert!(message.contains("unexpected parameter type in a multipart request"));
    assert!(message.contains("`stream`"));
    assert!(client.requests.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn missing_file_fails_before_sending() {
    let client = RecordingClient::default();
    let missing = std::env::temp_dir().join("grapnel-does-not-exist.pdf");
    let result = call(
        &client,
        "upload_mixed_objects",
        vec![
            Arg::json_seq::<ModelObject>(&[]).expect("json"),
            Arg::json(&AnotherModel { foos: vec![] }).expect("json"),
            Arg::file(missing),
            Arg::json(&AnEnum::Val1).expect("json"),
            Arg::text("frob"),
            Arg::json(&1).expect("json"),
        ],
    )
    .await;

    assert!(matches!(result, Err(Error::Io(_))), "{result:?}");
    assert!(client.requests.lock().expect("lock").is_empty());
}

#[test]
fn descriptor_rejects_unsupported_multipart_types() {
    let err = upload("bad")
        .query("content", ArgType::Content)
        .build()
        .expect_err("content is not a part");
    assert!(matches!(err, Error::InvalidDescriptor(_)));

    let err = upload("nested")
        .query("nested", ArgType::seq(ArgType::seq(ArgType::Text)))
        .build()
        .expect_err("nested sequences are not parts");
    assert!(matches!(err, Error::InvalidDescriptor(_)));

    let err = MethodDescriptor::builder("attach", Method::Post, "/")
        .attachment("file", "file", ArgType::File)
        .build()
        .expect_err("attachments need multipart");
    assert!(matches!(err, Error::InvalidDescriptor(_)));
}
