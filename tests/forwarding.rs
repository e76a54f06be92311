//! End-to-end forwarding through real sockets.

use std::time::Duration;

use request_proxy::http::body::{FormBody, FormValue, RequestBody};
use request_proxy::http::response::{OutputMode, SaveOutcome, STATUS_UNPARSABLE};
use request_proxy::http::uri::RequestUri;
use request_proxy::transport::ForwardTransport;
use request_proxy::{Pipeline, ProxyRequest};

mod common;

use common::{raw_response, request_body, request_header, start_mock_origin, temp_path};

#[tokio::test]
async fn test_prefix_rewrite_reaches_origin() {
    let origin = start_mock_origin(raw_response("200 OK", &["Content-Type: text/plain"], "hello")).await;

    let mut response = Pipeline::new()
        .relative_path("/manager", &origin.url("/api"), false)
        .forward(Some(ProxyRequest::get("http://front.local/manager/user/query?role=admin")))
        .await
        .unwrap();

    let raw = origin.last_request();
    assert!(raw.starts_with("GET /api/user/query?role=admin HTTP/1.1\r\n"), "{raw}");
    assert_eq!(request_header(&raw, "connection"), Some("close"));

    assert_eq!(response.code(), 200);
    assert_eq!(response.mode(), OutputMode::Streaming);
    assert_eq!(response.header_value("Content-Type"), Some("text/plain"));
    assert!(response.header_value("Content-Length").is_none());
    assert_eq!(&response.body().await[..], b"hello");
    assert_eq!(response.mode(), OutputMode::Buffered);
}

#[tokio::test]
async fn test_no_cache_round_trip() {
    let origin = start_mock_origin(raw_response(
        "200 OK",
        &["ETag: \"v1\"", "Cache-Control: max-age=600", "Expires: 0", "X-Kept: yes"],
        "fresh",
    ))
    .await;

    let mut request = ProxyRequest::get(&origin.url("/doc"));
    request.set_headers([("If-None-Match", "\"v1\""), ("If-Modified-Since", "yesterday")]);
    let response = Pipeline::new().no_cache().forward(Some(request)).await.unwrap();

    let raw = origin.last_request();
    assert!(request_header(&raw, "if-none-match").is_none());
    assert!(request_header(&raw, "if-modified-since").is_none());
    assert_eq!(request_header(&raw, "cache-control"), Some("no-cache"));

    assert!(response.header_value("ETag").is_none());
    assert!(response.header_value("Cache-Control").is_none());
    assert!(response.header_value("Expires").is_none());
    assert_eq!(response.header_value("X-Kept"), Some("yes"));
}

#[tokio::test]
async fn test_download_and_content_type_override() {
    let origin = start_mock_origin(raw_response("200 OK", &["Content-Type: text/csv"], "a,b\n")).await;

    let mut request = ProxyRequest::get(&origin.url("/reports/q3.csv"));
    request.set_header("User-Agent", "Mozilla/5.0 Firefox/120.0");
    let response = Pipeline::new().download(None).forward(Some(request)).await.unwrap();
    assert_eq!(response.header_value("Content-Type"), Some("application/octet-stream"));
    assert_eq!(
        response.header_value("Content-Disposition"),
        Some("attachment; filename*=\"utf8''q3.csv\"")
    );

    let response = Pipeline::new()
        .set_response_content_type("application/vnd.ms-excel")
        .forward(Some(ProxyRequest::get(&origin.url("/reports/q3.csv"))))
        .await
        .unwrap();
    let content_types: Vec<_> = response
        .headers()
        .iter()
        .filter(|line| line.to_ascii_lowercase().starts_with("content-type"))
        .collect();
    assert_eq!(content_types, vec!["Content-Type: application/vnd.ms-excel"]);
}

#[tokio::test]
async fn test_save_to_file() {
    let origin = start_mock_origin(raw_response("200 OK", &["X-A: 1"], "persist me")).await;
    let path = temp_path("saved");

    let response = Pipeline::new()
        .save_to_file(&path)
        .forward(Some(ProxyRequest::get(&origin.url("/blob"))))
        .await
        .unwrap();

    assert!(response.headers().is_empty());
    assert_eq!(response.saved(), Some(&SaveOutcome::Written(10)));
    assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "persist me");
    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn test_form_body_reencoded() {
    let origin = start_mock_origin(raw_response("201 Created", &[], "")).await;

    let form = FormBody::new()
        .field("name", "a b")
        .field("tags", FormValue::List(vec!["x".into(), "y".into()]));
    let mut request = ProxyRequest::new("post", RequestUri::parse(&origin.url("/submit")));
    request.set_header("Content-Type", "text/plain");
    request.set_header("Content-Length", "999");
    request.set_body(Some(RequestBody::Form(form)));

    let response = Pipeline::new().forward(Some(request)).await.unwrap();
    assert_eq!(response.code(), 201);

    let raw = origin.last_request();
    assert!(raw.starts_with("POST /submit HTTP/1.1"));
    assert_eq!(
        request_header(&raw, "content-type"),
        Some("application/x-www-form-urlencoded")
    );
    let body = request_body(&raw);
    assert_eq!(body, "name=a+b&tags%5B%5D=x&tags%5B%5D=y");
    assert_eq!(request_header(&raw, "content-length"), Some(body.len().to_string().as_str()));
}

#[tokio::test]
async fn test_multipart_upload_with_local_file() {
    let origin = start_mock_origin(raw_response("200 OK", &[], "uploaded")).await;
    let file = temp_path("upload").with_extension("txt");
    tokio::fs::write(&file, "file body").await.unwrap();

    let mut form = FormBody::new().field("title", "report");
    form.add_local_file("attachment", &file, None);
    let mut request = ProxyRequest::new("PUT", RequestUri::parse(&origin.url("/files")));
    request.set_body(Some(RequestBody::Form(form)));
    Pipeline::new().forward(Some(request)).await.unwrap();

    let raw = origin.last_request();
    let content_type = request_header(&raw, "content-type").unwrap();
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .unwrap();
    let body = request_body(&raw);
    let file_name = file.file_name().unwrap().to_string_lossy();
    assert!(body.contains("Content-Disposition: form-data; name=\"title\"\r\n\r\nreport\r\n"));
    assert!(body.contains(&format!(
        "Content-Disposition: form-data; name=\"attachment\"; filename=\"{file_name}\"\r\n\
         Content-Type: application/octet-stream\r\n\r\nfile body\r\n"
    )));
    assert!(body.ends_with(&format!("--{boundary}--\r\n")));

    tokio::fs::remove_file(&file).await.unwrap();
}

#[tokio::test]
async fn test_get_does_not_send_body() {
    let origin = start_mock_origin(raw_response("200 OK", &[], "")).await;
    let mut request = ProxyRequest::get(&origin.url("/q"));
    request.set_body(Some(RequestBody::Raw("ignored".into())));
    Pipeline::new().forward(Some(request)).await.unwrap();

    let raw = origin.last_request();
    assert_eq!(request_body(&raw), "");
    assert!(request_header(&raw, "content-length").is_none());
}

#[tokio::test]
async fn test_redirect_relayed_by_default() {
    let origin = start_mock_origin(raw_response("302 Found", &["Location: /elsewhere"], "")).await;
    let response = Pipeline::new()
        .forward(Some(ProxyRequest::get(&origin.url("/old"))))
        .await
        .unwrap();
    assert_eq!(response.code(), 302);
    assert_eq!(response.header_value("Location"), Some("/elsewhere"));
    assert_eq!(origin.requests().len(), 1);
}

#[tokio::test]
async fn test_malformed_status_line_is_unparsable() {
    let origin = start_mock_origin(raw_response("abc OK", &[], "hi")).await;
    let response = Pipeline::new()
        .forward(Some(ProxyRequest::get(&origin.url("/odd"))))
        .await
        .unwrap();
    assert_eq!(origin.requests().len(), 1);
    assert_eq!(response.code(), STATUS_UNPARSABLE);
    assert!(!response.is_miss());
}

#[tokio::test]
async fn test_unreachable_origin_is_miss() {
    let mut request = ProxyRequest::get("http://127.0.0.1:1/down");
    request.set_timeout(Duration::from_secs(2));
    let response = Pipeline::new()
        .with_transport(ForwardTransport::new(true))
        .forward(Some(request))
        .await
        .unwrap();
    assert!(response.is_miss());
    assert_eq!(response.headers(), &["ProxyUrl: http://127.0.0.1:1/down"]);
}

#[tokio::test]
async fn test_local_file_forward_and_render() {
    let path = temp_path("local");
    tokio::fs::write(&path, "on disk").await.unwrap();

    let request = ProxyRequest::new("GET", RequestUri::from_local_file(path.to_string_lossy()));
    let response = Pipeline::new().forward(Some(request)).await.unwrap();
    assert_eq!(response.code(), 200);
    assert_eq!(response.mode(), OutputMode::Streaming);

    let mut out = Vec::new();
    let written = response.render(&mut out).await.unwrap();
    assert_eq!(written, 7);
    assert_eq!(String::from_utf8(out).unwrap(), "HTTP/1.1 200 OK\r\n\r\non disk");

    tokio::fs::remove_file(&path).await.unwrap();
}
