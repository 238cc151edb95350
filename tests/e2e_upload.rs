//! E2E tests for media upload validation
//!
//! Every case here is rejected before the media bucket is contacted.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{TestServer, TestUser};
use linko::api::{UPLOAD_BODY_LIMIT, UPLOAD_MAX_FILES};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tower::ServiceExt;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

fn image_part(name: &str) -> Part {
    Part::bytes(PNG_BYTES.to_vec())
        .file_name(name.to_string())
        .mime_str("image/png")
        .unwrap()
}

async fn upload(server: &TestServer, user: Option<&TestUser>, form: Form) -> reqwest::Response {
    let mut request = server.client.post(server.url("/api/upload")).multipart(form);
    if let Some(user) = user {
        request = request.bearer_auth(&user.token);
    }
    request.send().await.unwrap()
}

async fn error_message(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_upload_requires_auth() {
    let server = TestServer::new().await;
    let form = Form::new().part("files", image_part("a.png"));

    let response = upload(&server, None, form).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_upload_rejects_too_many_files() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let mut form = Form::new();
    for i in 0..=UPLOAD_MAX_FILES {
        form = form.part("files", image_part(&format!("{i}.png")));
    }

    let response = upload(&server, Some(&alice), form).await;
    assert_eq!(response.status(), 400);
    assert_eq!(error_message(response).await, "At most 5 files per upload");
}

#[tokio::test]
async fn test_upload_rejects_non_media_types() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let text = Part::bytes(b"hello".to_vec())
        .file_name("notes.txt")
        .mime_str("text/plain")
        .unwrap();
    let response = upload(&server, Some(&alice), Form::new().part("files", text)).await;
    assert_eq!(response.status(), 400);
    assert_eq!(
        error_message(response).await,
        "Only images and videos are allowed"
    );

    // a bad file after a good one still fails the whole request
    let pdf = Part::bytes(b"%PDF-1.4".to_vec())
        .file_name("doc.pdf")
        .mime_str("application/pdf")
        .unwrap();
    let form = Form::new()
        .part("images", image_part("ok.png"))
        .part("images", pdf);
    let response = upload(&server, Some(&alice), form).await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_upload_requires_a_file() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let form = Form::new()
        .text("caption", "no files here")
        .part("attachment", image_part("wrong-field.png"));
    let response = upload(&server, Some(&alice), form).await;
    assert_eq!(response.status(), 400);
    assert_eq!(error_message(response).await, "No files provided");
}

#[tokio::test]
async fn test_upload_rejects_empty_file() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;

    let empty = Part::bytes(Vec::new())
        .file_name("empty.png")
        .mime_str("image/png")
        .unwrap();
    let response = upload(&server, Some(&alice), Form::new().part("files", empty)).await;
    assert_eq!(response.status(), 400);
    assert_eq!(error_message(response).await, "Uploaded file is empty");
}

#[tokio::test]
async fn test_upload_rejects_oversized_body_up_front() {
    let server = TestServer::new().await;
    let alice = server.register("alice").await;
    let app = linko::build_router(server.state.clone());

    // only the declared length matters; the body is never read
    let request = Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice.token))
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=linko")
        .header(header::CONTENT_LENGTH, (UPLOAD_BODY_LIMIT + 1).to_string())
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}
