// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;
use videotube_accounts::config::Config;
use videotube_accounts::db::{FirestoreDb, MemoryDb};
use videotube_accounts::routes::create_router;
use videotube_accounts::services::{LocalUpload, MediaStore, UploadedMedia};
use videotube_accounts::AppState;

pub const BOUNDARY: &str = "videotube-test-boundary";

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Media store that never touches the network.
///
/// Returns a URL derived from the staged file name and counts uploads.
/// Set `fail` to make every upload return `None`.
#[derive(Default)]
pub struct FakeMedia {
    pub uploads: AtomicUsize,
    pub fail: AtomicBool,
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn upload(&self, file: &LocalUpload) -> Option<UploadedMedia> {
        if self.fail.load(Ordering::SeqCst) {
            return None;
        }
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Some(UploadedMedia {
            url: format!("https://media.test/{}", file.file_name),
        })
    }
}

/// Everything a test needs to drive the app and seed collaborator data.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub db: Arc<MemoryDb>,
    pub media: Arc<FakeMedia>,
}

/// Test config with a per-app upload directory.
#[allow(dead_code)]
pub fn test_config() -> Config {
    let mut config = Config::test_default();
    config.upload_dir = std::env::temp_dir().join(format!(
        "videotube-accounts-test-{}",
        uuid::Uuid::new_v4()
    ));
    config
}

/// Create a test app backed by the memory store and a fake media store.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(test_config())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let db = Arc::new(MemoryDb::new());
    let media = Arc::new(FakeMedia::default());
    let state = Arc::new(AppState::new(config, db.clone(), media.clone()));

    TestApp {
        router: create_router(state.clone()),
        state,
        db,
        media,
    }
}

// ─── Request Helpers ─────────────────────────────────────────

/// Build a multipart body from text fields and (field, file name) file parts.
#[allow(dead_code)]
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"\x89PNG fake image bytes");
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[allow(dead_code)]
pub fn multipart_request(
    method: &str,
    uri: &str,
    access_token: Option<&str>,
    body: Vec<u8>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = access_token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body)).unwrap()
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, access_token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = access_token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn get_request(uri: &str, access_token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = access_token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

// ─── Flows ───────────────────────────────────────────────────

/// Register through the HTTP surface with an avatar.
#[allow(dead_code)]
pub async fn register(app: &TestApp, username: &str, email: &str, password: &str) -> Response<Body> {
    let body = multipart_body(
        &[
            ("fullname", "Test User"),
            ("username", username),
            ("email", email),
            ("password", password),
        ],
        &[("avatar", "avatar.png")],
    );
    app.router
        .clone()
        .oneshot(multipart_request("POST", "/api/v1/users/register", None, body))
        .await
        .unwrap()
}

/// Log in and return the `data` object (user, accessToken, refreshToken).
#[allow(dead_code)]
pub async fn login(app: &TestApp, username: &str, password: &str) -> Value {
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/users/login",
            None,
            serde_json::json!({ "username": username, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    body_json(response).await["data"].clone()
}

/// Register then log in, returning (user id, access token, refresh token).
#[allow(dead_code)]
pub async fn signed_in(app: &TestApp, username: &str) -> (String, String, String) {
    let email = format!("{username}@example.com");
    let response = register(app, username, &email, "password123").await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);

    let data = login(app, username, "password123").await;
    (
        data["user"]["id"].as_str().unwrap().to_string(),
        data["accessToken"].as_str().unwrap().to_string(),
        data["refreshToken"].as_str().unwrap().to_string(),
    )
}
