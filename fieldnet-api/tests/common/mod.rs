//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use fieldnet_api::db::users::{self, UserInput};
use fieldnet_api::{build_router, AppState};
use fieldnet_common::auth::{Authenticator, TokenKind};
use fieldnet_common::db::init_memory_database;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt; // for `oneshot` method

pub const SECRET: &str = "integration-test-secret";

pub const BOUNDARY: &str = "fieldnet-test-boundary";

pub fn authenticator() -> Authenticator {
    Authenticator::new(SECRET, 60, 7).with_bcrypt_cost(4)
}

/// Test helper: app over a fresh in-memory database
pub async fn setup() -> (Router, SqlitePool) {
    let pool = init_memory_database()
        .await
        .expect("Should create in-memory database");
    let state = AppState::new(pool.clone(), authenticator(), 10);
    (build_router(state), pool)
}

/// Test helper: insert an active user with a known password
pub async fn create_user(pool: &SqlitePool, email: &str, is_admin: bool) -> i64 {
    let user = UserInput {
        email: email.to_string(),
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        is_admin,
        is_active: true,
        ..UserInput::default()
    };
    let hash = authenticator()
        .hash_password("s3cret-pass")
        .expect("Should hash password");
    let username = email.split('@').next().unwrap_or("user");
    users::insert(pool, &user, username, &hash)
        .await
        .expect("Should insert user")
}

pub fn access_token(user_id: i64) -> String {
    authenticator()
        .issue(user_id, TokenKind::Access)
        .expect("Should issue token")
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::HOST, "testserver")
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "testserver")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn text_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: multipart request carrying one `document` file part
pub fn upload_request(uri: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"document\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Test helper: multipart request without a `document` part
pub fn empty_upload_request(uri: &str) -> Request<Body> {
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn with_token(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse().unwrap(),
    );
    request
}

/// Test helper: send a request and decode the JSON body
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}
