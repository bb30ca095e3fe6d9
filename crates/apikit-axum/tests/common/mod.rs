//! Shared helpers for the adapter integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use apikit_axum::{ApiServer, init_server};
use apikit_core::{
    ApiConfig, ApiRequest, AuthStrategy, LogsConfig, MemoryTransport, RouteDescriptor,
    ServerConfiguration, ServerSection, Validation,
};
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};

/// `Authorization` value for john / secret.
pub const JOHN_SECRET: &str = "Basic am9objpzZWNyZXQ=";
/// `Authorization` value for john / wrong.
pub const JOHN_WRONG: &str = "Basic am9objp3cm9uZw==";

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Logs captured in memory, console disabled.
pub fn memory_logs() -> (LogsConfig, MemoryTransport) {
    let memory = MemoryTransport::new();
    let logs = LogsConfig {
        console: false,
        transports: vec![Arc::new(memory.clone())],
    };
    (logs, memory)
}

pub fn configuration(api: ApiConfig) -> (ServerConfiguration, MemoryTransport) {
    let (logs, memory) = memory_logs();
    let config = ServerConfiguration::new(api, ServerSection::single(0)).with_logs(logs);
    (config, memory)
}

pub fn server(api: ApiConfig) -> (ApiServer, MemoryTransport) {
    let (config, memory) = configuration(api);
    (init_server(config).unwrap(), memory)
}

/// Accepts john / secret and attaches a small user record.
pub fn simple_strategy() -> AuthStrategy {
    AuthStrategy::basic("simple", |_: &ApiRequest, username: &str, password: &str| {
        if username == "john" && password == "secret" {
            Validation::valid(json!({ "id": 1, "name": "John" }))
        } else {
            Validation::invalid()
        }
    })
}

pub fn hello_world() -> RouteDescriptor {
    RouteDescriptor::get("/hello-world", |_| Ok(json!({ "hello": "world" }).into()))
}

pub async fn send(server: &ApiServer, request: Request<Body>) -> TestResponse {
    let response = server.inject(request).await;
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(server: &ApiServer, path: &str) -> TestResponse {
    send(
        server,
        Request::builder().uri(path).body(Body::empty()).unwrap(),
    )
    .await
}
