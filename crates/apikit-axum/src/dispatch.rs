//! Per-route request dispatch.
//!
//! Each registered route gets an axum endpoint that decodes the request into
//! an [`ApiRequest`], runs basic authentication when the route asks for it,
//! reads the body, calls the shim-wrapped handler and turns its [`Reply`] into
//! a response. Deferred replies are awaited under the route's server timeout;
//! one that fails or panics is answered with a bare 500.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use apikit_core::{
    ApiRequest, AuthStrategy, HttpError, NormalizedCause, NormalizedRoute, Reply, authenticate,
    classify, classify_panic, uncaught_reply,
};
use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, Query, RawPathParams, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;

use crate::response::{ErrorReply, payload_response};

const DISPATCH_TARGET: &str = "apikit::dispatch";

/// Largest accepted request body, in bytes.
pub const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// Everything an endpoint needs to serve one route.
#[derive(Clone)]
pub(crate) struct RouteEndpoint {
    route: Arc<NormalizedRoute>,
    strategy: Option<AuthStrategy>,
}

impl RouteEndpoint {
    pub(crate) fn new(route: NormalizedRoute, strategy: Option<AuthStrategy>) -> Self {
        Self {
            route: Arc::new(route),
            strategy,
        }
    }

    pub(crate) async fn call(self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(err) => ErrorReply(err).into_response(),
        }
    }

    async fn dispatch(&self, request: Request) -> Result<Response, HttpError> {
        let (mut api_request, body) = decode_head(request).await?;

        // Credentials are checked before the body is read.
        if let Some(strategy) = &self.strategy {
            let authorization = api_request
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            let credentials = authenticate(strategy, &api_request, authorization)?;
            api_request.credentials = Some(credentials);
        }

        api_request.payload = read_payload(&api_request.headers, body).await?;

        let reply = (self.route.handler)(&api_request)
            .unwrap_or_else(|thrown| uncaught_reply(classify(thrown)));

        match reply {
            Reply::Value(payload) => Ok(payload_response(payload)),
            Reply::Error(err) => Err(err),
            Reply::Deferred(deferred) => {
                let deferred = AssertUnwindSafe(deferred).catch_unwind();
                match tokio::time::timeout(self.route.server_timeout(), deferred).await {
                    Ok(Ok(Ok(payload))) => Ok(payload_response(payload)),
                    Ok(Ok(Err(thrown))) => Err(deferred_failure(&api_request, classify(thrown))),
                    Ok(Err(panic)) => Err(deferred_failure(&api_request, classify_panic(panic))),
                    Err(_elapsed) => {
                        tracing::debug!(
                            target: DISPATCH_TARGET,
                            path = %api_request.path,
                            timeout_ms = ?self.route.config.timeout.server,
                            "Server timeout elapsed"
                        );
                        Err(HttpError::service_unavailable())
                    }
                }
            }
        }
    }
}

/// A deferred reply that failed or panicked: logged here, answered with a
/// bare 500.
fn deferred_failure(request: &ApiRequest, cause: NormalizedCause) -> HttpError {
    tracing::warn!(
        target: DISPATCH_TARGET,
        method = %request.method,
        path = %request.path,
        error = %cause,
        "Deferred reply failed"
    );
    HttpError::from_status(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Request body decoding failures.
#[derive(Debug, Error)]
pub enum JsonBodyError {
    #[error("Payload content length greater than maximum allowed: {limit}")]
    TooLarge { limit: usize },

    #[error("Invalid request payload JSON format")]
    InvalidJson(#[source] serde_json::Error),

    #[error("Unsupported Media Type")]
    UnsupportedMediaType(String),
}

impl JsonBodyError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        }
    }
}

impl From<JsonBodyError> for HttpError {
    fn from(err: JsonBodyError) -> Self {
        Self::new(err.status(), err.to_string())
    }
}

/// Everything but the body, which is handed back unread.
async fn decode_head(request: Request) -> Result<(ApiRequest, Body), HttpError> {
    let (mut parts, body) = request.into_parts();

    let params = path_params(&mut parts).await;
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .map_err(|_| HttpError::bad_request("Invalid request query"))?;

    let api_request = ApiRequest {
        method: parts.method,
        path: parts.uri.path().to_owned(),
        params,
        query,
        headers: parts.headers,
        payload: Value::Null,
        credentials: None,
    };
    Ok((api_request, body))
}

async fn read_payload(headers: &HeaderMap, body: Body) -> Result<Value, JsonBodyError> {
    let bytes = axum::body::to_bytes(body, MAX_PAYLOAD_BYTES)
        .await
        .map_err(|_| JsonBodyError::TooLarge {
            limit: MAX_PAYLOAD_BYTES,
        })?;
    decode_payload(headers, &bytes)
}

async fn path_params(parts: &mut Parts) -> HashMap<String, String> {
    RawPathParams::from_request_parts(parts, &())
        .await
        .map(|params| {
            params
                .iter()
                .map(|(name, value)| (name.to_owned(), value.to_owned()))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode a body by content type. Bodies without a content type are read as
/// JSON.
fn decode_payload(headers: &HeaderMap, bytes: &Bytes) -> Result<Value, JsonBodyError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        });

    match mime.as_deref() {
        None | Some("application/json") => {
            serde_json::from_slice(bytes).map_err(JsonBodyError::InvalidJson)
        }
        Some(mime) if mime.ends_with("+json") => {
            serde_json::from_slice(bytes).map_err(JsonBodyError::InvalidJson)
        }
        Some(mime) if mime.starts_with("text/") => {
            Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
        }
        Some(mime) => Err(JsonBodyError::UnsupportedMediaType(mime.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    fn headers(content_type: Option<&'static str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(content_type) = content_type {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
        headers
    }

    #[test]
    fn test_empty_body_is_null() {
        let payload = decode_payload(&headers(Some("application/json")), &Bytes::new()).unwrap();
        assert_eq!(payload, Value::Null);
    }

    #[test]
    fn test_json_body_with_charset() {
        let body = Bytes::from_static(br#"{"name":"john"}"#);
        let payload =
            decode_payload(&headers(Some("application/json; charset=utf-8")), &body).unwrap();
        assert_eq!(payload, json!({ "name": "john" }));
    }

    #[test]
    fn test_missing_content_type_reads_json() {
        let body = Bytes::from_static(b"[1,2]");
        assert_eq!(decode_payload(&headers(None), &body).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_invalid_json_is_bad_request() {
        let body = Bytes::from_static(b"{nope");
        let err = decode_payload(&headers(Some("application/json")), &body).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            HttpError::from(err).message(),
            "Invalid request payload JSON format"
        );
    }

    #[test]
    fn test_text_body_is_string() {
        let body = Bytes::from_static(b"hello");
        let payload = decode_payload(&headers(Some("text/plain")), &body).unwrap();
        assert_eq!(payload, json!("hello"));
    }

    #[test]
    fn test_other_media_type_rejected() {
        let body = Bytes::from_static(b"\x00\x01");
        let err = decode_payload(&headers(Some("application/octet-stream")), &body).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }
}
