//! The response interceptor middleware.
//!
//! Runs once per request after the inner service has produced a response,
//! including the fallback 404 and the 503 of an elapsed server timeout. The
//! decision itself lives in [`apikit_core::normalize_response`]; this layer
//! only buffers the body, applies the outcome and writes the requested logs.
//! Route replies hand over their payload in the response extensions; only
//! foreign bodies are decoded from bytes.

use std::sync::Arc;

use apikit_core::{
    HttpError, Logger, Normalization, ResponseView, ScopePolicy, normalize_response,
};
use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::response::Parts;
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};

use crate::response::HandlerPayload;

/// Shared state of the interceptor.
#[derive(Debug, Clone)]
pub struct InterceptorState {
    pub scope: ScopePolicy,
    pub logger: Logger,
}

impl InterceptorState {
    pub const fn new(scope: ScopePolicy, logger: Logger) -> Self {
        Self { scope, logger }
    }
}

/// Middleware entry point, for `middleware::from_fn_with_state`.
pub async fn intercept(
    State(state): State<Arc<InterceptorState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if !state.scope.applies_to(&path) {
        return next.run(request).await;
    }

    let (mut parts, body) = next.run(request).await.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(err) => {
            state.logger.error(
                "Unreadable response body",
                json!({ "path": path, "message": err.to_string() }),
            );
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    // Handler replies carry their own payload; anything else is decoded.
    let payload = parts
        .extensions
        .remove::<HandlerPayload>()
        .map_or_else(|| decode_body(&bytes), |HandlerPayload(payload)| payload);

    let view = ResponseView {
        path: &path,
        status: parts.status,
        error: parts.extensions.get::<HttpError>(),
        payload: &payload,
    };

    match normalize_response(&view, &state.scope) {
        Ok(Normalization::PassThrough) => Response::from_parts(parts, Body::from(bytes)),
        Ok(Normalization::Rewrite { status, body, log }) => {
            if let Some(log) = log {
                state.logger.error(log.message, log.context);
            }
            rewrite(&parts, status, body)
        }
        Err(unhandled) => {
            state.logger.error(
                "Unhandled response",
                json!({ "path": path, "statusCode": unhandled.status.as_u16() }),
            );
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Best-effort decoding of a buffered body: JSON when possible, otherwise
/// the text, `Value::Null` when empty.
fn decode_body(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// A JSON response with `body`, keeping the original headers.
fn rewrite(parts: &Parts, status: StatusCode, body: Value) -> Response {
    let mut response = (status, Json(body)).into_response();
    for (name, value) in &parts.headers {
        if name == header::CONTENT_TYPE || name == header::CONTENT_LENGTH {
            continue;
        }
        response.headers_mut().append(name.clone(), value.clone());
    }
    response
}
