//! HTTP error replies.
//!
//! [`HttpError`] is the engine-agnostic error reply: a status code, a
//! message, optional response headers, and optionally the domain error it
//! wraps. Adapters turn it into a wire response; the response interceptor
//! reads it back to decide what to log.

use std::error::Error as StdError;
use std::sync::Arc;

use http::{HeaderMap, HeaderValue, StatusCode, header};
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::envelope::error_title;
use crate::error::ServerError;

const INTERNAL_MESSAGE: &str = "An internal server error occurred";

/// An error reply carrying a status code.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HttpError {
    status: StatusCode,
    message: String,
    headers: HeaderMap,
    #[source]
    cause: Option<Arc<ServerError>>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            headers: HeaderMap::new(),
            cause: None,
        }
    }

    /// Error reply carrying only the canonical title of `status`.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, error_title(status))
    }

    /// Wrap a domain error into an error reply with the given status.
    pub fn wrap(err: ServerError, status: StatusCode) -> Self {
        Self {
            status,
            message: err.to_string(),
            headers: HeaderMap::new(),
            cause: Some(Arc::new(err)),
        }
    }

    /// Wrap a domain error as a 500.
    pub fn internal(err: ServerError) -> Self {
        Self::wrap(err, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn service_unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable")
    }

    /// A 401 challenging the client with `scheme`.
    pub fn unauthorized(message: impl Into<String>, scheme: &'static str) -> Self {
        let mut err = Self::new(StatusCode::UNAUTHORIZED, message);
        err.headers
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(scheme));
        err
    }

    pub const fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn cause(&self) -> Option<&ServerError> {
        self.cause.as_deref()
    }

    /// Canonical title of the status, e.g. `"Service Unavailable"`.
    pub fn title(&self) -> &'static str {
        error_title(self.status)
    }

    pub fn is_server(&self) -> bool {
        self.status.is_server_error()
    }

    /// The public payload `{statusCode, error, message}`.
    ///
    /// 500 replies never expose their message.
    pub fn output_payload(&self) -> Value {
        let message = if self.status == StatusCode::INTERNAL_SERVER_ERROR {
            INTERNAL_MESSAGE
        } else {
            self.message.as_str()
        };
        json!({
            "statusCode": self.status.as_u16(),
            "error": self.title(),
            "message": message,
        })
    }

    /// Full structured form for server-side logs, including the cause chain.
    pub fn to_log_value(&self) -> Value {
        let headers: Map<String, Value> = self
            .headers
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()),
                )
            })
            .collect();

        let mut value = json!({
            "name": "HttpError",
            "message": self.message,
            "isServer": self.is_server(),
            "output": {
                "statusCode": self.status.as_u16(),
                "payload": self.output_payload(),
                "headers": headers,
            },
        });
        if let Some(cause) = self.cause() {
            value["cause"] = serialize_server_error(cause);
        }
        value
    }
}

fn serialize_server_error(err: &ServerError) -> Value {
    let mut value = json!({
        "name": err.kind().name(),
        "message": err.to_string(),
    });
    if let Some(source) = err.source() {
        value["cause"] = serialize_error_chain(source);
    }
    value
}

fn serialize_error_chain(err: &(dyn StdError + 'static)) -> Value {
    let mut value = json!({ "message": err.to_string() });
    if let Some(source) = err.source() {
        value["cause"] = serialize_error_chain(source);
    }
    value
}
