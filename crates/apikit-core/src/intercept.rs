//! Response normalization.
//!
//! [`normalize_response`] decides, for one completed response, whether it is
//! passed through, rewritten into an envelope (and possibly logged), or
//! rejected as an unhandled status. It performs no I/O: adapters read the
//! response, call it, and apply the outcome.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::envelope::{error_envelope, success_envelope};
use crate::http_error::HttpError;

/// Which request paths get their responses normalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopePolicy {
    prefix: Option<String>,
}

impl ScopePolicy {
    pub const fn all_routes() -> Self {
        Self { prefix: None }
    }

    pub fn prefixed(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    pub fn from_prefix(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    pub fn applies_to(&self, path: &str) -> bool {
        self.prefix
            .as_deref()
            .is_none_or(|prefix| path.starts_with(prefix))
    }
}

/// A completed response, as seen by the interceptor.
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    pub path: &'a str,
    pub status: StatusCode,
    /// The error reply the response was built from, if any.
    pub error: Option<&'a HttpError>,
    /// Decoded body, `Value::Null` when empty.
    pub payload: &'a Value,
}

/// A server-side log line requested by the interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerLog {
    pub message: &'static str,
    pub context: Value,
}

/// What to do with a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalization {
    /// Send the response untouched.
    PassThrough,
    /// Replace the body; keep the status code and headers.
    Rewrite {
        status: StatusCode,
        body: Value,
        log: Option<ServerLog>,
    },
}

/// A response that is neither an error nor a 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unhandled response with status {status}")]
pub struct UnhandledResponse {
    pub status: StatusCode,
}

/// Classify a completed response.
///
/// Error replies (an attached [`HttpError`] or any non-2xx status) become
/// `{status: <slug>}`; 500 and 503 are logged. A 200 becomes the success
/// envelope. Any other 2xx is an integration bug and is returned as
/// [`UnhandledResponse`].
pub fn normalize_response(
    view: &ResponseView<'_>,
    scope: &ScopePolicy,
) -> Result<Normalization, UnhandledResponse> {
    if !scope.applies_to(view.path) {
        return Ok(Normalization::PassThrough);
    }

    if view.error.is_some() || !view.status.is_success() {
        let status = view.error.map_or(view.status, HttpError::status);
        let log = log_for(status).map(|message| ServerLog {
            message,
            context: view.error.map_or_else(
                || HttpError::from_status(status).to_log_value(),
                HttpError::to_log_value,
            ),
        });
        return Ok(Normalization::Rewrite {
            status,
            body: error_envelope(status),
            log,
        });
    }

    if view.status == StatusCode::OK {
        return Ok(Normalization::Rewrite {
            status: StatusCode::OK,
            body: success_envelope(view.payload),
            log: None,
        });
    }

    Err(UnhandledResponse {
        status: view.status,
    })
}

fn log_for(status: StatusCode) -> Option<&'static str> {
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => Some("Uncaught internal server error"),
        StatusCode::SERVICE_UNAVAILABLE => Some("Service unavailable"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Thrown, classify};
    use crate::error::ServerError;
    use serde_json::json;

    fn view<'a>(
        path: &'a str,
        status: StatusCode,
        error: Option<&'a HttpError>,
        payload: &'a Value,
    ) -> ResponseView<'a> {
        ResponseView {
            path,
            status,
            error,
            payload,
        }
    }

    #[test]
    fn test_success_is_enveloped() {
        let payload = json!({ "hello": "world" });
        let outcome = normalize_response(
            &view("/hello-world", StatusCode::OK, None, &payload),
            &ScopePolicy::all_routes(),
        )
        .unwrap();
        assert_eq!(
            outcome,
            Normalization::Rewrite {
                status: StatusCode::OK,
                body: json!({ "status": "success", "hello": "world" }),
                log: None,
            }
        );
    }

    #[test]
    fn test_uncaught_error_is_logged() {
        let err = HttpError::internal(ServerError::Uncaught(classify(Thrown::from("err"))));
        let payload = err.output_payload();
        let outcome = normalize_response(
            &view("/boom", StatusCode::INTERNAL_SERVER_ERROR, Some(&err), &payload),
            &ScopePolicy::all_routes(),
        )
        .unwrap();

        let Normalization::Rewrite { status, body, log } = outcome else {
            panic!("expected a rewrite");
        };
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "status": "internal_server_error" }));
        let log = log.unwrap();
        assert_eq!(log.message, "Uncaught internal server error");
        assert_eq!(log.context["cause"]["name"], json!("ApikitUncaughtError"));
    }

    #[test]
    fn test_service_unavailable_is_logged() {
        let err = HttpError::service_unavailable();
        let outcome = normalize_response(
            &view("/slow", StatusCode::SERVICE_UNAVAILABLE, Some(&err), &Value::Null),
            &ScopePolicy::all_routes(),
        )
        .unwrap();
        let Normalization::Rewrite { body, log, .. } = outcome else {
            panic!("expected a rewrite");
        };
        assert_eq!(body, json!({ "status": "service_unavailable" }));
        assert_eq!(log.unwrap().message, "Service unavailable");
    }

    #[test]
    fn test_not_found_is_not_logged() {
        let outcome = normalize_response(
            &view("/missing", StatusCode::NOT_FOUND, None, &Value::Null),
            &ScopePolicy::all_routes(),
        )
        .unwrap();
        assert_eq!(
            outcome,
            Normalization::Rewrite {
                status: StatusCode::NOT_FOUND,
                body: json!({ "status": "not_found" }),
                log: None,
            }
        );
    }

    #[test]
    fn test_bare_500_without_error_still_logs_context() {
        let outcome = normalize_response(
            &view("/x", StatusCode::INTERNAL_SERVER_ERROR, None, &Value::Null),
            &ScopePolicy::all_routes(),
        )
        .unwrap();
        let Normalization::Rewrite { log, .. } = outcome else {
            panic!("expected a rewrite");
        };
        assert_eq!(log.unwrap().context["output"]["statusCode"], json!(500));
    }

    #[test]
    fn test_redirect_is_error_branch() {
        let outcome = normalize_response(
            &view("/moved", StatusCode::FOUND, None, &Value::Null),
            &ScopePolicy::all_routes(),
        )
        .unwrap();
        let Normalization::Rewrite { body, .. } = outcome else {
            panic!("expected a rewrite");
        };
        assert_eq!(body, json!({ "status": "found" }));
    }

    #[test]
    fn test_other_success_status_is_unhandled() {
        let err = normalize_response(
            &view("/created", StatusCode::CREATED, None, &Value::Null),
            &ScopePolicy::all_routes(),
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::CREATED);
    }

    #[test]
    fn test_out_of_scope_passes_through() {
        let scope = ScopePolicy::prefixed("/api");
        let outcome = normalize_response(
            &view("/documentation", StatusCode::CREATED, None, &Value::Null),
            &scope,
        )
        .unwrap();
        assert_eq!(outcome, Normalization::PassThrough);

        assert!(scope.applies_to("/api/users"));
        assert!(!scope.applies_to("/hello-world"));
        assert!(ScopePolicy::all_routes().applies_to("/hello-world"));
    }
}
