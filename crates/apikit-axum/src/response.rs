//! Conversions from apikit replies to axum responses.

use apikit_core::HttpError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;

/// An [`HttpError`] rendered as a response.
///
/// The body is the error's public payload; the error itself travels in the
/// response extensions so the interceptor can log its full context.
#[derive(Debug, Clone)]
pub struct ErrorReply(pub HttpError);

impl From<HttpError> for ErrorReply {
    fn from(err: HttpError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ErrorReply {
    fn into_response(self) -> Response {
        let err = self.0;
        let mut response = (err.status(), Json(err.output_payload())).into_response();
        for (name, value) in err.headers() {
            response.headers_mut().append(name.clone(), value.clone());
        }
        response.extensions_mut().insert(err);
        response
    }
}

/// The value a handler replied with, kept beside its serialized body.
#[derive(Debug, Clone)]
pub struct HandlerPayload(pub Value);

/// A 200 carrying a handler's payload.
///
/// The payload itself also travels in the response extensions, so the
/// interceptor builds the envelope from it rather than from a re-parse.
pub fn payload_response(payload: Value) -> Response {
    let mut response = (StatusCode::OK, Json(&payload)).into_response();
    response.extensions_mut().insert(HandlerPayload(payload));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn test_error_reply_keeps_headers_and_extension() {
        let response = ErrorReply(HttpError::unauthorized("Missing authentication", "Basic"))
            .into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Basic");
        let err = response.extensions().get::<HttpError>().unwrap();
        assert_eq!(err.message(), "Missing authentication");
    }

    #[test]
    fn test_payload_response_is_json() {
        let response = payload_response(Value::Null);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert!(response.extensions().get::<HttpError>().is_none());
        assert!(response.extensions().get::<HandlerPayload>().is_some());
    }
}
