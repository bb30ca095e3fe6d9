//! Response envelopes.
//!
//! Every API reply is rewritten into `{ "status": ... }`. Success replies
//! keep their payload fields next to `"status": "success"`; error replies
//! carry only the slug of the status title.

use http::StatusCode;
use serde_json::{Map, Value};

/// Status value of the success envelope.
pub const SUCCESS_STATUS: &str = "success";

/// Canonical title of a status code, `"Unknown"` when it has none.
pub fn error_title(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

/// Lowercase, underscore-joined form of a title.
///
/// Apostrophes are dropped so `"I'm a teapot"` becomes `"im_a_teapot"`.
pub fn slugify(title: &str) -> String {
    title
        .chars()
        .filter(|c| *c != '\'')
        .collect::<String>()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

/// `{ "status": <slug of the status title> }`.
pub fn error_envelope(status: StatusCode) -> Value {
    let mut envelope = Map::new();
    envelope.insert(
        "status".to_owned(),
        Value::String(slugify(error_title(status))),
    );
    Value::Object(envelope)
}

/// `{ "status": "success" }` extended by the payload.
///
/// Payload keys are applied after `status`, so a payload that defines its own
/// `status` replaces `"success"`. Arrays and strings contribute their indices
/// as keys; other scalars contribute nothing.
pub fn success_envelope(payload: &Value) -> Value {
    let mut envelope = Map::new();
    envelope.insert(
        "status".to_owned(),
        Value::String(SUCCESS_STATUS.to_owned()),
    );

    match payload {
        Value::Object(fields) => {
            for (key, value) in fields {
                envelope.insert(key.clone(), value.clone());
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                envelope.insert(index.to_string(), item.clone());
            }
        }
        Value::String(text) => {
            for (index, c) in text.chars().enumerate() {
                envelope.insert(index.to_string(), Value::String(c.to_string()));
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }

    Value::Object(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slugify_titles() {
        assert_eq!(slugify("Internal Server Error"), "internal_server_error");
        assert_eq!(slugify("Not Found"), "not_found");
        assert_eq!(slugify("Service Unavailable"), "service_unavailable");
        assert_eq!(
            slugify("Non-Authoritative Information"),
            "non_authoritative_information"
        );
        assert_eq!(slugify("I'm a teapot"), "im_a_teapot");
    }

    #[test]
    fn test_error_envelope() {
        assert_eq!(
            error_envelope(StatusCode::INTERNAL_SERVER_ERROR),
            json!({ "status": "internal_server_error" })
        );
        assert_eq!(
            error_envelope(StatusCode::UNAUTHORIZED),
            json!({ "status": "unauthorized" })
        );
    }

    #[test]
    fn test_error_envelope_unknown_status() {
        let status = StatusCode::from_u16(599).unwrap();
        assert_eq!(error_envelope(status), json!({ "status": "unknown" }));
    }

    #[test]
    fn test_success_envelope_null_payload() {
        assert_eq!(success_envelope(&Value::Null), json!({ "status": "success" }));
    }

    #[test]
    fn test_success_envelope_merges_object() {
        assert_eq!(
            success_envelope(&json!({ "hello": "world" })),
            json!({ "status": "success", "hello": "world" })
        );
    }

    #[test]
    fn test_success_envelope_payload_status_wins() {
        assert_eq!(
            success_envelope(&json!({ "status": "queued", "id": 4 })),
            json!({ "status": "queued", "id": 4 })
        );
    }

    #[test]
    fn test_success_envelope_non_object_payloads() {
        assert_eq!(
            success_envelope(&json!(["a", "b"])),
            json!({ "status": "success", "0": "a", "1": "b" })
        );
        assert_eq!(
            success_envelope(&json!("ok")),
            json!({ "status": "success", "0": "o", "1": "k" })
        );
        assert_eq!(success_envelope(&json!(42)), json!({ "status": "success" }));
        assert_eq!(success_envelope(&json!(true)), json!({ "status": "success" }));
    }
}
