//! Error classifier for values raised by route handlers.
//!
//! A handler can fail with a real error, with an arbitrary JSON value, or by
//! panicking. Real errors pass through untouched; everything else becomes a
//! synthetic error whose message is `{"isNotError":true,"err":<value>}` so
//! the original value survives into the server log.

use std::any::Any;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::BoxError;

/// Value substituted for a thrown value that cannot be serialized.
pub const UNSERIALIZABLE: &str = "[unserializable]";

/// A value raised by a route handler instead of a reply.
#[derive(Debug)]
pub enum Thrown {
    /// An error value.
    Error(BoxError),
    /// Any other value.
    Value(Value),
}

impl Thrown {
    pub fn error(err: impl Into<BoxError>) -> Self {
        Self::Error(err.into())
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }
}

impl From<Value> for Thrown {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<&str> for Thrown {
    fn from(value: &str) -> Self {
        Self::Value(Value::String(value.to_owned()))
    }
}

/// Result of [`classify`].
#[derive(Debug)]
pub enum NormalizedCause {
    /// The raised value was already an error.
    Error(BoxError),
    /// The raised value was not an error; `message` is the serialized marker.
    NotAnError { message: String },
}

impl NormalizedCause {
    pub const fn is_not_error(&self) -> bool {
        matches!(self, Self::NotAnError { .. })
    }
}

impl fmt::Display for NormalizedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => fmt::Display::fmt(err, f),
            Self::NotAnError { message } => f.write_str(message),
        }
    }
}

impl std::error::Error for NormalizedCause {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Error(err) => err.source(),
            Self::NotAnError { .. } => None,
        }
    }
}

/// Classify a value raised by a handler.
pub fn classify(thrown: Thrown) -> NormalizedCause {
    match thrown {
        Thrown::Error(err) => NormalizedCause::Error(err),
        Thrown::Value(value) => not_an_error(value),
    }
}

/// Classify a panic payload caught around a handler call.
///
/// `panic!` payloads are `&'static str` or `String`; both are treated as
/// non-error string values. A boxed error passed to `panic_any` is kept as an
/// error. Anything else cannot be inspected and is replaced by a placeholder.
pub fn classify_panic(payload: Box<dyn Any + Send>) -> NormalizedCause {
    let payload = match payload.downcast::<BoxError>() {
        Ok(err) => return NormalizedCause::Error(*err),
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<String>() {
        Ok(message) => return not_an_error(Value::String(*message)),
        Err(payload) => payload,
    };
    match payload.downcast_ref::<&'static str>() {
        Some(message) => not_an_error(Value::from(*message)),
        None => not_an_error(Value::from(UNSERIALIZABLE)),
    }
}

fn not_an_error(value: Value) -> NormalizedCause {
    let mut marker = Map::new();
    marker.insert("isNotError".to_owned(), Value::Bool(true));
    marker.insert("err".to_owned(), value);

    let message = serde_json::to_string(&marker)
        .unwrap_or_else(|_| format!(r#"{{"isNotError":true,"err":"{UNSERIALIZABLE}"}}"#));
    NormalizedCause::NotAnError { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io;

    #[test]
    fn test_error_passes_through_unchanged() {
        let cause = classify(Thrown::error(io::Error::other("err")));
        assert!(!cause.is_not_error());
        assert_eq!(cause.to_string(), "err");
    }

    #[test]
    fn test_string_value_is_wrapped_with_marker() {
        let cause = classify("err".into());
        assert!(cause.is_not_error());

        let parsed: Value = serde_json::from_str(&cause.to_string()).unwrap();
        assert_eq!(parsed, json!({ "isNotError": true, "err": "err" }));
    }

    #[test]
    fn test_object_value_is_preserved() {
        let cause = classify(Thrown::value(json!({ "code": 42, "tags": ["a"] })));
        let parsed: Value = serde_json::from_str(&cause.to_string()).unwrap();
        assert_eq!(parsed["err"], json!({ "code": 42, "tags": ["a"] }));
    }

    #[test]
    fn test_null_and_number_values() {
        let parsed: Value =
            serde_json::from_str(&classify(Thrown::value(Value::Null)).to_string()).unwrap();
        assert_eq!(parsed["err"], Value::Null);

        let parsed: Value =
            serde_json::from_str(&classify(Thrown::value(7)).to_string()).unwrap();
        assert_eq!(parsed["err"], json!(7));
    }

    #[test]
    fn test_panic_str_payload() {
        let payload = std::panic::catch_unwind(|| -> u8 { panic!("boom") }).unwrap_err();
        let cause = classify_panic(payload);
        let parsed: Value = serde_json::from_str(&cause.to_string()).unwrap();
        assert_eq!(parsed["err"], json!("boom"));
    }

    #[test]
    fn test_panic_formatted_payload() {
        let code = 3;
        let payload =
            std::panic::catch_unwind(|| -> u8 { panic!("failed with {code}") }).unwrap_err();
        let parsed: Value = serde_json::from_str(&classify_panic(payload).to_string()).unwrap();
        assert_eq!(parsed["err"], json!("failed with 3"));
    }

    #[test]
    fn test_panic_opaque_payload_uses_placeholder() {
        let payload: Box<dyn Any + Send> = Box::new(12_u8);
        let parsed: Value = serde_json::from_str(&classify_panic(payload).to_string()).unwrap();
        assert_eq!(parsed["err"], json!(UNSERIALIZABLE));
    }

    #[test]
    fn test_panic_boxed_error_payload_stays_an_error() {
        let err: BoxError = Box::new(io::Error::other("disk"));
        let payload: Box<dyn Any + Send> = Box::new(err);
        let cause = classify_panic(payload);
        assert!(!cause.is_not_error());
        assert_eq!(cause.to_string(), "disk");
    }
}
