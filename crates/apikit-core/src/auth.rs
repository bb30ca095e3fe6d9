//! HTTP Basic authentication strategies.
//!
//! A strategy pairs a name with a [`CredentialValidator`]. Routes opt in by
//! naming the strategy in `config.auth`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::error::ServerError;
use crate::http_error::HttpError;
use crate::request::ApiRequest;

const BASIC_SCHEME: &str = "Basic";

/// Outcome of a credential check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub is_valid: bool,
    /// Credentials attached to the request when valid.
    pub credentials: Option<Value>,
}

impl Validation {
    pub const fn valid(credentials: Value) -> Self {
        Self {
            is_valid: true,
            credentials: Some(credentials),
        }
    }

    pub const fn invalid() -> Self {
        Self {
            is_valid: false,
            credentials: None,
        }
    }
}

/// Checks a username/password pair for a request.
pub trait CredentialValidator: Send + Sync {
    fn validate(&self, request: &ApiRequest, username: &str, password: &str) -> Validation;
}

impl<F> CredentialValidator for F
where
    F: Fn(&ApiRequest, &str, &str) -> Validation + Send + Sync,
{
    fn validate(&self, request: &ApiRequest, username: &str, password: &str) -> Validation {
        self(request, username, password)
    }
}

/// A named basic authentication strategy.
#[derive(Clone)]
pub struct AuthStrategy {
    pub name: String,
    pub validator: Arc<dyn CredentialValidator>,
}

impl AuthStrategy {
    pub fn basic(name: impl Into<String>, validator: impl CredentialValidator + 'static) -> Self {
        Self {
            name: name.into(),
            validator: Arc::new(validator),
        }
    }
}

impl fmt::Debug for AuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthStrategy")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Registered strategies, by name.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, AuthStrategy>,
}

impl StrategyRegistry {
    /// Register every strategy. Names must be unique.
    pub fn register(strategies: &[AuthStrategy]) -> Result<Self, ServerError> {
        let mut registry = Self::default();
        for strategy in strategies {
            if registry
                .strategies
                .insert(strategy.name.clone(), strategy.clone())
                .is_some()
            {
                return Err(ServerError::plugin_registration(format!(
                    "authentication strategy {:?} is registered twice",
                    strategy.name
                )));
            }
            tracing::debug!(strategy = %strategy.name, "Registered basic authentication strategy");
        }
        Ok(registry)
    }

    pub fn get(&self, name: &str) -> Option<&AuthStrategy> {
        self.strategies.get(name)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Username and password decoded from an `Authorization: Basic` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// Decode an `Authorization` header value using the Basic scheme.
pub fn parse_basic_authorization(header: &str) -> Option<BasicCredentials> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(BASIC_SCHEME) {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some(BasicCredentials {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

/// Run `strategy` against a request's `Authorization` header.
///
/// Returns the credentials to attach to the request, or a 401 challenge.
pub fn authenticate(
    strategy: &AuthStrategy,
    request: &ApiRequest,
    authorization: Option<&str>,
) -> Result<Value, HttpError> {
    let Some(header) = authorization else {
        return Err(HttpError::unauthorized(
            "Missing authentication",
            BASIC_SCHEME,
        ));
    };
    let Some(credentials) = parse_basic_authorization(header) else {
        return Err(HttpError::unauthorized(
            "Bad HTTP authentication header format",
            BASIC_SCHEME,
        ));
    };
    if credentials.username.is_empty() {
        return Err(HttpError::unauthorized(
            "HTTP authentication header missing username",
            BASIC_SCHEME,
        ));
    }

    let validation =
        strategy
            .validator
            .validate(request, &credentials.username, &credentials.password);
    if !validation.is_valid {
        return Err(HttpError::unauthorized(
            "Bad username or password",
            BASIC_SCHEME,
        ));
    }
    Ok(validation.credentials.unwrap_or(Value::Null))
}
