//! Route descriptors and their normalization.
//!
//! Registration never mutates caller-supplied descriptors. [`normalize_routes`]
//! builds a fresh list where every route has a concrete server timeout, the
//! `api` tag exactly once, a parsed method, and a shim-wrapped handler.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use serde::{Deserialize, Serialize};

use crate::classify::Thrown;
use crate::error::ServerError;
use crate::handler::{Handler, Reply, wrap_handler};
use crate::request::ApiRequest;

/// Tag added to every registered route.
pub const API_TAG: &str = "api";

/// Per-route timeouts, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub server: Option<u64>,
}

/// Per-route configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    pub description: Option<String>,
    pub timeout: TimeoutConfig,
    pub tags: Vec<String>,
    /// Name of the authentication strategy protecting this route.
    pub auth: Option<String>,
}

impl RouteConfig {
    /// Copy with the server timeout defaulted and the `api` tag present.
    #[must_use]
    pub fn normalized(&self, global_timeout_ms: u64) -> Self {
        let mut config = self.clone();
        config.timeout.server.get_or_insert(global_timeout_ms);
        if !config.tags.iter().any(|tag| tag == API_TAG) {
            config.tags.push(API_TAG.to_owned());
        }
        config
    }
}

/// A declarative route: method, path, handler and configuration.
#[derive(Clone)]
pub struct RouteDescriptor {
    /// HTTP method name, or `*` for any method.
    pub method: String,
    pub path: String,
    pub handler: Handler,
    pub config: RouteConfig,
}

impl RouteDescriptor {
    pub fn new<F>(method: impl Into<String>, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Reply, Thrown> + Send + Sync + 'static,
    {
        Self {
            method: method.into(),
            path: path.into(),
            handler: Arc::new(handler),
            config: RouteConfig::default(),
        }
    }

    pub fn get<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Reply, Thrown> + Send + Sync + 'static,
    {
        Self::new("GET", path, handler)
    }

    pub fn post<F>(path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&ApiRequest) -> Result<Reply, Thrown> + Send + Sync + 'static,
    {
        Self::new("POST", path, handler)
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.config.description = Some(description.into());
        self
    }

    #[must_use]
    pub const fn with_server_timeout(mut self, timeout_ms: u64) -> Self {
        self.config.timeout.server = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.config.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn with_auth(mut self, strategy: impl Into<String>) -> Self {
        self.config.auth = Some(strategy.into());
        self
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

const ROUTABLE_METHODS: [Method; 9] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
    Method::CONNECT,
];

/// Method a route answers to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteMethod {
    Any,
    Only(Method),
}

impl RouteMethod {
    /// Parse a route method name.
    ///
    /// Extension methods are valid HTTP but cannot be routed, so they are
    /// reported as not implemented rather than as a configuration mistake.
    pub fn parse(name: &str) -> Result<Self, ServerError> {
        let name = name.trim();
        if name == "*" {
            return Ok(Self::Any);
        }
        let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes()).map_err(|e| {
            ServerError::configuration_with(format!("invalid route method {name:?}"), e)
        })?;
        if ROUTABLE_METHODS.contains(&method) {
            Ok(Self::Only(method))
        } else {
            Err(ServerError::not_implemented(format!(
                "routing extension method {method}"
            )))
        }
    }

    /// Lowercase name used in documentation, `None` for [`RouteMethod::Any`].
    pub fn doc_name(&self) -> Option<String> {
        match self {
            Self::Any => None,
            Self::Only(method) => Some(method.as_str().to_ascii_lowercase()),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Only(method) => f.write_str(method.as_str()),
        }
    }
}

/// A route ready to be handed to the server engine.
#[derive(Clone)]
pub struct NormalizedRoute {
    pub method: RouteMethod,
    pub path: String,
    /// Shim-wrapped handler.
    pub handler: Handler,
    /// Configuration with `timeout.server` set and the `api` tag present.
    pub config: RouteConfig,
}

impl NormalizedRoute {
    pub fn server_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout.server.unwrap_or_default())
    }
}

impl fmt::Debug for NormalizedRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedRoute")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Normalize a route list for registration.
///
/// Fails on an unparseable method, a path that does not start with `/`, a
/// `:param` style segment, or two routes answering the same method and path.
pub fn normalize_routes(
    routes: &[RouteDescriptor],
    global_timeout_ms: u64,
) -> Result<Vec<NormalizedRoute>, ServerError> {
    let mut seen: HashSet<(String, RouteMethod)> = HashSet::new();
    let mut any_paths: HashSet<String> = HashSet::new();
    let mut normalized = Vec::with_capacity(routes.len());

    for route in routes {
        let method = RouteMethod::parse(&route.method)?;
        validate_path(&route.path)?;

        let duplicate = match &method {
            RouteMethod::Any => {
                seen.iter().any(|(path, _)| path == &route.path)
                    || !any_paths.insert(route.path.clone())
            }
            RouteMethod::Only(_) => {
                any_paths.contains(&route.path)
                    || !seen.insert((route.path.clone(), method.clone()))
            }
        };
        if duplicate {
            return Err(ServerError::configuration(format!(
                "duplicate route {method} {}",
                route.path
            )));
        }

        normalized.push(NormalizedRoute {
            method,
            path: route.path.clone(),
            handler: wrap_handler(route.handler.clone()),
            config: route.config.normalized(global_timeout_ms),
        });
    }

    Ok(normalized)
}

fn validate_path(path: &str) -> Result<(), ServerError> {
    if !path.starts_with('/') {
        return Err(ServerError::configuration(format!(
            "route path {path:?} must start with '/'"
        )));
    }
    if path.split('/').any(|segment| segment.starts_with(':')) {
        return Err(ServerError::configuration(format!(
            "route path {path:?} uses ':param' segments, use '{{param}}' instead"
        )));
    }
    Ok(())
}
