//! Server configuration and its validation.
//!
//! Declarative fields deserialize from camelCase JSON; routes, strategies and
//! extra log transports hold code and are attached in Rust. Defaults are
//! applied by construction and [`ServerConfiguration::validate`] runs once
//! before any server object exists.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::auth::AuthStrategy;
use crate::error::ServerError;
use crate::logging::LogTransport;
use crate::route::RouteDescriptor;

/// Default server timeout applied to routes without one, in milliseconds.
pub const DEFAULT_GLOBAL_TIMEOUT_MS: u64 = 2000;

/// Default bind address for connections.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Logging options.
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LogsConfig {
    /// Log server errors to the console through `tracing`.
    pub console: bool,
    /// Additional destinations for server error logs.
    #[serde(skip)]
    pub transports: Vec<Arc<dyn LogTransport>>,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            console: true,
            transports: Vec::new(),
        }
    }
}

impl fmt::Debug for LogsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogsConfig")
            .field("console", &self.console)
            .field("transports", &self.transports.len())
            .finish()
    }
}

/// API metadata, routes and features.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub name: String,
    pub version: String,
    #[serde(skip)]
    pub routes: Vec<RouteDescriptor>,
    #[serde(default)]
    pub has_documentation: bool,
    #[serde(default)]
    pub uses_authentication: bool,
    #[serde(skip)]
    pub authentication_strategies: Vec<AuthStrategy>,
    /// Server timeout for routes without their own, in milliseconds.
    #[serde(default = "default_global_timeout")]
    pub global_timeout: u64,
    /// Only responses to paths under this prefix are normalized. `None`
    /// normalizes every route.
    #[serde(default)]
    pub scope_prefix: Option<String>,
}

const fn default_global_timeout() -> u64 {
    DEFAULT_GLOBAL_TIMEOUT_MS
}

impl ApiConfig {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            routes: Vec::new(),
            has_documentation: false,
            uses_authentication: false,
            authentication_strategies: Vec::new(),
            global_timeout: DEFAULT_GLOBAL_TIMEOUT_MS,
            scope_prefix: None,
        }
    }

    #[must_use]
    pub fn with_routes(mut self, routes: Vec<RouteDescriptor>) -> Self {
        self.routes = routes;
        self
    }

    #[must_use]
    pub fn with_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    #[must_use]
    pub const fn with_documentation(mut self, enabled: bool) -> Self {
        self.has_documentation = enabled;
        self
    }

    /// Enable authentication with the given strategies.
    #[must_use]
    pub fn with_authentication(mut self, strategies: Vec<AuthStrategy>) -> Self {
        self.uses_authentication = true;
        self.authentication_strategies = strategies;
        self
    }

    #[must_use]
    pub const fn with_global_timeout(mut self, timeout_ms: u64) -> Self {
        self.global_timeout = timeout_ms;
        self
    }

    #[must_use]
    pub fn with_scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.scope_prefix = Some(prefix.into());
        self
    }

    pub fn info(&self) -> ApiInfo {
        ApiInfo {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

/// Name and version of an API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiInfo {
    pub name: String,
    pub version: String,
}

impl ApiInfo {
    /// Title used by the documentation endpoints.
    pub fn documentation_title(&self) -> String {
        format!("{} documentation", self.name)
    }
}

/// A listening connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
}

impl Connection {
    pub const fn new(port: u16) -> Self {
        Self { port }
    }
}

/// Ports are accepted as numbers or numeric strings.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let value = Value::deserialize(deserializer)?;
    let port = match &value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    port.and_then(|p| u16::try_from(p).ok()).ok_or_else(|| {
        D::Error::custom(format!("port must be an integer between 0 and 65535, got {value}"))
    })
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSection {
    pub connections: Vec<Connection>,
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_owned()
}

impl ServerSection {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self {
            connections,
            host: default_host(),
        }
    }

    /// A single connection on `port`.
    pub fn single(port: u16) -> Self {
        Self::new(vec![Connection::new(port)])
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

/// Complete input of `init_server`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfiguration {
    #[serde(default)]
    pub logs: LogsConfig,
    pub api: ApiConfig,
    pub server: ServerSection,
}

impl ServerConfiguration {
    pub fn new(api: ApiConfig, server: ServerSection) -> Self {
        Self {
            logs: LogsConfig::default(),
            api,
            server,
        }
    }

    #[must_use]
    pub fn with_logs(mut self, logs: LogsConfig) -> Self {
        self.logs = logs;
        self
    }

    /// Parse the declarative part of a configuration from JSON.
    ///
    /// Schema violations are reported as configuration errors. The result is
    /// validated before it is returned.
    pub fn from_json(value: Value) -> Result<Self, ServerError> {
        let configuration: Self = serde_json::from_value(value).map_err(|e| {
            ServerError::configuration_with("configuration does not match schema", e)
        })?;
        configuration.validate()?;
        Ok(configuration)
    }

    /// Check the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ServerError> {
        let api = &self.api;
        if api.name.trim().is_empty() {
            return Err(ServerError::configuration("api.name must not be empty"));
        }
        if api.version.trim().is_empty() {
            return Err(ServerError::configuration("api.version must not be empty"));
        }
        if self.server.connections.is_empty() {
            return Err(ServerError::configuration(
                "server.connections must contain at least one connection",
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(ServerError::configuration("server.host must not be empty"));
        }
        if let Some(prefix) = &api.scope_prefix {
            if !prefix.starts_with('/') {
                return Err(ServerError::configuration(format!(
                    "api.scopePrefix {prefix:?} must start with '/'"
                )));
            }
        }

        for route in &api.routes {
            let Some(strategy) = &route.config.auth else {
                continue;
            };
            if !api.uses_authentication {
                return Err(ServerError::configuration(format!(
                    "route {} {} requires strategy {strategy:?} but authentication is disabled",
                    route.method, route.path
                )));
            }
            if !api
                .authentication_strategies
                .iter()
                .any(|s| &s.name == strategy)
            {
                return Err(ServerError::configuration(format!(
                    "route {} {} requires unknown strategy {strategy:?}",
                    route.method, route.path
                )));
            }
        }

        Ok(())
    }
}
