//! Core domain types for apikit.
//!
//! This crate holds everything about an API server that does not depend on the
//! HTTP engine: the configuration model and its validation, route descriptors
//! and their normalization, the error taxonomy, the error classifier and
//! handler shim, and the response-normalization rules applied to every reply.
//!
//! Adapters (see `apikit-axum`) wire these pieces onto a concrete server.

#![deny(unused_crate_dependencies)]

pub mod auth;
pub mod classify;
pub mod config;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod http_error;
pub mod intercept;
pub mod logging;
pub mod request;
pub mod route;

// Re-export commonly used types for convenience
pub use auth::{
    AuthStrategy, BasicCredentials, CredentialValidator, StrategyRegistry, Validation,
    authenticate, parse_basic_authorization,
};
pub use classify::{NormalizedCause, Thrown, classify, classify_panic};
pub use config::{
    ApiConfig, ApiInfo, Connection, DEFAULT_GLOBAL_TIMEOUT_MS, DEFAULT_HOST, LogsConfig,
    ServerConfiguration, ServerSection,
};
pub use envelope::{SUCCESS_STATUS, error_envelope, error_title, slugify, success_envelope};
pub use error::{BoxError, ErrorKind, ServerError};
pub use handler::{DeferredReply, Handler, Reply, handler, uncaught_reply, wrap_handler};
pub use http_error::HttpError;
pub use intercept::{
    Normalization, ResponseView, ScopePolicy, ServerLog, UnhandledResponse, normalize_response,
};
pub use logging::{ConsoleTransport, LogLevel, LogRecord, LogTransport, Logger, MemoryTransport};
pub use request::ApiRequest;
pub use route::{
    API_TAG, NormalizedRoute, RouteConfig, RouteDescriptor, RouteMethod, TimeoutConfig,
    normalize_routes,
};
