//! Error taxonomy for server initialization and request handling.
//!
//! Every failure apikit raises is a [`ServerError`]. Classification goes
//! through [`ServerError::kind`] rather than downcasting.

use std::io;

use thiserror::Error;

use crate::classify::NormalizedCause;

/// Boxed error used for wrapped causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Discriminant of a [`ServerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    PluginRegistration,
    NotImplemented,
    Uncaught,
    Listen,
}

impl ErrorKind {
    /// Stable name used in serialized log context.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Configuration => "ApikitConfigurationError",
            Self::PluginRegistration => "ApikitPluginRegistrationError",
            Self::NotImplemented => "ApikitNotImplementedError",
            Self::Uncaught => "ApikitUncaughtError",
            Self::Listen => "ApikitListenError",
        }
    }

    /// Whether this kind aborts server startup.
    pub const fn is_startup_fatal(self) -> bool {
        !matches!(self, Self::Uncaught)
    }
}

/// Errors raised while building, starting or running an API server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configuration object is invalid.
    #[error("Invalid configuration: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// A documentation or authentication integration could not be registered.
    #[error("Plugin registration failed: {message}")]
    PluginRegistration {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The requested feature path is not supported.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// A route handler failed synchronously.
    #[error("Uncaught error in route handler")]
    Uncaught(#[source] NormalizedCause),

    /// A connection could not be bound.
    #[error("Failed to listen on {address}")]
    Listen {
        address: String,
        #[source]
        source: io::Error,
    },
}

impl ServerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    pub fn configuration_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn plugin_registration(message: impl Into<String>) -> Self {
        Self::PluginRegistration {
            message: message.into(),
            source: None,
        }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::PluginRegistration { .. } => ErrorKind::PluginRegistration,
            Self::NotImplemented(_) => ErrorKind::NotImplemented,
            Self::Uncaught(_) => ErrorKind::Uncaught,
            Self::Listen { .. } => ErrorKind::Listen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_kind_discriminant() {
        assert_eq!(
            ServerError::configuration("bad").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            ServerError::plugin_registration("bad").kind(),
            ErrorKind::PluginRegistration
        );
        assert_eq!(
            ServerError::not_implemented("auth").kind(),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn test_configuration_with_source_exposes_cause() {
        let err = ServerError::configuration_with("port", "must be a number");
        assert_eq!(err.to_string(), "Invalid configuration: port");
        assert_eq!(err.source().unwrap().to_string(), "must be a number");
    }

    #[test]
    fn test_only_uncaught_is_request_scoped() {
        assert!(ErrorKind::Configuration.is_startup_fatal());
        assert!(ErrorKind::PluginRegistration.is_startup_fatal());
        assert!(ErrorKind::NotImplemented.is_startup_fatal());
        assert!(!ErrorKind::Uncaught.is_startup_fatal());
    }
}
