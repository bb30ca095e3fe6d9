//! Route handlers and the handler shim.
//!
//! A handler answers synchronously with a [`Reply`] or fails with a
//! [`Thrown`] value. [`wrap_handler`] puts a protective boundary around a
//! handler so that synchronous failures, panics included, become a 500 reply
//! instead of unwinding into the server engine.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::classify::{NormalizedCause, Thrown, classify, classify_panic};
use crate::error::ServerError;
use crate::http_error::HttpError;
use crate::request::ApiRequest;

/// A reply that completes later.
pub type DeferredReply = BoxFuture<'static, Result<Value, Thrown>>;

/// What a handler answers with.
pub enum Reply {
    /// A payload, sent with status 200.
    Value(Value),
    /// A payload produced asynchronously.
    Deferred(DeferredReply),
    /// An explicit error reply.
    Error(HttpError),
}

impl Reply {
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<Value, Thrown>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<HttpError> for Reply {
    fn from(err: HttpError) -> Self {
        Self::Error(err)
    }
}

impl fmt::Debug for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

/// A route handler.
pub type Handler = Arc<dyn Fn(&ApiRequest) -> Result<Reply, Thrown> + Send + Sync>;

/// Box a closure as a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&ApiRequest) -> Result<Reply, Thrown> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a handler so that synchronous failures become an uncaught 500 reply.
///
/// The wrapped handler never returns `Err` and never unwinds. A
/// [`Reply::Deferred`] is passed through as is: failures of the deferred value
/// happen after the handler returned and are not seen here.
pub fn wrap_handler(inner: Handler) -> Handler {
    Arc::new(move |request: &ApiRequest| {
        let cause = match panic::catch_unwind(AssertUnwindSafe(|| inner(request))) {
            Ok(Ok(reply)) => return Ok(reply),
            Ok(Err(thrown)) => classify(thrown),
            Err(payload) => classify_panic(payload),
        };
        Ok(uncaught_reply(cause))
    })
}

/// The reply sent for a handler that failed synchronously.
pub fn uncaught_reply(cause: NormalizedCause) -> Reply {
    Reply::Error(HttpError::internal(ServerError::Uncaught(cause)))
}
