#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by the integration tests
#[cfg(test)]
use http_body_util as _;
#[cfg(test)]
use reqwest as _;

pub mod dispatch;
pub mod documentation;
pub mod interceptor;
pub mod response;
pub mod server;

// Re-export primary types
pub use dispatch::{JsonBodyError, MAX_PAYLOAD_BYTES};
pub use documentation::{DOCUMENTATION_PATH, SWAGGER_PATH, documentation_page, swagger_document};
pub use interceptor::{InterceptorState, intercept};
pub use response::{ErrorReply, HandlerPayload, payload_response};
pub use server::{ApiServer, RunningServer, init_server};
