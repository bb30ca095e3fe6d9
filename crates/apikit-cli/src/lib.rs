//! The apikit demo server.
//!
//! Builds the demo configuration from command-line arguments (or the
//! `DEMO_PORT` / `DEMO_AUTHENTICATION` environment variables). The binary in
//! `main.rs` only wires logging, parses arguments and starts the server.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Dev-dependencies used only by the integration tests
#[cfg(test)]
use axum as _;
#[cfg(test)]
use http_body_util as _;

// Dependencies used by the binary
use anyhow as _;
use apikit_axum as _;
use dotenvy as _;
use tokio as _;
use tracing as _;
use tracing_subscriber as _;

use std::io;

use apikit_core::{
    ApiConfig, ApiRequest, AuthStrategy, Reply, RouteDescriptor, ServerConfiguration,
    ServerSection, Thrown, Validation,
};
use clap::{ArgAction, Parser};
use serde_json::{Value, json};

/// Name of the demo authentication strategy.
pub const DEMO_STRATEGY: &str = "simple";

/// Server timeout of the `/timeout` route, in milliseconds.
pub const DEMO_TIMEOUT_MS: u64 = 200;

/// Run the apikit demo server.
#[derive(Debug, Parser)]
#[command(name = "apikit-demo")]
#[command(about = "Run the apikit demo server", version)]
pub struct DemoArgs {
    /// Port to listen on
    #[arg(long, env = "DEMO_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Enable basic authentication; only the value 1 enables it
    #[arg(
        long,
        env = "DEMO_AUTHENTICATION",
        default_value = "0",
        action = ArgAction::Set,
        value_parser = parse_authentication_flag
    )]
    pub authentication: bool,
}

/// Reads the leading integer of `value`; only `1` enables authentication.
fn parse_authentication_flag(value: &str) -> Result<bool, String> {
    let value = value.trim_start();
    let digits_end = value
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map_or(value.len(), |(i, _)| i);
    Ok(value[..digits_end].parse::<i64>() == Ok(1))
}

/// Configuration of the demo server.
pub fn demo_configuration(args: &DemoArgs) -> ServerConfiguration {
    let mut api = ApiConfig::new("Demo server", "1")
        .with_documentation(true)
        .with_routes(demo_routes());

    if args.authentication {
        api = api
            .with_authentication(vec![demo_strategy()])
            .with_route(
                RouteDescriptor::get("/hello-world-secure", |request| {
                    Ok(json!({
                        "hello": "world",
                        "user": request.credentials.clone().unwrap_or(Value::Null),
                    })
                    .into())
                })
                .with_description("Hello world, authenticated")
                .with_auth(DEMO_STRATEGY),
            );
    }

    ServerConfiguration::new(api, ServerSection::single(args.port))
}

fn demo_routes() -> Vec<RouteDescriptor> {
    vec![
        RouteDescriptor::get("/hello-world", |_| Ok(json!({ "hello": "world" }).into()))
            .with_description("Hello world"),
        RouteDescriptor::get("/hello-world-promise", |_| {
            Ok(Reply::deferred(async { Ok(json!({ "hello": "world" })) }))
        })
        .with_description("Hello world"),
        RouteDescriptor::get("/internal-server-error", |_| {
            Err(Thrown::error(io::Error::other("err")))
        }),
        RouteDescriptor::get("/internal-server-error-not-obj", |_| Err("err".into())),
        RouteDescriptor::get("/promise-unhandled-rejection", |_| {
            Ok(Reply::deferred(async {
                Err(Thrown::error(io::Error::other("err")))
            }))
        }),
        RouteDescriptor::get("/promise-unhandled-rejection-not-obj", |_| {
            Ok(Reply::deferred(async { Err(Thrown::from("err")) }))
        }),
        // Never replies; the server timeout answers instead.
        RouteDescriptor::get("/timeout", |_| Ok(Reply::deferred(std::future::pending())))
            .with_server_timeout(DEMO_TIMEOUT_MS),
    ]
}

fn demo_strategy() -> AuthStrategy {
    AuthStrategy::basic(
        DEMO_STRATEGY,
        |_: &ApiRequest, username: &str, password: &str| {
            if username == "john" && password == "secret" {
                Validation::valid(json!({ "id": 1, "name": "John Doe", "username": "john" }))
            } else {
                Validation::invalid()
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        DemoArgs::command().debug_assert();
    }

    #[test]
    fn test_explicit_args() {
        let args = DemoArgs::parse_from(["apikit-demo", "--port", "9000", "--authentication", "1"]);
        assert_eq!(args.port, 9000);
        assert!(args.authentication);
    }

    #[test]
    fn test_authentication_flag_parsing() {
        assert_eq!(parse_authentication_flag("1"), Ok(true));
        assert_eq!(parse_authentication_flag(" 01"), Ok(true));
        assert_eq!(parse_authentication_flag("1.5"), Ok(true));
        assert_eq!(parse_authentication_flag("0"), Ok(false));
        assert_eq!(parse_authentication_flag("2"), Ok(false));
        assert_eq!(parse_authentication_flag("yes"), Ok(false));
        assert_eq!(parse_authentication_flag(""), Ok(false));
    }

    #[test]
    fn test_demo_configuration_is_valid() {
        let config = demo_configuration(&DemoArgs {
            port: 8080,
            authentication: false,
        });
        config.validate().unwrap();
        assert!(config.api.has_documentation);
        assert!(!config.api.uses_authentication);
        assert_eq!(config.api.routes.len(), 7);
        assert_eq!(config.server.connections[0].port, 8080);
    }

    #[test]
    fn test_authentication_adds_secure_route() {
        let config = demo_configuration(&DemoArgs {
            port: 8080,
            authentication: true,
        });
        config.validate().unwrap();
        assert!(config.api.uses_authentication);
        assert_eq!(config.api.authentication_strategies[0].name, DEMO_STRATEGY);
        assert!(
            config
                .api
                .routes
                .iter()
                .any(|route| route.path == "/hello-world-secure")
        );
    }
}
