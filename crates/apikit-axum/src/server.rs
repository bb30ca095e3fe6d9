//! Server construction and lifecycle.
//!
//! [`init_server`] validates a configuration and builds the complete axum
//! router. Nothing is bound until [`ApiServer::start`], which listens on every
//! configured connection and returns a [`RunningServer`] handle.

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use apikit_core::{
    ApiInfo, Connection, HttpError, Logger, NormalizedRoute, RouteMethod, ScopePolicy,
    ServerConfiguration, ServerError, StrategyRegistry, normalize_routes,
};
use axum::Router;
use axum::body::Body;
use axum::extract::Request;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, any, on};
use futures_util::future::join_all;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower::ServiceExt;
use tower_http::trace::TraceLayer;

use crate::dispatch::RouteEndpoint;
use crate::documentation;
use crate::interceptor::{InterceptorState, intercept};
use crate::response::ErrorReply;

const SERVER_TARGET: &str = "apikit::server";

/// A configured server, ready to start.
#[derive(Debug, Clone)]
pub struct ApiServer {
    router: Router,
    connections: Vec<Connection>,
    host: String,
    routes: Vec<NormalizedRoute>,
    info: ApiInfo,
}

/// Validate `config` and build the server.
///
/// Every failure is reported before any server object exists: invalid
/// configuration and route conflicts as [`ServerError::Configuration`],
/// documentation or strategy conflicts as [`ServerError::PluginRegistration`],
/// unroutable methods as [`ServerError::NotImplemented`].
pub fn init_server(config: ServerConfiguration) -> Result<ApiServer, ServerError> {
    config.validate()?;
    let ServerConfiguration { logs, api, server } = config;

    let routes = normalize_routes(&api.routes, api.global_timeout)?;
    let strategies = if api.uses_authentication {
        StrategyRegistry::register(&api.authentication_strategies)?
    } else {
        StrategyRegistry::default()
    };

    let mut router = Router::new();
    for route in &routes {
        router = register_route(router, route, &strategies)?;
    }

    let interceptor = InterceptorState::new(
        ScopePolicy::from_prefix(api.scope_prefix.clone()),
        Logger::from_config(&logs),
    );
    router = router
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(Arc::new(interceptor), intercept));

    let info = api.info();
    if api.has_documentation {
        router = router.merge(documentation::router(&info, &routes)?);
    }

    tracing::info!(
        target: SERVER_TARGET,
        name = %info.name,
        version = %info.version,
        routes = routes.len(),
        documentation = api.has_documentation,
        strategies = strategies.len(),
        "Server initialized"
    );

    Ok(ApiServer {
        router: router.layer(TraceLayer::new_for_http()),
        connections: server.connections,
        host: server.host,
        routes,
        info,
    })
}

fn register_route(
    router: Router,
    route: &NormalizedRoute,
    strategies: &StrategyRegistry,
) -> Result<Router, ServerError> {
    let strategy = match route.config.auth.as_deref() {
        Some(name) => Some(strategies.get(name).cloned().ok_or_else(|| {
            ServerError::configuration(format!(
                "route {} {} requires unknown strategy {name:?}",
                route.method, route.path
            ))
        })?),
        None => None,
    };

    let endpoint = RouteEndpoint::new(route.clone(), strategy);
    let handler = move |request: Request| endpoint.clone().call(request);
    let method_router: MethodRouter = match &route.method {
        RouteMethod::Any => any(handler),
        RouteMethod::Only(method) => {
            let filter = MethodFilter::try_from(method.clone()).map_err(|_| {
                ServerError::not_implemented(format!("routing method {method}"))
            })?;
            on(filter, handler)
        }
    };

    // The router panics on malformed templates and on conflicting paths, e.g.
    // two templates differing only in parameter names.
    let path = route.path.clone();
    panic::catch_unwind(AssertUnwindSafe(move || router.route(&path, method_router))).map_err(
        |_| {
            ServerError::configuration(format!(
                "route {} {} has an invalid or conflicting path",
                route.method, route.path
            ))
        },
    )
}

async fn not_found() -> Response {
    ErrorReply(HttpError::not_found()).into_response()
}

impl ApiServer {
    /// Bind every connection and start serving.
    ///
    /// All listeners are bound before any of them serves, so a bind failure
    /// leaves nothing running.
    pub async fn start(&self) -> Result<RunningServer, ServerError> {
        let mut listeners = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            let address = format!("{}:{}", self.host, connection.port);
            let listener = TcpListener::bind(&address)
                .await
                .map_err(|source| ServerError::Listen {
                    address: address.clone(),
                    source,
                })?;
            let local = listener
                .local_addr()
                .map_err(|source| ServerError::Listen { address, source })?;
            listeners.push((local, listener));
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::with_capacity(listeners.len());
        for (address, listener) in listeners {
            let router = self.router.clone();
            let mut stop = shutdown_rx.clone();
            let task = tokio::spawn(async move {
                axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let requested = stop.wait_for(|stopped| *stopped).await.is_ok();
                        // A dropped handle leaves the server running.
                        if !requested {
                            std::future::pending::<()>().await;
                        }
                    })
                    .await
            });
            tracing::info!(
                target: SERVER_TARGET,
                name = %self.info.name,
                %address,
                "Server running at: http://{address}"
            );
            tasks.push((address, task));
        }

        Ok(RunningServer { shutdown, tasks })
    }

    /// Start, then hand the running server to `callback`.
    pub async fn start_with<F>(&self, callback: F) -> Result<RunningServer, ServerError>
    where
        F: FnOnce(&RunningServer),
    {
        let running = self.start().await?;
        callback(&running);
        Ok(running)
    }

    /// Dispatch one request in-process, through the same router `start`
    /// serves.
    pub async fn inject(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {})
    }

    /// Registered routes, after normalization.
    pub fn routes(&self) -> &[NormalizedRoute] {
        &self.routes
    }

    pub const fn info(&self) -> &ApiInfo {
        &self.info
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Handle to a started server.
#[derive(Debug)]
pub struct RunningServer {
    shutdown: watch::Sender<bool>,
    tasks: Vec<(SocketAddr, JoinHandle<std::io::Result<()>>)>,
}

impl RunningServer {
    /// Bound addresses, in connection order.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        self.tasks.iter().map(|(address, _)| *address).collect()
    }

    /// Ask every listener to stop accepting and drain in-flight requests.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Wait until every listener has stopped.
    pub async fn wait(self) -> Result<(), ServerError> {
        let Self { shutdown, tasks } = self;
        let (addresses, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let results = join_all(handles).await;
        drop(shutdown);

        for (address, result) in addresses.into_iter().zip(results) {
            let outcome = result
                .map_err(std::io::Error::other)
                .and_then(|served| served);
            if let Err(source) = outcome {
                return Err(ServerError::Listen {
                    address: address.to_string(),
                    source,
                });
            }
        }
        tracing::info!(target: SERVER_TARGET, "Server stopped");
        Ok(())
    }

    /// Shut down and wait.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown();
        self.wait().await
    }
}
