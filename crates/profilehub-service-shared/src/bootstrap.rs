//! Topology-aware application bootstrap.
//!
//! One [`Bootstrap`] assembles the application for every topology. It then
//! hands it to one of two entry strategies:
//!
//! - [`Bootstrap::serve`] (long-running server): provision resource folders,
//!   attach realtime, block until the persistence connection is established,
//!   and only then bind the socket.
//! - [`Bootstrap::into_function_handler`] (function / edge): a
//!   [`FunctionHandler`] that ensures the connection on every invocation.
//!
//! ```text
//! compose routes ─▶ provision dirs ─▶ listener ─▶ realtime ─▶ ensure_connection ─▶ bind + serve
//!                   (writable fs)      (unbound)   (enabled)        │
//!                                                                 failure ─▶ BootstrapError (exit 1)
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::{middleware, Router};
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tower_http::catch_panic::CatchPanicLayer;
use tracing::{error, info, warn};

use profilehub_lib::{
    AppConfig, ConfigError, ConnectionError, Connector, DeploymentTopology, FilesystemError,
    ResourceProvisioner,
};

use crate::adapter::FunctionHandler;
use crate::docs::docs_router;
use crate::error::{not_found, panic_response};
use crate::health::{health_live, health_ready};
use crate::listener::ServerListener;
use crate::metrics::metrics_handler;
use crate::middleware::{
    cors_layer, enforce_body_limit, inject_connection, TelemetryLayer, BODY_LIMIT_BYTES,
};
use crate::realtime::{RealtimeAttachment, RealtimeHandle};
use crate::resources::api_bindings;
use crate::routes::{RouteError, RouteTable};
use crate::state::AppState;
use crate::statics::static_bindings;

/// Prefix of the documentation mount.
pub const DOCS_PREFIX: &str = "/api-docs";

/// Startup failures. Every variant is fatal for the server process.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error(transparent)]
    Provision(#[from] FilesystemError),

    #[error("could not establish the persistence connection: {0}")]
    Connection(#[from] ConnectionError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("server terminated: {0}")]
    Serve(#[source] io::Error),

    #[error("{operation} is not available under the {topology} topology")]
    Topology {
        operation: &'static str,
        topology: DeploymentTopology,
    },
}

impl BootstrapError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }
}

/// Assembles the application for the configured topology.
#[derive(Debug)]
pub struct Bootstrap {
    state: AppState,
    api_bindings: Option<Vec<(String, Router)>>,
}

impl Bootstrap {
    pub fn new(config: AppConfig, connector: Arc<dyn Connector>) -> Self {
        Self::from_state(AppState::new(config, connector))
    }

    pub fn from_state(state: AppState) -> Self {
        Self {
            state,
            api_bindings: None,
        }
    }

    /// Replace the default user/upload/profile routers.
    pub fn with_api_bindings(mut self, bindings: Vec<(String, Router)>) -> Self {
        self.api_bindings = Some(bindings);
        self
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn topology(&self) -> DeploymentTopology {
        self.state.topology()
    }

    /// Mount order: docs, static folders (server only), then the API.
    pub fn route_table(&self) -> Result<RouteTable, RouteError> {
        let config = self.state.config();
        let api = self
            .api_bindings
            .clone()
            .unwrap_or_else(|| api_bindings(&self.state));

        let docs = {
            let prefixes: Vec<&str> = api.iter().map(|(prefix, _)| prefix.as_str()).collect();
            docs_router(config.docs.clone(), &prefixes)
        };

        let mut bindings = vec![(DOCS_PREFIX.to_string(), docs)];
        if config.topology.serves_static_assets() {
            bindings.extend(static_bindings(&config.resources));
        }
        bindings.extend(api);

        RouteTable::compose(bindings)
    }

    /// The complete application: probes, route table and middleware.
    pub fn application(&self) -> Result<Router, BootstrapError> {
        Ok(build_application(&self.state, self.route_table()?))
    }

    /// Run the server until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> Result<(), BootstrapError> {
        self.serve_with_shutdown(shutdown_signal()).await
    }

    /// Run the server until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> Result<(), BootstrapError>
    where
        F: Future<Output = ()> + Send,
    {
        self.start().await?.run_until(shutdown).await
    }

    /// Perform the startup sequence and begin accepting connections.
    ///
    /// No socket is bound unless the connection is established.
    pub async fn start(self) -> Result<RunningServer, BootstrapError> {
        let topology = self.topology();
        if topology != DeploymentTopology::LongRunningServer {
            return Err(BootstrapError::Topology {
                operation: "a long-running server",
                topology,
            });
        }

        let table = self.route_table()?;
        let config = self.state.config();

        if topology.has_writable_filesystem() {
            let report = ResourceProvisioner::new().ensure(&config.resources.directories())?;
            info!(
                created = report.created.len(),
                existing = report.existing.len(),
                "resource folders ready"
            );
        }

        let addr = config.server.socket_addr();
        let mut listener = ServerListener::new(addr, build_application(&self.state, table));
        let realtime = config
            .realtime_active()
            .then(|| RealtimeAttachment::attach(&mut listener));

        info!(uri = %config.database.uri, "connecting before accepting traffic");
        if let Err(err) = self.state.ensure_connection().await {
            error!(error = %err, "persistence connection failed, not listening");
            return Err(err.into());
        }

        let bound = listener
            .bind()
            .await
            .map_err(|source| BootstrapError::Bind { addr, source })?;
        let local_addr = bound.local_addr();

        let (shutdown, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(bound.serve(async move {
            let _ = stopped.await;
        }));

        info!(addr = %local_addr, topology = %topology, "server started");
        Ok(RunningServer {
            local_addr,
            state: self.state,
            realtime,
            shutdown,
            task,
        })
    }

    /// Per-invocation handler for the function and edge topologies.
    pub fn into_function_handler(self) -> Result<FunctionHandler, BootstrapError> {
        let topology = self.topology();
        if topology == DeploymentTopology::LongRunningServer {
            return Err(BootstrapError::Topology {
                operation: "a function handler",
                topology,
            });
        }
        let app = self.application()?;
        Ok(FunctionHandler::new(self.state, app))
    }
}

/// Wrap a route table with the health probes and the request middleware.
pub fn build_application(state: &AppState, table: RouteTable) -> Router {
    let mut probes = Router::new()
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready));
    if state.topology() == DeploymentTopology::LongRunningServer {
        probes = probes.route("/metrics", get(metrics_handler));
    }

    probes
        .method_not_allowed_fallback(not_found)
        .with_state(state.clone())
        .fallback_service(table.into_router())
        .layer(middleware::from_fn_with_state(state.clone(), inject_connection))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(middleware::from_fn(enforce_body_limit))
        .layer(cors_layer())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TelemetryLayer)
}

/// A server that is accepting connections.
#[derive(Debug)]
pub struct RunningServer {
    local_addr: SocketAddr,
    state: AppState,
    realtime: Option<RealtimeHandle>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn realtime(&self) -> Option<&RealtimeHandle> {
        self.realtime.as_ref()
    }

    /// Stop accepting, drain in-flight requests and wait for the server.
    pub async fn shutdown(self) -> Result<(), BootstrapError> {
        let _ = self.shutdown.send(());
        server_outcome(self.task.await)
    }

    /// Serve until `signal` resolves or the server stops on its own.
    pub async fn run_until<F>(self, signal: F) -> Result<(), BootstrapError>
    where
        F: Future<Output = ()> + Send,
    {
        let RunningServer {
            shutdown, mut task, ..
        } = self;

        tokio::select! {
            outcome = &mut task => return server_outcome(outcome),
            _ = signal => info!("shutdown signal received"),
        }

        let _ = shutdown.send(());
        server_outcome(task.await)
    }
}

fn server_outcome(outcome: Result<io::Result<()>, JoinError>) -> Result<(), BootstrapError> {
    match outcome {
        Ok(result) => result.map_err(BootstrapError::Serve),
        Err(join) => Err(BootstrapError::Serve(io::Error::other(join.to_string()))),
    }
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "unable to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
