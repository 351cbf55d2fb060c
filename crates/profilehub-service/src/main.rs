//! profilehub API as a long-running HTTP server.
//!
//! Startup provisions the `files/` and `uploads/` folders, connects to the
//! database and only then begins listening. A failed connection ends the
//! process with exit status 1 before any port is bound.
//!
//! # Endpoints
//!
//! - `/api/v1/user`, `/api/v1/upload`, `/api/v1/profile` - resource routers
//! - `/api-docs` - OpenAPI document behind basic auth
//! - `/files`, `/uploads` - static resource folders
//! - `/socket.io` - realtime events (unless `REALTIME_ENABLED=false`)
//! - `GET /metrics`, `GET /health/live`, `GET /health/ready`
//!
//! # Configuration
//!
//! Read from the environment, and from a `.env` file in the working directory
//! if present.
//!
//! - `mongo_uri` (or `DATABASE_URL`) - database location (required)
//! - `PORT` / `HOST` - listen address (default `0.0.0.0:5000`)
//! - `RESOURCE_ROOT` - parent of the resource folders (default: working directory)
//! - `RUST_LOG`, `LOG_FORMAT`, `METRICS_ENABLED`

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info, warn};

use profilehub_lib::{AppConfig, DeploymentTopology, SqliteConnector};
use profilehub_service_shared::{
    init_logging, init_metrics, Bootstrap, BootstrapError, LoggingConfig, MetricsConfig,
};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    let logging_config = LoggingConfig::from_env().with_service("profilehub");
    init_logging(&logging_config);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }

    if let Err(e) = init_metrics(&MetricsConfig::from_env()) {
        warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    match run().await {
        Ok(()) => {
            info!("server stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "server failed to start");
            ExitCode::from(err.exit_code())
        }
    }
}

async fn run() -> Result<(), BootstrapError> {
    let config = AppConfig::from_env(DeploymentTopology::LongRunningServer)?;
    info!(
        topology = %config.topology,
        addr = %config.server.socket_addr(),
        "starting profilehub"
    );

    let connector = Arc::new(SqliteConnector::for_topology(config.topology));
    Bootstrap::new(config, connector).serve().await
}
