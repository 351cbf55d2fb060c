//! HTTP layer for profilehub.
//!
//! Builds one axum application for every deployment topology and the two ways
//! of running it:
//!
//! - [`Bootstrap`]: assembles the [`RouteTable`] and runs the long-running
//!   server, or produces a [`FunctionHandler`] for function and edge runtimes
//! - [`AppState`]: process context holding the configuration and the
//!   connection cache
//! - [`ApiError`] / [`ErrorBody`]: the error boundary, the only source of
//!   client-visible error bodies
//! - [`RealtimeAttachment`]: WebSocket event transport for the server
//! - [`health`], [`metrics`], [`logging`], [`middleware`]: ambient plumbing
//!
//! # Request flow
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ TelemetryLayer ─ CatchPanic ─ CORS ─ body limit ─ connection │
//! │   /health/*, /metrics                                        │
//! │   RouteTable: /api-docs, /files, /uploads, /api/v1/{...}     │
//! │   not found ─▶ ApiError::NotFound                            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Testing Support
//!
//! The [`test_utils`] module provides fixtures and mock-backed state. Enable
//! the `test-utils` feature to access it from dependent crates.

mod adapter;
mod bootstrap;
mod docs;
mod error;
pub mod health;
mod listener;
pub mod logging;
pub mod metrics;
pub mod middleware;
mod realtime;
mod resources;
mod response;
mod routes;
mod state;
mod statics;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapter::FunctionHandler;
pub use bootstrap::{
    build_application, shutdown_signal, Bootstrap, BootstrapError, RunningServer, DOCS_PREFIX,
};
pub use docs::{docs_router, DOCS_REALM};
pub use error::{
    connection_failure_response, not_found, panic_response, ApiError, ErrorBody,
    CONNECTION_ERROR_MESSAGE, GENERIC_ERROR_MESSAGE,
};
pub use health::{health_live, health_ready, HealthStatus};
pub use listener::{BoundServer, ServerListener};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use metrics::{init_metrics, metrics_handler, MetricsConfig, MetricsError};
pub use middleware::{RequestId, TelemetryLayer, BODY_LIMIT_BYTES};
pub use realtime::{RealtimeAttachment, RealtimeEvent, RealtimeHandle, REALTIME_PATH};
pub use resources::{api_bindings, resource_router, Resource, ResourceDescriptor, API_PREFIXES};
pub use response::ApiResponse;
pub use routes::{Mount, RouteError, RouteTable};
pub use state::AppState;
pub use statics::{static_bindings, static_router};
