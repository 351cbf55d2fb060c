//! Shared infrastructure for running profilehub on AWS Lambda.
//!
//! - [`handler_from_env`]: build the per-invocation handler at cold start
//! - [`run`]: the Lambda event loop
//! - [`invoke`]: one event through the handler, usable without the runtime
//! - [`init_tracing`]: JSON-formatted tracing for CloudWatch Logs
//!
//! Function and edge deployments share this crate; they differ only in the
//! topology passed to [`handler_from_env`].

mod convert;
mod runtime;
mod tracing_init;

pub use convert::{app_to_lambda_response, lambda_to_app_request};
pub use runtime::{handler_from_env, invoke, run};
pub use tracing_init::init_tracing;
