//! Cold-start initialization and the Lambda event loop.
//!
//! The [`FunctionHandler`] is built once per execution environment and reused
//! by every warm invocation, so the connection cache it owns survives between
//! invocations. Cold-start timing is logged as `init_ms`.

use std::sync::Arc;
use std::time::Instant;

use lambda_http::{service_fn, Body as LambdaBody, Request as LambdaRequest, Response as LambdaResponse};
use tracing::{error, info};

use profilehub_lib::{AppConfig, DeploymentTopology, SqliteConnector};
use profilehub_service_shared::{Bootstrap, BootstrapError, FunctionHandler};

use crate::convert::{app_to_lambda_response, lambda_to_app_request};

/// Build the handler from the environment.
///
/// `default_topology` applies when `DEPLOYMENT_TOPOLOGY` is unset. Selecting
/// the server topology here is an error.
pub fn handler_from_env(
    default_topology: DeploymentTopology,
) -> Result<FunctionHandler, BootstrapError> {
    let start = Instant::now();
    let config = AppConfig::from_env(default_topology)?;
    let connector = Arc::new(SqliteConnector::for_topology(config.topology));
    let topology = config.topology;

    let handler = Bootstrap::new(config, connector)
        .into_function_handler()
        .inspect_err(|err| error!(error = %err, "function initialization failed"))?;

    info!(
        topology = %topology,
        init_ms = start.elapsed().as_millis(),
        "function handler initialized"
    );
    Ok(handler)
}

/// Handle one Lambda HTTP event.
pub async fn invoke(
    handler: &FunctionHandler,
    request: LambdaRequest,
) -> Result<LambdaResponse<LambdaBody>, lambda_http::Error> {
    let response = handler.handle(lambda_to_app_request(request)).await;
    app_to_lambda_response(response).await
}

/// Serve Lambda events until the runtime shuts the environment down.
pub async fn run(handler: FunctionHandler) -> Result<(), lambda_http::Error> {
    lambda_http::run(service_fn(move |request: LambdaRequest| {
        let handler = handler.clone();
        async move { invoke(&handler, request).await }
    }))
    .await
}
