//! AWS Lambda function serving the profilehub API.
//!
//! Runs the function topology unless `DEPLOYMENT_TOPOLOGY=edge` selects the
//! read-only edge. The persistence connection is established lazily by the
//! first invocation and reused while the execution environment stays warm.

use lambda_runtime::Error;
use tracing::error;

use profilehub_lambda_shared::{handler_from_env, init_tracing, run};
use profilehub_lib::DeploymentTopology;

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let handler = handler_from_env(DeploymentTopology::FunctionPerInvocation).map_err(|err| {
        error!(error = %err, "refusing to start");
        err
    })?;

    run(handler).await
}
