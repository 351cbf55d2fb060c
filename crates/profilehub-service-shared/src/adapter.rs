//! Per-invocation request handler for the function and edge topologies.

use axum::body::{Body, Bytes};
use axum::http::Request;
use axum::response::Response;
use axum::{BoxError, Router};
use tower::ServiceExt;
use tracing::{debug, error};

use crate::error::connection_failure_response;
use crate::metrics::record_invocation;
use crate::state::AppState;

/// Ensures the connection, then delegates to the composed application.
///
/// A failed connection yields a 500 for that invocation only; the next
/// invocation tries again.
#[derive(Clone, Debug)]
pub struct FunctionHandler {
    state: AppState,
    app: Router,
}

impl FunctionHandler {
    pub(crate) fn new(state: AppState, app: Router) -> Self {
        Self { state, app }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn handle<B>(&self, request: Request<B>) -> Response
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let mut request = request.map(Body::new);
        let topology = self.state.topology();

        let handle = match self.state.ensure_connection().await {
            Ok(handle) => handle,
            Err(err) => {
                error!(
                    error = %err,
                    topology = %topology,
                    uri = %request.uri(),
                    "connection unavailable, short-circuiting invocation"
                );
                record_invocation(topology, false);
                return connection_failure_response();
            }
        };

        debug!(uri = %request.uri(), "delegating invocation");
        request.extensions_mut().insert(handle);
        record_invocation(topology, true);

        match self.app.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}
