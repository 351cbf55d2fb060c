//! Test fixtures for handler and bootstrap tests.
//!
//! Enable the `test-utils` feature to use these from dependent crates.

use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use http_body_util::BodyExt;

use profilehub_lib::test_utils::MockConnector;
use profilehub_lib::{AppConfig, DeploymentTopology};

use crate::state::AppState;

/// Configuration rooted at `root`, listening on an ephemeral loopback port.
pub fn test_config(topology: DeploymentTopology, root: &Path) -> AppConfig {
    let mut config = AppConfig::new(topology, root.join("profilehub.db").to_string_lossy())
        .with_resource_root(root)
        .with_port(0);
    config.server.host = [127, 0, 0, 1].into();
    config
}

/// State backed by a connector that always succeeds.
pub fn state_for(topology: DeploymentTopology) -> AppState {
    let config = AppConfig::new(topology, "mock://profilehub");
    AppState::new(config, Arc::new(MockConnector::succeeding()))
}

/// State over `config` and `connector`, returning the connector for assertions.
pub fn state_with(config: AppConfig, connector: MockConnector) -> (AppState, Arc<MockConnector>) {
    let connector = Arc::new(connector);
    (AppState::new(config, connector.clone()), connector)
}

/// A bodiless GET request.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .unwrap_or_else(|e| panic!("invalid test uri {uri:?}: {e}"))
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("response body is not JSON ({e}): {bytes:?}"))
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap_or_else(|e| panic!("failed to read response body: {e}"))
        .to_bytes()
        .to_vec()
}
