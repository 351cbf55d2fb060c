//! Health check handlers for liveness and readiness probes.
//!
//! Neither probe ever starts a connection attempt; readiness only reports the
//! current state of the connection cache.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use profilehub_lib::ConnectionState;

use crate::AppState;

/// Health status response for liveness and readiness probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "not_ready".
    pub status: String,

    pub service: String,

    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionState>,
}

impl HealthStatus {
    pub fn alive(service: &str, version: &str) -> Self {
        Self {
            status: "ok".to_string(),
            service: service.to_string(),
            version: version.to_string(),
            topology: None,
            connection: None,
        }
    }

    /// Readiness snapshot; ready only once the connection is established.
    pub fn readiness(service: &str, version: &str, state: &AppState) -> Self {
        let connection = state.connection_state();
        let status = if connection == ConnectionState::Connected {
            "ok"
        } else {
            "not_ready"
        };
        Self {
            status: status.to_string(),
            service: service.to_string(),
            version: version.to_string(),
            topology: Some(state.topology().to_string()),
            connection: Some(connection),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ok"
    }
}

/// Liveness probe handler. Always 200 while the process serves requests.
///
/// ```text
/// GET /health/live
/// {"status":"ok","service":"profilehub-service-shared","version":"0.1.0"}
/// ```
pub async fn health_live() -> impl IntoResponse {
    let status = HealthStatus::alive(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    (StatusCode::OK, Json(status))
}

/// Readiness probe handler: 200 when connected, 503 otherwise.
///
/// ```text
/// GET /health/ready
/// {"status":"ok","service":"profilehub-service-shared","version":"0.1.0","topology":"server","connection":"connected"}
/// ```
pub async fn health_ready(State(state): State<AppState>) -> Response {
    let status = HealthStatus::readiness(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), &state);
    let code = if status.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::state_for;
    use profilehub_lib::DeploymentTopology;

    #[test]
    fn test_health_status_alive() {
        let status = HealthStatus::alive("test-service", "1.0.0");
        assert_eq!(status.status, "ok");
        assert!(status.connection.is_none());
        let json = serde_json::to_string(&status).unwrap();
        assert!(!json.contains("connection"));
    }

    #[tokio::test]
    async fn test_ready_is_503_until_connected() {
        let state = state_for(DeploymentTopology::LongRunningServer);

        let response = health_ready(State(state.clone())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(state.connections().attempts(), 0);

        state.ensure_connection().await.unwrap();
        let response = health_ready(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_readiness_serializes_state() {
        let state = state_for(DeploymentTopology::ReadOnlyEdge);
        let status = HealthStatus::readiness("svc", "0.1.0", &state);
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"connection\":\"uninitialized\""));
        assert!(json.contains("\"topology\":\"edge\""));
        assert!(!status.is_ready());
    }

    #[tokio::test]
    async fn test_ready_body_decodes_as_health_status() {
        let state = state_for(DeploymentTopology::FunctionPerInvocation);
        state.ensure_connection().await.unwrap();

        let body = crate::test_utils::body_bytes(health_ready(State(state)).await).await;
        let status: HealthStatus = serde_json::from_slice(&body).unwrap();

        assert_eq!(status.connection, Some(ConnectionState::Connected));
        assert_eq!(status.topology.as_deref(), Some("function"));
        assert!(status.is_ready());
    }
}
