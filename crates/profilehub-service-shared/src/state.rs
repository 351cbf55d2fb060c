//! Process context shared by every handler.
//!
//! One [`AppState`] is built per process and handed to axum through the
//! `State` extractor. It owns the configuration and the connection cache, so
//! there is no global connection slot: tests simply build a fresh state.

use std::sync::Arc;

use profilehub_lib::{
    ensure_within, AppConfig, ConnectionCache, ConnectionError, ConnectionState, Connector,
    DatabaseHandle, DeploymentTopology,
};

use crate::metrics::record_connection_outcome;

/// Shared application state for all axum handlers.
///
/// Cheaply cloneable; clones share the same connection cache.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use profilehub_lib::{AppConfig, DeploymentTopology, SqliteConnector};
/// use profilehub_service_shared::AppState;
///
/// let config = AppConfig::new(DeploymentTopology::LongRunningServer, "app.db");
/// let state = AppState::new(config, Arc::new(SqliteConnector::new()));
/// let handle = state.ensure_connection().await?;
/// ```
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    connections: ConnectionCache,
}

impl AppState {
    pub fn new(config: AppConfig, connector: Arc<dyn Connector>) -> Self {
        let connections = ConnectionCache::new(connector, config.database.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                connections,
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn topology(&self) -> DeploymentTopology {
        self.inner.config.topology
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.inner.connections
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connections.state()
    }

    /// Ensure the persistence connection, honoring the configured timeout.
    pub async fn ensure_connection(&self) -> Result<DatabaseHandle, ConnectionError> {
        let outcome = ensure_within(
            &self.inner.connections,
            self.inner.config.database.connect_timeout,
        )
        .await;
        record_connection_outcome(self.topology(), &outcome);
        outcome
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("topology", &self.inner.config.topology)
            .field("connection", &self.inner.connections.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use profilehub_lib::test_utils::{MockConnector, MockOutcome};
    use std::time::Duration;

    fn state_with(connector: MockConnector) -> (AppState, Arc<MockConnector>) {
        let connector = Arc::new(connector);
        let config = AppConfig::new(DeploymentTopology::FunctionPerInvocation, "mock.db");
        (AppState::new(config, connector.clone()), connector)
    }

    #[tokio::test]
    async fn test_clones_share_the_connection_cache() {
        let (state, connector) = state_with(MockConnector::succeeding());
        let other = state.clone();

        let a = state.ensure_connection().await.unwrap();
        let b = other.ensure_connection().await.unwrap();

        assert!(a.same_connection(&b));
        assert_eq!(connector.calls(), 1);
        assert_eq!(other.connection_state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_configured_timeout_is_applied() {
        let (connector, _gate) = MockConnector::succeeding().gated();
        let connector = Arc::new(connector);
        let mut config = AppConfig::new(DeploymentTopology::ReadOnlyEdge, "mock.db");
        config.database.connect_timeout = Some(Duration::from_millis(10));
        let state = AppState::new(config, connector);

        let err = state.ensure_connection().await.unwrap_err();
        assert_eq!(err, ConnectionError::TimedOut(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_failure_then_recovery() {
        let (state, connector) = state_with(MockConnector::scripted(
            [MockOutcome::Fail],
            MockOutcome::Succeed,
        ));

        assert!(state.ensure_connection().await.is_err());
        assert_eq!(state.connection_state(), ConnectionState::Failed);
        assert!(state.ensure_connection().await.is_ok());
        assert_eq!(connector.calls(), 2);
    }

    #[test]
    fn test_app_state_debug() {
        let (state, _) = state_with(MockConnector::succeeding());
        let debug = format!("{:?}", state);
        assert!(debug.contains("AppState"));
        assert!(debug.contains("FunctionPerInvocation"));
        assert!(debug.contains("Uninitialized"));
    }
}
