//! Core of the profilehub API bootstrap.
//!
//! This crate holds everything about starting the API that does not depend on
//! HTTP:
//!
//! - [`DeploymentTopology`]: long-running server, per-invocation function or
//!   read-only edge, and the optional components each enables
//! - [`AppConfig`]: environment-driven configuration
//! - [`ConnectionCache`]: single-flight cache for the persistence connection
//! - [`Connector`] / [`SqliteConnector`]: how a connection is established
//! - [`ResourceProvisioner`]: idempotent creation of local resource directories
//!
//! The HTTP layer lives in `profilehub-service-shared`.

pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod provision;
pub mod topology;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{
    AppConfig, DatabaseConfig, DocsCredentials, ObjectStorageConfig, ResourceConfig, ServerConfig,
    DEFAULT_PORT, RESOURCE_FOLDERS,
};
pub use connection::{ensure_within, ConnectionCache, ConnectionState};
pub use db::{Connector, DatabaseHandle, SqliteConnector};
pub use error::{ConfigError, ConnectionError, Error, FilesystemError, Result};
pub use provision::{ProvisionReport, ResourceDirectory, ResourceProvisioner};
pub use topology::{DeploymentTopology, TOPOLOGY_ENV_VAR};
