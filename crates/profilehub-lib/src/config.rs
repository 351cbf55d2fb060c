//! Environment-driven configuration.
//!
//! Every recognized option lives in one of the structs below; nothing reads
//! the environment after [`AppConfig::from_env`] returns.
//!
//! # Environment Variables
//!
//! - `mongo_uri` (alias `DATABASE_URL`): persistence endpoint, required
//! - `DB_CONNECT_TIMEOUT_MS`: optional deadline for one connection attempt
//! - `PORT` (default 5000), `HOST` (default `0.0.0.0`)
//! - `DEPLOYMENT_TOPOLOGY`: `server`, `function` or `edge`
//! - `RESOURCE_ROOT`: parent of `files/` and `uploads/` (default: working directory)
//! - `REALTIME_ENABLED`: attach the socket transport (default true, server only)
//! - `SWAGGER_USERNAME` / `SWAGGER_PASSWORD`: docs credential
//! - `CLOUD_NAME` / `CLOUD_API_KEY` / `CLOUD_API_SECRET`: object storage

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::provision::ResourceDirectory;
use crate::topology::{DeploymentTopology, TOPOLOGY_ENV_VAR};

/// Port used when `PORT` is unset.
pub const DEFAULT_PORT: u16 = 5000;

/// Directories provisioned and served under the resource root.
pub const RESOURCE_FOLDERS: [&str; 2] = ["files", "uploads"];

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub topology: DeploymentTopology,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub resources: ResourceConfig,
    pub docs: Option<DocsCredentials>,
    pub object_storage: ObjectStorageConfig,
}

/// Options consumed by the persistence connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// SQLite path or `file:` URI.
    pub uri: String,
    /// Deadline applied by callers of the connection cache. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl DatabaseConfig {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            connect_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

/// Listener options for the long-running server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub realtime_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            realtime_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Location of the locally served directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
    pub root: PathBuf,
}

impl ResourceConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute-or-relative path of one of [`RESOURCE_FOLDERS`].
    pub fn folder(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// The directories the server expects to exist before it starts.
    pub fn directories(&self) -> Vec<ResourceDirectory> {
        RESOURCE_FOLDERS
            .iter()
            .map(|name| ResourceDirectory::required(self.folder(name)))
            .collect()
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Static credential guarding the documentation mount.
#[derive(Clone, PartialEq, Eq)]
pub struct DocsCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DocsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocsCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials for the external object store used by the upload handlers.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ObjectStorageConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl ObjectStorageConfig {
    /// True when all three credentials are present.
    pub fn is_configured(&self) -> bool {
        self.cloud_name.is_some() && self.api_key.is_some() && self.api_secret.is_some()
    }
}

impl fmt::Debug for ObjectStorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStorageConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AppConfig {
    /// Minimal configuration for `topology` pointing at `database_uri`.
    pub fn new(topology: DeploymentTopology, database_uri: impl Into<String>) -> Self {
        Self {
            topology,
            database: DatabaseConfig::new(database_uri),
            server: ServerConfig::default(),
            resources: ResourceConfig::default(),
            docs: None,
            object_storage: ObjectStorageConfig::default(),
        }
    }

    /// Read configuration from the process environment.
    ///
    /// `default_topology` applies when `DEPLOYMENT_TOPOLOGY` is unset, letting
    /// each binary pick the mode it was built for.
    pub fn from_env(default_topology: DeploymentTopology) -> Result<Self, ConfigError> {
        Self::from_lookup(default_topology, |name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary lookup function.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(default_topology: DeploymentTopology, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let topology = match get(TOPOLOGY_ENV_VAR) {
            Some(value) => value.parse()?,
            None => default_topology,
        };

        let uri = get("mongo_uri")
            .or_else(|| get("DATABASE_URL"))
            .ok_or(ConfigError::Missing { name: "mongo_uri" })?;

        let connect_timeout = match get("DB_CONNECT_TIMEOUT_MS") {
            Some(value) => {
                let millis: u64 = value
                    .parse()
                    .map_err(|e| ConfigError::invalid("DB_CONNECT_TIMEOUT_MS", &value, e))?;
                Some(Duration::from_millis(millis))
            }
            None => None,
        };

        let port = match get("PORT") {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::invalid("PORT", &value, e))?,
            None => DEFAULT_PORT,
        };

        let host = match get("HOST") {
            Some(value) => value
                .parse()
                .map_err(|e| ConfigError::invalid("HOST", &value, e))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let realtime_enabled = match get("REALTIME_ENABLED") {
            Some(value) => parse_bool("REALTIME_ENABLED", &value)?,
            None => true,
        };

        let docs = match (get("SWAGGER_USERNAME"), get("SWAGGER_PASSWORD")) {
            (Some(username), Some(password)) => Some(DocsCredentials { username, password }),
            _ => None,
        };

        Ok(Self {
            topology,
            database: DatabaseConfig { uri, connect_timeout },
            server: ServerConfig {
                host,
                port,
                realtime_enabled,
            },
            resources: ResourceConfig::new(get("RESOURCE_ROOT").unwrap_or_else(|| ".".into())),
            docs,
            object_storage: ObjectStorageConfig {
                cloud_name: get("CLOUD_NAME"),
                api_key: get("CLOUD_API_KEY"),
                api_secret: get("CLOUD_API_SECRET"),
            },
        })
    }

    pub fn with_topology(mut self, topology: DeploymentTopology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.resources = ResourceConfig::new(root);
        self
    }

    pub fn with_docs_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.docs = Some(DocsCredentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.server.port = port;
        self
    }

    /// Whether the real-time transport should be attached.
    pub fn realtime_active(&self) -> bool {
        self.server.realtime_enabled && self.topology.supports_realtime()
    }
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(name, value, "expected true or false")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_uri_is_set() {
        let config = AppConfig::from_lookup(
            DeploymentTopology::LongRunningServer,
            lookup(&[("mongo_uri", "data/app.db")]),
        )
        .unwrap();

        assert_eq!(config.topology, DeploymentTopology::LongRunningServer);
        assert_eq!(config.database.uri, "data/app.db");
        assert_eq!(config.database.connect_timeout, None);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.server.realtime_enabled);
        assert!(config.docs.is_none());
        assert!(!config.object_storage.is_configured());
        assert_eq!(config.resources.root, PathBuf::from("."));
    }

    #[test]
    fn uri_is_required() {
        let err = AppConfig::from_lookup(DeploymentTopology::ReadOnlyEdge, lookup(&[]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing { name: "mongo_uri" });
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = AppConfig::from_lookup(
            DeploymentTopology::FunctionPerInvocation,
            lookup(&[("mongo_uri", ""), ("DATABASE_URL", "fallback.db"), ("PORT", " ")]),
        )
        .unwrap();
        assert_eq!(config.database.uri, "fallback.db");
        assert_eq!(config.server.port, DEFAULT_PORT);
    }

    #[test]
    fn environment_overrides_the_default_topology() {
        let config = AppConfig::from_lookup(
            DeploymentTopology::FunctionPerInvocation,
            lookup(&[("mongo_uri", "x.db"), ("DEPLOYMENT_TOPOLOGY", "edge")]),
        )
        .unwrap();
        assert_eq!(config.topology, DeploymentTopology::ReadOnlyEdge);
        assert!(!config.realtime_active());
    }

    #[test]
    fn parses_all_recognized_options() {
        let config = AppConfig::from_lookup(
            DeploymentTopology::LongRunningServer,
            lookup(&[
                ("mongo_uri", "file:app.db?mode=rwc"),
                ("DB_CONNECT_TIMEOUT_MS", "2500"),
                ("PORT", "8081"),
                ("HOST", "127.0.0.1"),
                ("REALTIME_ENABLED", "off"),
                ("RESOURCE_ROOT", "/srv/profilehub"),
                ("SWAGGER_USERNAME", "docs"),
                ("SWAGGER_PASSWORD", "s3cret"),
                ("CLOUD_NAME", "acme"),
                ("CLOUD_API_KEY", "key"),
                ("CLOUD_API_SECRET", "secret"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.database.connect_timeout,
            Some(Duration::from_millis(2500))
        );
        assert_eq!(config.server.socket_addr(), "127.0.0.1:8081".parse().unwrap());
        assert!(!config.realtime_active());
        assert_eq!(
            config.resources.folder("uploads"),
            PathBuf::from("/srv/profilehub/uploads")
        );
        let docs = config.docs.as_ref().unwrap();
        assert_eq!(docs.username, "docs");
        assert!(config.object_storage.is_configured());
    }

    #[test]
    fn rejects_malformed_numbers() {
        let err = AppConfig::from_lookup(
            DeploymentTopology::LongRunningServer,
            lookup(&[("mongo_uri", "x.db"), ("PORT", "eighty")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));

        let err = AppConfig::from_lookup(
            DeploymentTopology::LongRunningServer,
            lookup(&[("mongo_uri", "x.db"), ("DB_CONNECT_TIMEOUT_MS", "-5")]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                name: "DB_CONNECT_TIMEOUT_MS",
                ..
            }
        ));
    }

    #[test]
    fn docs_need_both_halves_of_the_credential() {
        let config = AppConfig::from_lookup(
            DeploymentTopology::LongRunningServer,
            lookup(&[("mongo_uri", "x.db"), ("SWAGGER_USERNAME", "docs")]),
        )
        .unwrap();
        assert!(config.docs.is_none());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = AppConfig::new(DeploymentTopology::LongRunningServer, "x.db")
            .with_docs_credentials("docs", "hunter2");
        let storage = ObjectStorageConfig {
            cloud_name: Some("acme".into()),
            api_key: Some("key".into()),
            api_secret: Some("topsecret".into()),
        };

        let debug = format!("{:?} {:?}", config, storage);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("topsecret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn resource_directories_are_required_and_rooted() {
        let resources = ResourceConfig::new("/tmp/root");
        let dirs = resources.directories();
        assert_eq!(dirs.len(), 2);
        assert!(dirs.iter().all(|d| d.required));
        assert_eq!(dirs[0].path, PathBuf::from("/tmp/root/files"));
        assert_eq!(dirs[1].path, PathBuf::from("/tmp/root/uploads"));
    }
}
