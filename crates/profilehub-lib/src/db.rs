//! Persistence connector and the shared connection handle.
//!
//! The rest of the workspace treats the database as an opaque handle obtained
//! through a [`Connector`]. The production connector opens SQLite on a blocking
//! thread and probes it before handing it out.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::ConnectionError;
use crate::topology::DeploymentTopology;

/// Cheaply cloneable handle to one established connection.
///
/// Clones share the same underlying connection.
#[derive(Clone)]
pub struct DatabaseHandle {
    connection: Arc<Mutex<Connection>>,
    uri: Arc<str>,
}

impl DatabaseHandle {
    pub fn new(connection: Connection, uri: impl Into<Arc<str>>) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
            uri: uri.into(),
        }
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, ConnectionError> {
        let connection = Connection::open_in_memory().map_err(|e| ConnectionError::Open {
            uri: ":memory:".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(connection, ":memory:"))
    }

    /// The endpoint this handle was opened from.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// True when both handles share one underlying connection.
    pub fn same_connection(&self, other: &DatabaseHandle) -> bool {
        Arc::ptr_eq(&self.connection, &other.connection)
    }

    /// Run `f` with exclusive access to the connection.
    ///
    /// Blocks the calling thread while another caller holds the connection;
    /// async callers should wrap long statements in `spawn_blocking`.
    pub fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> T) -> T {
        let guard = self
            .connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    /// Round-trip a trivial statement.
    pub fn ping(&self) -> Result<(), ConnectionError> {
        self.with_connection(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .map(|_| ())
            .map_err(|e| ConnectionError::Probe {
                uri: self.uri.to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Debug for DatabaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseHandle")
            .field("uri", &self.uri)
            .finish_non_exhaustive()
    }
}

/// Establishes persistence connections.
///
/// Implementations perform exactly one attempt per call; retry policy belongs
/// to the caller.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, config: &DatabaseConfig) -> Result<DatabaseHandle, ConnectionError>;
}

/// Opens a SQLite database at the configured path or `file:` URI.
///
/// [`SqliteConnector::new`] opens read-write and creates a missing file.
#[derive(Debug, Clone, Copy)]
pub struct SqliteConnector {
    read_only: bool,
    create_missing: bool,
}

impl Default for SqliteConnector {
    fn default() -> Self {
        Self {
            read_only: false,
            create_missing: true,
        }
    }
}

impl SqliteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only on [`DeploymentTopology::ReadOnlyEdge`], read-write elsewhere.
    /// A missing database file is only created where the filesystem is writable.
    pub fn for_topology(topology: DeploymentTopology) -> Self {
        Self {
            read_only: topology.is_read_only(),
            create_missing: topology.has_writable_filesystem(),
        }
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn create_missing(mut self, create_missing: bool) -> Self {
        self.create_missing = create_missing;
        self
    }

    fn flags(&self) -> OpenFlags {
        let access = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else if self.create_missing {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE
        };
        access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX
    }

    fn open_blocking(&self, uri: &str) -> Result<DatabaseHandle, ConnectionError> {
        debug!(uri = %uri, read_only = self.read_only, "opening sqlite database");
        let connection =
            Connection::open_with_flags(uri, self.flags()).map_err(|e| ConnectionError::Open {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;

        let handle = DatabaseHandle::new(connection, uri);
        handle.ping()?;
        info!(uri = %uri, read_only = self.read_only, "sqlite database opened");
        Ok(handle)
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<DatabaseHandle, ConnectionError> {
        let connector = *self;
        let uri = config.uri.clone();
        tokio::task::spawn_blocking(move || connector.open_blocking(&uri))
            .await
            .map_err(|e| ConnectionError::Aborted(e.to_string()))?
    }
}
