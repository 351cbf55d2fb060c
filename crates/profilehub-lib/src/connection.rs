//! Single-flight connection cache.
//!
//! Holds at most one in-flight or established persistence connection per
//! process context. Concurrent callers that arrive while an attempt is in
//! flight attach to that attempt instead of starting their own, so a burst of
//! cold-start requests produces exactly one call to [`Connector::connect`].
//!
//! ```text
//!                 ensure_connection()
//!  Uninitialized ──────────────────────▶ Connecting ──ok──▶ Connected
//!        ▲                                 │    ▲
//!        │                                err   │ ensure_connection()
//!        │                                 ▼    │
//!        └───────────── (never) ────────── Failed
//! ```
//!
//! The cache never retries, backs off or times out on its own. Callers that
//! need a deadline use [`ensure_within`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::DatabaseConfig;
use crate::db::{Connector, DatabaseHandle};
use crate::error::ConnectionError;

type PendingConnection = Shared<BoxFuture<'static, Result<DatabaseHandle, ConnectionError>>>;

enum CacheEntry {
    Uninitialized,
    Connecting {
        attempt: u64,
        pending: PendingConnection,
    },
    Connected(DatabaseHandle),
    Failed(ConnectionError),
}

/// Observable snapshot of the cache, for probes and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Connected,
    Failed,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

/// Process-wide connection cache.
///
/// Construct one per process (tests construct one per test) and share it by
/// reference or through an `Arc`.
pub struct ConnectionCache {
    connector: Arc<dyn Connector>,
    config: DatabaseConfig,
    entry: Arc<Mutex<CacheEntry>>,
    attempts: AtomicU64,
}

impl ConnectionCache {
    pub fn new(connector: Arc<dyn Connector>, config: DatabaseConfig) -> Self {
        Self {
            connector,
            config,
            entry: Arc::new(Mutex::new(CacheEntry::Uninitialized)),
            attempts: AtomicU64::new(0),
        }
    }

    /// Return the cached handle, establishing it first if necessary.
    ///
    /// Must be polled inside a Tokio runtime: the attempt itself runs on a
    /// spawned task so it completes even if every caller goes away.
    pub async fn ensure_connection(&self) -> Result<DatabaseHandle, ConnectionError> {
        let pending = {
            let mut entry = lock(&self.entry);
            match &*entry {
                CacheEntry::Connected(handle) => return Ok(handle.clone()),
                CacheEntry::Connecting { attempt, pending } => {
                    debug!(attempt = *attempt, "joining in-flight connection attempt");
                    pending.clone()
                }
                CacheEntry::Uninitialized | CacheEntry::Failed(_) => {
                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    let pending = self.start_attempt(attempt);
                    *entry = CacheEntry::Connecting {
                        attempt,
                        pending: pending.clone(),
                    };
                    pending
                }
            }
        };

        pending.await
    }

    /// The established handle, without triggering an attempt.
    pub fn current(&self) -> Option<DatabaseHandle> {
        match &*lock(&self.entry) {
            CacheEntry::Connected(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        match &*lock(&self.entry) {
            CacheEntry::Uninitialized => ConnectionState::Uninitialized,
            CacheEntry::Connecting { .. } => ConnectionState::Connecting,
            CacheEntry::Connected(_) => ConnectionState::Connected,
            CacheEntry::Failed(_) => ConnectionState::Failed,
        }
    }

    /// The error of the most recent attempt, while the cache is `Failed`.
    pub fn last_error(&self) -> Option<ConnectionError> {
        match &*lock(&self.entry) {
            CacheEntry::Failed(err) => Some(err.clone()),
            _ => None,
        }
    }

    /// Number of underlying connect attempts started so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    fn start_attempt(&self, attempt: u64) -> PendingConnection {
        let connector = Arc::clone(&self.connector);
        let config = self.config.clone();
        let entry = Arc::clone(&self.entry);

        info!(attempt, uri = %config.uri, "starting connection attempt");

        let task = tokio::spawn(async move {
            let outcome = connector.connect(&config).await;
            settle(&entry, attempt, &outcome);
            outcome
        });

        let entry = Arc::clone(&self.entry);
        async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    let err = ConnectionError::Aborted(join_error.to_string());
                    settle(&entry, attempt, &Err(err.clone()));
                    Err(err)
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for ConnectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionCache")
            .field("uri", &self.config.uri)
            .field("state", &self.state())
            .field("attempts", &self.attempts())
            .finish()
    }
}

/// Record the outcome of `attempt`, unless a newer attempt already replaced it.
fn settle(
    entry: &Mutex<CacheEntry>,
    attempt: u64,
    outcome: &Result<DatabaseHandle, ConnectionError>,
) {
    let mut entry = lock(entry);
    let current = matches!(&*entry, CacheEntry::Connecting { attempt: a, .. } if *a == attempt);
    if !current {
        return;
    }

    *entry = match outcome {
        Ok(handle) => {
            info!(attempt, uri = %handle.uri(), "connection established");
            CacheEntry::Connected(handle.clone())
        }
        Err(err) => {
            error!(attempt, error = %err, "connection attempt failed");
            CacheEntry::Failed(err.clone())
        }
    };
}

fn lock(entry: &Mutex<CacheEntry>) -> MutexGuard<'_, CacheEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ensure the connection, giving up after `timeout` when one is configured.
///
/// Timing out abandons the wait, not the attempt: the attempt keeps running
/// and later callers still observe its result.
pub async fn ensure_within(
    cache: &ConnectionCache,
    timeout: Option<Duration>,
) -> Result<DatabaseHandle, ConnectionError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, cache.ensure_connection())
            .await
            .unwrap_or(Err(ConnectionError::TimedOut(limit))),
        None => cache.ensure_connection().await,
    }
}
