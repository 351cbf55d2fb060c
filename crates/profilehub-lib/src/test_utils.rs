//! Mock connectors for exercising the connection lifecycle.
//!
//! Available in this crate's tests and, through the `test-utils` feature, to
//! dependent crates:
//!
//! ```ignore
//! use profilehub_lib::test_utils::{MockConnector, MockOutcome};
//!
//! let (connector, gate) = MockConnector::succeeding().gated();
//! // ... start callers, then
//! gate.open();
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::config::DatabaseConfig;
use crate::db::{Connector, DatabaseHandle};
use crate::error::ConnectionError;

/// What a single mock connect call does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOutcome {
    /// Hand out a fresh in-memory database.
    Succeed,
    /// Refuse with [`ConnectionError::Open`].
    Fail,
}

/// Connector that counts calls and follows a script.
#[derive(Debug)]
pub struct MockConnector {
    calls: AtomicUsize,
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    gate: Option<watch::Receiver<bool>>,
}

/// Holds gated connect calls until [`ConnectGate::open`].
#[derive(Debug)]
pub struct ConnectGate(watch::Sender<bool>);

impl ConnectGate {
    pub fn open(&self) {
        let _ = self.0.send(true);
    }
}

impl MockConnector {
    pub fn succeeding() -> Self {
        Self::scripted([], MockOutcome::Succeed)
    }

    pub fn failing() -> Self {
        Self::scripted([], MockOutcome::Fail)
    }

    /// Play `outcomes` in order, then repeat `fallback` forever.
    pub fn scripted(outcomes: impl IntoIterator<Item = MockOutcome>, fallback: MockOutcome) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(outcomes.into_iter().collect()),
            fallback,
            gate: None,
        }
    }

    /// Make every call wait until the returned gate opens.
    pub fn gated(mut self) -> (Self, ConnectGate) {
        let (tx, rx) = watch::channel(false);
        self.gate = Some(rx);
        (self, ConnectGate(tx))
    }

    /// Number of connect calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> MockOutcome {
        self.script
            .lock()
            .map(|mut script| script.pop_front())
            .ok()
            .flatten()
            .unwrap_or(self.fallback)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &DatabaseConfig) -> Result<DatabaseHandle, ConnectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            let mut gate = gate.clone();
            // A dropped sender counts as open.
            let _ = gate.wait_for(|open| *open).await;
        }

        match self.next_outcome() {
            MockOutcome::Succeed => DatabaseHandle::open_in_memory(),
            MockOutcome::Fail => Err(ConnectionError::Open {
                uri: config.uri.clone(),
                message: "mock connector refused the connection".to_string(),
            }),
        }
    }
}
