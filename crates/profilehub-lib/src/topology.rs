//! Deployment topology and the optional components each one enables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable selecting the topology.
pub const TOPOLOGY_ENV_VAR: &str = "DEPLOYMENT_TOPOLOGY";

/// How the current process is hosted.
///
/// Fixed at process start. Everything optional in the bootstrap (static mounts,
/// directory provisioning, the real-time transport) is gated on these queries
/// rather than on separate entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeploymentTopology {
    /// A long-lived process that owns its listener and local disk.
    LongRunningServer,
    /// A function invoked once per request behind a gateway.
    FunctionPerInvocation,
    /// A function on a read-only edge runtime.
    ReadOnlyEdge,
}

impl DeploymentTopology {
    /// Whether directories may be created under the resource root.
    pub fn has_writable_filesystem(self) -> bool {
        matches!(self, Self::LongRunningServer)
    }

    /// Whether a persistent socket transport can be attached.
    pub fn supports_realtime(self) -> bool {
        matches!(self, Self::LongRunningServer)
    }

    /// Whether `/files` and `/uploads` are served from local disk.
    pub fn serves_static_assets(self) -> bool {
        matches!(self, Self::LongRunningServer)
    }

    /// Whether the persistence endpoint must be opened read-only.
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnlyEdge)
    }

    /// Short name used in logs and configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LongRunningServer => "server",
            Self::FunctionPerInvocation => "function",
            Self::ReadOnlyEdge => "edge",
        }
    }
}

impl fmt::Display for DeploymentTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentTopology {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" | "long-running-server" => Ok(Self::LongRunningServer),
            "function" | "function-per-invocation" => Ok(Self::FunctionPerInvocation),
            "edge" | "read-only-edge" => Ok(Self::ReadOnlyEdge),
            _ => Err(ConfigError::invalid(
                TOPOLOGY_ENV_VAR,
                s,
                "expected one of: server, function, edge",
            )),
        }
    }
}
