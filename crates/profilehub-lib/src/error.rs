use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Convenient result alias for the profilehub library.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read from the environment.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The persistence connection could not be established.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// A required resource directory could not be created.
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Raised while reading [`AppConfig`](crate::AppConfig) from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required variable was absent or empty.
    #[error("missing required environment variable {name}")]
    Missing { name: &'static str },

    /// A variable was present but could not be parsed.
    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        name: &'static str,
        value: impl Into<String>,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::Invalid {
            name,
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failure of a single connection attempt.
///
/// Cloneable: every caller waiting on the same attempt receives the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The database at `uri` could not be opened.
    #[error("failed to open database at {uri}: {message}")]
    Open { uri: String, message: String },

    /// The database opened but did not answer the liveness probe.
    #[error("database at {uri} failed the connection probe: {message}")]
    Probe { uri: String, message: String },

    /// The caller-imposed deadline elapsed before the attempt resolved.
    #[error("connection attempt did not resolve within {0:?}")]
    TimedOut(Duration),

    /// The task driving the attempt panicked or was torn down with the runtime.
    #[error("connection attempt aborted: {0}")]
    Aborted(String),
}

/// Raised when a resource directory cannot be created.
#[derive(Debug, Error)]
#[error("failed to create directory {path}: {source}")]
pub struct FilesystemError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_name_the_variable() {
        let missing = ConfigError::Missing { name: "mongo_uri" };
        assert!(missing.to_string().contains("mongo_uri"));

        let invalid = ConfigError::invalid("PORT", "abc", "not a number");
        let text = invalid.to_string();
        assert!(text.contains("PORT"));
        assert!(text.contains("\"abc\""));
        assert!(text.contains("not a number"));
    }

    #[test]
    fn connection_errors_compare_by_value() {
        let a = ConnectionError::Open {
            uri: "db.sqlite".into(),
            message: "denied".into(),
        };
        assert_eq!(a.clone(), a);
        assert_ne!(a, ConnectionError::TimedOut(Duration::from_secs(1)));
    }

    #[test]
    fn library_error_wraps_transparently() {
        let err: Error = ConnectionError::Aborted("boom".into()).into();
        assert_eq!(err.to_string(), "connection attempt aborted: boom");
    }
}
