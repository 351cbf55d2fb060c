//! Idempotent creation of the local directories the server serves from.
//!
//! Callers gate this on [`DeploymentTopology::has_writable_filesystem`]; the
//! provisioner itself never inspects the topology.
//!
//! [`DeploymentTopology::has_writable_filesystem`]: crate::DeploymentTopology::has_writable_filesystem

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::FilesystemError;

/// A directory that should exist before the server starts accepting requests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDirectory {
    pub path: PathBuf,
    /// Failure to create a required directory aborts provisioning.
    pub required: bool,
}

impl ResourceDirectory {
    pub fn required(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: true,
        }
    }

    pub fn optional(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            required: false,
        }
    }
}

/// Outcome of one [`ResourceProvisioner::ensure`] call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: Vec<PathBuf>,
    pub existing: Vec<PathBuf>,
    /// Optional directories that could not be created.
    pub skipped: Vec<PathBuf>,
}

/// Creates missing resource directories, intermediate segments included.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceProvisioner;

impl ResourceProvisioner {
    pub fn new() -> Self {
        Self
    }

    /// Ensure every directory exists.
    ///
    /// A second call with the same set creates nothing.
    pub fn ensure<'a, I>(&self, directories: I) -> Result<ProvisionReport, FilesystemError>
    where
        I: IntoIterator<Item = &'a ResourceDirectory>,
    {
        let mut report = ProvisionReport::default();

        for directory in directories {
            if directory.path.is_dir() {
                debug!(path = %directory.path.display(), "resource directory present");
                report.existing.push(directory.path.clone());
                continue;
            }

            match create(&directory.path) {
                Ok(()) => {
                    info!(path = %directory.path.display(), "created resource directory");
                    report.created.push(directory.path.clone());
                }
                Err(err) if !directory.required => {
                    warn!(
                        path = %directory.path.display(),
                        error = %err,
                        "skipping optional resource directory"
                    );
                    report.skipped.push(directory.path.clone());
                }
                Err(err) => return Err(err),
            }
        }

        Ok(report)
    }
}

fn create(path: &Path) -> Result<(), FilesystemError> {
    fs::create_dir_all(path).map_err(|source| FilesystemError {
        path: path.to_path_buf(),
        source,
    })
}
