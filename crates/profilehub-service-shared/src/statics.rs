//! Static file mounts for the provisioned resource folders.

use std::path::Path;

use axum::handler::HandlerWithoutStateExt;
use axum::Router;
use tower_http::services::ServeDir;

use profilehub_lib::{ResourceConfig, RESOURCE_FOLDERS};

use crate::error::not_found;

/// Serve the files below `dir`. Missing files and non-GET methods fall through
/// to the not-found body.
pub fn static_router(dir: impl AsRef<Path>) -> Router {
    let serve_dir = ServeDir::new(dir.as_ref())
        .call_fallback_on_method_not_allowed(true)
        .fallback(not_found.into_service());
    Router::new().fallback_service(serve_dir)
}

/// One `(prefix, router)` binding per resource folder, e.g. `/uploads`.
pub fn static_bindings(resources: &ResourceConfig) -> Vec<(String, Router)> {
    RESOURCE_FOLDERS
        .iter()
        .map(|folder| (format!("/{folder}"), static_router(resources.folder(folder))))
        .collect()
}
