//! Mount points for the resource APIs.
//!
//! The user, upload and profile handlers are provided by their own services;
//! these routers are the seam they attach to. Each answers `GET /` with a
//! descriptor of the resource and `GET /{id}` with the addressed entry, reading
//! the persistence handle from the request extensions.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Extension, Router};
use serde::{Deserialize, Serialize};

use profilehub_lib::DatabaseHandle;

use crate::error::{not_found, ApiError};
use crate::response::ApiResponse;
use crate::state::AppState;

/// API prefixes in mount order.
pub const API_PREFIXES: [&str; 3] = ["/api/v1/user", "/api/v1/upload", "/api/v1/profile"];

/// Resource exposed below one of [`API_PREFIXES`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    User,
    Upload,
    Profile,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::User, Resource::Upload, Resource::Profile];

    pub fn prefix(self) -> &'static str {
        match self {
            Self::User => API_PREFIXES[0],
            Self::Upload => API_PREFIXES[1],
            Self::Profile => API_PREFIXES[2],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource: Resource,
    pub storage: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_storage: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Clone)]
struct ResourceContext {
    resource: Resource,
    state: AppState,
}

/// Router for one resource.
pub fn resource_router(resource: Resource, state: AppState) -> Router {
    Router::new()
        .route("/", get(describe))
        .route("/{id}", get(describe_entry))
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .with_state(ResourceContext { resource, state })
}

/// Bindings for every resource, in mount order.
pub fn api_bindings(state: &AppState) -> Vec<(String, Router)> {
    Resource::ALL
        .iter()
        .map(|resource| {
            (
                resource.prefix().to_string(),
                resource_router(*resource, state.clone()),
            )
        })
        .collect()
}

async fn describe(
    State(ctx): State<ResourceContext>,
    handle: Option<Extension<DatabaseHandle>>,
) -> Result<ApiResponse<ResourceDescriptor>, ApiError> {
    Ok(ApiResponse::new(descriptor(&ctx, handle, None)?))
}

async fn describe_entry(
    State(ctx): State<ResourceContext>,
    Path(id): Path<String>,
    handle: Option<Extension<DatabaseHandle>>,
) -> Result<ApiResponse<ResourceDescriptor>, ApiError> {
    if !valid_id(&id) {
        return Err(ApiError::BadRequest(format!("Invalid {} id: {id}", resource_name(ctx.resource))));
    }
    Ok(ApiResponse::new(descriptor(&ctx, handle, Some(id))?))
}

fn descriptor(
    ctx: &ResourceContext,
    handle: Option<Extension<DatabaseHandle>>,
    id: Option<String>,
) -> Result<ResourceDescriptor, ApiError> {
    let storage = match handle {
        Some(Extension(handle)) => {
            handle.ping()?;
            "connected".to_string()
        }
        None => ctx.state.connection_state().as_str().to_string(),
    };

    let object_storage = (ctx.resource == Resource::Upload)
        .then(|| ctx.state.config().object_storage.is_configured());

    Ok(ResourceDescriptor {
        resource: ctx.resource,
        storage,
        object_storage,
        id,
    })
}

fn resource_name(resource: Resource) -> &'static str {
    match resource {
        Resource::User => "user",
        Resource::Upload => "upload",
        Resource::Profile => "profile",
    }
}

fn valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
