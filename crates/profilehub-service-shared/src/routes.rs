//! Prefix-mounted dispatch tree.
//!
//! A [`RouteTable`] is an ordered list of `(prefix, router)` bindings. A
//! request goes to the first binding, in mount order, whose prefix matches its
//! path; longer prefixes mounted later never win over an earlier match. The
//! matched prefix is stripped before the sub-router sees the request, while
//! the originally requested URI stays available through [`OriginalUri`].

use std::sync::Arc;

use axum::extract::{OriginalUri, Request};
use axum::http::uri::{PathAndQuery, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use thiserror::Error;
use tower::ServiceExt;
use tracing::debug;

use crate::error::{requested_target, ApiError};

/// A mount prefix that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("mount prefix must not be empty")]
    EmptyPrefix,

    #[error("mount prefix {0:?} must start with '/'")]
    RelativePrefix(String),
}

/// One `(prefix, router)` binding.
#[derive(Clone, Debug)]
pub struct Mount {
    prefix: String,
    router: Router,
}

impl Mount {
    /// Bind `router` below `prefix`. A trailing `/` on the prefix is ignored.
    pub fn new(prefix: &str, router: Router) -> Result<Self, RouteError> {
        Ok(Self {
            prefix: normalize_prefix(prefix)?,
            router,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The path the sub-router should see, when `path` falls under this mount.
    fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.prefix == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

fn normalize_prefix(prefix: &str) -> Result<String, RouteError> {
    let prefix = prefix.trim();
    if prefix.is_empty() {
        return Err(RouteError::EmptyPrefix);
    }
    if !prefix.starts_with('/') {
        return Err(RouteError::RelativePrefix(prefix.to_string()));
    }
    let trimmed = prefix.trim_end_matches('/');
    Ok(if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    })
}

/// Immutable, ordered set of mounts.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    mounts: Vec<Mount>,
}

impl RouteTable {
    /// Assemble a table from bindings, keeping their order.
    pub fn compose<I, P>(bindings: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (P, Router)>,
        P: AsRef<str>,
    {
        let mounts = bindings
            .into_iter()
            .map(|(prefix, router)| Mount::new(prefix.as_ref(), router))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { mounts })
    }

    pub fn from_mounts(mounts: Vec<Mount>) -> Self {
        Self { mounts }
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.mounts.iter().map(Mount::prefix)
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// The first mount, by mount order, that owns `path`.
    pub fn resolve(&self, path: &str) -> Option<&Mount> {
        self.mounts.iter().find(|mount| mount.strip(path).is_some())
    }

    /// Route one request through the table.
    pub async fn dispatch(&self, mut request: Request) -> Response {
        if request.extensions().get::<OriginalUri>().is_none() {
            let original = OriginalUri(request.uri().clone());
            request.extensions_mut().insert(original);
        }

        let path = request.uri().path().to_string();
        let Some((mount, rest)) = self
            .mounts
            .iter()
            .find_map(|mount| mount.strip(&path).map(|rest| (mount, rest)))
        else {
            let target = request
                .extensions()
                .get::<OriginalUri>()
                .map(|OriginalUri(uri)| requested_target(uri))
                .unwrap_or(path.as_str());
            return ApiError::not_found(target).into_response();
        };

        debug!(prefix = %mount.prefix, path = %path, "dispatching to mount");

        let uri = match rewrite_path(request.uri(), rest) {
            Ok(uri) => uri,
            Err(err) => return err.into_response(),
        };
        *request.uri_mut() = uri;

        match mount.router.clone().oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }

    /// Wrap the table in a router whose fallback performs the dispatch.
    pub fn into_router(self) -> Router {
        let table = Arc::new(self);
        Router::new().fallback(move |request: Request| {
            let table = Arc::clone(&table);
            async move { table.dispatch(request).await }
        })
    }
}

fn rewrite_path(uri: &Uri, path: &str) -> Result<Uri, ApiError> {
    let path_and_query = match uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| ApiError::Programming(format!("rewriting {uri}: {e}")))?,
    );
    Uri::from_parts(parts).map_err(|e| ApiError::Programming(format!("rewriting {uri}: {e}")))
}
