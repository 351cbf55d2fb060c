//! Error boundary for the HTTP surface.
//!
//! [`ApiError`] is the only producer of client-visible error bodies. Every
//! failure that reaches the client, including unmatched paths, handler panics
//! and connection failures, is rendered here into the uniform shape:
//!
//! ```json
//! {"status":"fail","message":"Can't find /nope on this server","statusCode":404}
//! ```
//!
//! `status` is `"fail"` for 4xx responses and `"error"` for 5xx responses.

use std::any::Any;

use axum::extract::OriginalUri;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use profilehub_lib::ConnectionError;

/// Message shown to clients for unexpected failures.
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong";

/// Message shown to clients when the persistence layer is unavailable.
pub const CONNECTION_ERROR_MESSAGE: &str = "Internal Server Error";

/// Failures a handler can surface to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Can't find {path} on this server")]
    NotFound { path: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Unauthorized {
        message: String,
        /// Value for the `WWW-Authenticate` response header.
        challenge: Option<HeaderValue>,
    },

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// Any expected failure with a status chosen by the handler.
    #[error("{message}")]
    Operational { status: StatusCode, message: String },

    /// A bug. The detail is logged, never shown.
    #[error("programming error: {0}")]
    Programming(String),

    #[error("persistence unavailable: {0}")]
    Connection(#[from] ConnectionError),
}

/// Uniform JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: String,
    pub message: String,
    #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let kind = if status.is_server_error() { "error" } else { "fail" };
        Self {
            status: kind.to_string(),
            message: message.into(),
            status_code: Some(status.as_u16()),
        }
    }

    /// Body returned by the function adapter when no connection can be made.
    pub fn connection_unavailable() -> Self {
        Self {
            status: "error".to_string(),
            message: CONNECTION_ERROR_MESSAGE.to_string(),
            status_code: None,
        }
    }
}

impl ApiError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn operational(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Operational {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Operational { status, .. } => *status,
            Self::Programming(_) | Self::Connection(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message the client is allowed to see.
    pub fn public_message(&self) -> String {
        match self {
            Self::Programming(_) => GENERIC_ERROR_MESSAGE.to_string(),
            Self::Connection(_) => CONNECTION_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody::new(self.status(), self.public_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Programming(detail) => error!(%detail, "unhandled error"),
            Self::Connection(err) => error!(error = %err, "request failed on persistence"),
            other if status.is_server_error() => error!(error = %other, "request failed"),
            other => warn!(status = status.as_u16(), error = %other, "request rejected"),
        }

        let mut response = (status, Json(self.body())).into_response();
        if let Self::Unauthorized {
            challenge: Some(challenge),
            ..
        } = self
        {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, challenge);
        }
        response
    }
}

/// Response sent by the function adapter when the connection cannot be ensured.
pub fn connection_failure_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody::connection_unavailable()),
    )
        .into_response()
}

/// Catch-all fallback: echoes the originally requested path and query.
pub async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::not_found(requested_target(&uri))
}

/// Path plus query string, as the client sent it.
pub(crate) fn requested_target(uri: &Uri) -> &str {
    uri.path_and_query()
        .map(|target| target.as_str())
        .unwrap_or_else(|| uri.path())
}

/// Translate a caught handler panic. Used with `CatchPanicLayer::custom`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    ApiError::Programming(detail).into_response()
}
