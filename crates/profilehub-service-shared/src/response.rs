//! Success envelope, the counterpart of [`ErrorBody`](crate::ErrorBody).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// `{"status":"success", ...data}` with the payload fields flattened in.
///
/// # Example
///
/// ```
/// use profilehub_service_shared::ApiResponse;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Profile {
///     handle: String,
/// }
///
/// let response = ApiResponse::new(Profile { handle: "ada".into() });
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,

    #[serde(flatten)]
    pub data: T,

    #[serde(skip)]
    pub code: Option<u16>,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
            code: None,
        }
    }

    /// Respond with a status other than 200, e.g. 201 for creations.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.code = Some(status.as_u16());
        self
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = self
            .code
            .and_then(|code| StatusCode::from_u16(code).ok())
            .unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}
