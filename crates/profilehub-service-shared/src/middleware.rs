//! HTTP middleware shared by every topology.
//!
//! - [`TelemetryLayer`]: request ID, tracing span and HTTP metrics per request
//! - [`enforce_body_limit`]: rejects declared bodies above [`BODY_LIMIT_BYTES`]
//! - [`inject_connection`]: exposes the established handle as an extension
//! - [`cors_layer`]: mirrors the request origin with credentials allowed
//!
//! # Request ID Propagation
//!
//! The `X-Request-ID` header is used when present, otherwise a UUID v7 is
//! generated. The ID is recorded on the request span, stored in the request
//! extensions as [`RequestId`] and echoed on the response.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::{ConnectInfo, Request as AxumRequest, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response as AxumResponse};
use pin_project_lite::pin_project;
use tower::{Layer, Service};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info_span, Span};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 10 * 1024;

/// Header carrying the request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation ID of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    /// Use the caller's `X-Request-ID` when it is a non-empty string,
    /// otherwise mint a UUID v7.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get(REQUEST_ID_HEADER).map(HeaderValue::to_str) {
            Some(Ok(id)) if !id.is_empty() => Self(id.to_owned()),
            _ => Self::generate(),
        }
    }

    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metric label for a path, truncated to bound cardinality.
///
/// `/api/v1/user/42?x=1` becomes `/api/v1`, `/uploads/a.png` becomes `/uploads`.
pub fn path_label(path: &str) -> String {
    let path = path.split('?').next().unwrap_or(path);
    let segments: Vec<&str> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .take(2)
        .collect();
    match segments.as_slice() {
        [] => "/".to_string(),
        [first] => format!("/{first}"),
        [first, second] if *first == "api" => format!("/{first}/{second}"),
        [first, _] => format!("/{first}"),
        _ => "/".to_string(),
    }
}

fn status_bucket(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

/// Tags each request with a [`RequestId`] and a span, and records HTTP metrics.
///
/// Records `http_requests_total` (method, path, status bucket) and
/// `http_request_duration_seconds` (method, path).
#[derive(Debug, Clone, Default)]
pub struct TelemetryLayer;

impl<S> Layer<S> for TelemetryLayer {
    type Service = Telemetry<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Telemetry { inner }
    }
}

#[derive(Debug, Clone)]
pub struct Telemetry<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for Telemetry<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = TelemetryFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = path_label(req.uri().path());

        let request_id = RequestId::from_headers(req.headers());
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<std::net::SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string());
        req.extensions_mut().insert(request_id.clone());

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %method,
            uri = %req.uri(),
            remote_addr = remote_addr.as_deref().unwrap_or("-"),
        );

        let future = {
            let _enter = span.enter();
            tracing::debug!("handling request");
            self.inner.call(req)
        };

        TelemetryFuture {
            inner: future,
            start,
            method,
            path,
            request_id,
            span,
        }
    }
}

pin_project! {
    /// Echoes the request ID and records metrics once the response is ready.
    pub struct TelemetryFuture<F> {
        #[pin]
        inner: F,
        start: Instant,
        method: String,
        path: String,
        request_id: RequestId,
        span: Span,
    }
}

impl<F, ResBody, E> Future for TelemetryFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _enter = this.span.enter();

        let mut result = match this.inner.poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };

        let duration_secs = this.start.elapsed().as_secs_f64();
        let status = match &mut result {
            Ok(response) => {
                if let Ok(value) = HeaderValue::from_str(this.request_id.as_str()) {
                    response
                        .headers_mut()
                        .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
                }
                response.status().as_u16()
            }
            Err(_) => 500,
        };

        metrics::counter!(
            "http_requests_total",
            "method" => this.method.clone(),
            "path" => this.path.clone(),
            "status" => status_bucket(status)
        )
        .increment(1);
        metrics::histogram!(
            "http_request_duration_seconds",
            "method" => this.method.clone(),
            "path" => this.path.clone()
        )
        .record(duration_secs);

        tracing::info!(
            status,
            latency_ms = duration_secs * 1000.0,
            "request completed"
        );

        Poll::Ready(result)
    }
}

/// Reject requests whose declared `Content-Length` exceeds [`BODY_LIMIT_BYTES`].
///
/// Streamed bodies without a length are capped by axum's `DefaultBodyLimit`.
pub async fn enforce_body_limit(request: AxumRequest, next: Next) -> AxumResponse {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    match declared {
        Some(length) if length > BODY_LIMIT_BYTES => ApiError::PayloadTooLarge {
            limit: BODY_LIMIT_BYTES,
        }
        .into_response(),
        _ => next.run(request).await,
    }
}

/// Insert the established [`DatabaseHandle`](profilehub_lib::DatabaseHandle)
/// into the request extensions. Never starts a connection attempt.
pub async fn inject_connection(
    State(state): State<AppState>,
    mut request: AxumRequest,
    next: Next,
) -> AxumResponse {
    if let Some(handle) = state.connections().current() {
        request.extensions_mut().insert(handle);
    }
    next.run(request).await
}

/// CORS policy: any origin, mirrored back, with credentials.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
