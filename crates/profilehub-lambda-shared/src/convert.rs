//! Conversion between Lambda HTTP events and the axum application.

use axum::body::Body;
use axum::response::Response;
use http_body_util::BodyExt;
use lambda_http::{Body as LambdaBody, Request as LambdaRequest, Response as LambdaResponse};
use tracing::debug;

/// Turn an API Gateway / function URL event into an application request.
///
/// Headers, method and URI are preserved. The Lambda body is buffered, so it
/// is moved rather than streamed.
pub fn lambda_to_app_request(request: LambdaRequest) -> http::Request<Body> {
    let (parts, body) = request.into_parts();
    let body = match body {
        LambdaBody::Empty => Body::empty(),
        LambdaBody::Text(text) => Body::from(text),
        LambdaBody::Binary(bytes) => Body::from(bytes),
        _ => Body::empty(),
    };
    http::Request::from_parts(parts, body)
}

/// Buffer an application response into a Lambda response.
///
/// UTF-8 bodies become `Text`, anything else `Binary`.
pub async fn app_to_lambda_response(
    response: Response,
) -> Result<LambdaResponse<LambdaBody>, lambda_http::Error> {
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await?.to_bytes();

    let body = if bytes.is_empty() {
        LambdaBody::Empty
    } else {
        match String::from_utf8(bytes.to_vec()) {
            Ok(text) => LambdaBody::Text(text),
            Err(err) => LambdaBody::Binary(err.into_bytes()),
        }
    };

    debug!(status = %parts.status, "converted application response");
    Ok(LambdaResponse::from_parts(parts, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_request_keeps_method_uri_and_body() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/api/v1/user?page=2")
            .header("content-type", "application/json")
            .body(LambdaBody::Text("{\"name\":\"ada\"}".into()))
            .unwrap();

        let converted = lambda_to_app_request(request);

        assert_eq!(converted.method(), "POST");
        assert_eq!(converted.uri().query(), Some("page=2"));
        assert_eq!(converted.headers()["content-type"], "application/json");
        let body = converted.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"{\"name\":\"ada\"}");
    }

    #[tokio::test]
    async fn test_response_body_kinds() {
        let text = Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::from("{\"status\":\"fail\"}"))
            .unwrap();
        let converted = app_to_lambda_response(text).await.unwrap();
        assert_eq!(converted.status(), StatusCode::NOT_FOUND);
        assert!(matches!(converted.body(), LambdaBody::Text(t) if t.contains("fail")));

        let binary = Response::new(Body::from(vec![0xff, 0xd8, 0xff]));
        let converted = app_to_lambda_response(binary).await.unwrap();
        assert!(matches!(converted.body(), LambdaBody::Binary(b) if b == &[0xff, 0xd8, 0xff]));

        let empty = Response::new(Body::empty());
        let converted = app_to_lambda_response(empty).await.unwrap();
        assert!(matches!(converted.body(), LambdaBody::Empty));
    }
}
