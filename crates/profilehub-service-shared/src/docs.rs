//! API documentation mount, guarded by a static Basic credential.
//!
//! Without configured credentials every request is challenged.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};

use profilehub_lib::DocsCredentials;

use crate::error::{not_found, ApiError};

/// Realm announced in the `WWW-Authenticate` challenge.
pub const DOCS_REALM: &str = "api-docs";

/// Router serving the OpenAPI document at `/` and `/openapi.json`.
pub fn docs_router(credentials: Option<DocsCredentials>, api_prefixes: &[&str]) -> Router {
    let document = Arc::new(openapi_document(api_prefixes));
    let serve = move || {
        let document = Arc::clone(&document);
        async move { Json(Value::clone(&document)) }
    };

    Router::new()
        .route("/", get(serve.clone()))
        .route("/openapi.json", get(serve))
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(
            Arc::new(credentials),
            require_basic_auth,
        ))
}

async fn require_basic_auth(
    State(credentials): State<Arc<Option<DocsCredentials>>>,
    request: Request,
    next: Next,
) -> Response {
    match credentials.as_ref() {
        Some(expected) if presented_credentials_match(request.headers(), expected) => {
            next.run(request).await
        }
        _ => challenge().into_response(),
    }
}

fn challenge() -> ApiError {
    ApiError::Unauthorized {
        message: "Authentication required to view the API documentation".to_string(),
        challenge: HeaderValue::from_str(&format!("Basic realm=\"{DOCS_REALM}\"")).ok(),
    }
}

fn presented_credentials_match(headers: &HeaderMap, expected: &DocsCredentials) -> bool {
    let Some((username, password)) = basic_credentials(headers) else {
        return false;
    };
    constant_time_eq(username.as_bytes(), expected.username.as_bytes())
        & constant_time_eq(password.as_bytes(), expected.password.as_bytes())
}

/// Decode `Authorization: Basic <base64(user:pass)>`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn openapi_document(api_prefixes: &[&str]) -> Value {
    let paths: serde_json::Map<String, Value> = api_prefixes
        .iter()
        .copied()
        .map(|prefix| {
            let tag = prefix.rsplit('/').next().unwrap_or(prefix);
            (
                prefix.to_string(),
                json!({
                    "get": {
                        "tags": [tag],
                        "summary": format!("{tag} resource"),
                        "responses": {
                            "200": { "description": "Success" },
                            "404": { "description": "Not found" },
                            "500": { "description": "Internal Server Error" }
                        }
                    }
                }),
            )
        })
        .collect();

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": "profilehub API",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "paths": paths,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn credentials() -> Option<DocsCredentials> {
        Some(DocsCredentials {
            username: "docs".into(),
            password: "s3cret".into(),
        })
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    async fn get_docs(router: Router, authorization: Option<String>) -> Response {
        let mut builder = axum::http::Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        router
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_missing_credentials_are_challenged() {
        let response = get_docs(docs_router(credentials(), &[]), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"api-docs\""
        );
    }

    #[tokio::test]
    async fn test_wrong_password_is_challenged() {
        let response = get_docs(
            docs_router(credentials(), &[]),
            Some(basic("docs", "guess")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unconfigured_credentials_challenge_everyone() {
        let response = get_docs(docs_router(None, &[]), Some(basic("docs", "s3cret"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_valid_credentials_receive_the_document() {
        let response = get_docs(
            docs_router(credentials(), &["/api/v1/user", "/api/v1/profile"]),
            Some(basic("docs", "s3cret")),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doc["openapi"], "3.0.3");
        assert!(doc["paths"]["/api/v1/user"]["get"].is_object());
        assert_eq!(doc["paths"]["/api/v1/profile"]["get"]["tags"][0], "profile");
    }

    #[test]
    fn test_basic_credentials_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&basic("a", "b:c")).unwrap(),
        );
        assert_eq!(
            basic_credentials(&headers),
            Some(("a".to_string(), "b:c".to_string()))
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(basic_credentials(&headers), None);
    }
}
