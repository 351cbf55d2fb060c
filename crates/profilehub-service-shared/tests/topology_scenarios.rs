//! End-to-end startup scenarios for each deployment topology.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use tower::ServiceExt;

use profilehub_lib::test_utils::{MockConnector, MockOutcome};
use profilehub_lib::{ConnectionState, DeploymentTopology};
use profilehub_service_shared::{Bootstrap, BootstrapError};

use common::{body_bytes, body_json, config, free_port, get, http_get, request};

#[tokio::test]
async fn server_that_cannot_connect_never_listens() {
    let tmp = tempfile::tempdir().unwrap();
    let port = free_port();
    let config = config(DeploymentTopology::LongRunningServer, tmp.path()).with_port(port);
    let connector = Arc::new(MockConnector::failing());

    let err = Bootstrap::new(config, connector.clone())
        .start()
        .await
        .unwrap_err();

    assert!(matches!(err, BootstrapError::Connection(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(connector.calls(), 1);
    // The port was never taken.
    std::net::TcpListener::bind(("127.0.0.1", port)).unwrap();
    // Provisioning precedes the connection attempt.
    assert!(tmp.path().join("files").is_dir());
    assert!(tmp.path().join("uploads").is_dir());
}

#[tokio::test]
async fn server_serves_after_connecting() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(DeploymentTopology::LongRunningServer, tmp.path());

    let server = Bootstrap::new(config, Arc::new(MockConnector::succeeding()))
        .start()
        .await
        .unwrap();
    std::fs::write(tmp.path().join("uploads/hello.txt"), "hello from disk").unwrap();

    let addr = server.local_addr();
    assert_eq!(server.state().connection_state(), ConnectionState::Connected);
    assert!(server.realtime().is_some());

    let (status, _) = http_get(addr, "/health/ready").await;
    assert_eq!(status, 200);

    let (status, body) = http_get(addr, "/uploads/hello.txt").await;
    assert_eq!(status, 200);
    assert_eq!(body, "hello from disk");

    let (status, body) = http_get(addr, "/api/v1/unknown-path").await;
    assert_eq!(status, 404);
    assert!(body.contains("Can't find /api/v1/unknown-path on this server"));

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn server_without_realtime_has_no_socket_route() {
    let tmp = tempfile::tempdir().unwrap();
    let mut config = config(DeploymentTopology::LongRunningServer, tmp.path());
    config.server.realtime_enabled = false;

    let server = Bootstrap::new(config, Arc::new(MockConnector::succeeding()))
        .start()
        .await
        .unwrap();
    assert!(server.realtime().is_none());

    let (status, _) = http_get(server.local_addr(), "/socket.io").await;
    assert_eq!(status, 404);
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn graceful_shutdown_on_signal() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(DeploymentTopology::LongRunningServer, tmp.path());

    Bootstrap::new(config, Arc::new(MockConnector::succeeding()))
        .serve_with_shutdown(async {})
        .await
        .unwrap();
}

#[tokio::test]
async fn function_failure_returns_fixed_500_and_keeps_serving() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(DeploymentTopology::FunctionPerInvocation, tmp.path());
    let connector = Arc::new(MockConnector::scripted(
        [MockOutcome::Fail],
        MockOutcome::Succeed,
    ));
    let handler = Bootstrap::new(config, connector.clone())
        .into_function_handler()
        .unwrap();

    let response = handler.handle(get("/api/v1/profile")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"status": "error", "message": "Internal Server Error"})
    );
    assert_eq!(handler.state().connection_state(), ConnectionState::Failed);

    let response = handler.handle(get("/api/v1/profile")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(connector.calls(), 2);
}

#[tokio::test]
async fn concurrent_cold_invocations_connect_once() {
    let tmp = tempfile::tempdir().unwrap();
    let config = config(DeploymentTopology::FunctionPerInvocation, tmp.path());
    let (connector, gate) = MockConnector::succeeding().gated();
    let connector = Arc::new(connector);
    let handler = Bootstrap::new(config, connector.clone())
        .into_function_handler()
        .unwrap();

    let invocations = (0..8).map(|_| handler.handle(get("/api/v1/user")));
    let release = async {
        while connector.calls() == 0 {
            tokio::task::yield_now().await;
        }
        gate.open();
    };
    let (responses, ()) = tokio::join!(futures::future::join_all(invocations), release);

    assert!(responses.iter().all(|r| r.status() == StatusCode::OK));
    assert_eq!(connector.calls(), 1);
}

#[tokio::test]
async fn unknown_path_is_404_under_every_topology() {
    let tmp = tempfile::tempdir().unwrap();
    for topology in [
        DeploymentTopology::LongRunningServer,
        DeploymentTopology::FunctionPerInvocation,
        DeploymentTopology::ReadOnlyEdge,
    ] {
        let app = Bootstrap::new(
            config(topology, tmp.path()),
            Arc::new(MockConnector::succeeding()),
        )
        .application()
        .unwrap();

        let response = app.oneshot(get("/api/v1/unknown-path")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{topology}");
        let body = body_json(response).await;
        assert_eq!(body["status"], "fail");
        assert_eq!(
            body["message"],
            "Can't find /api/v1/unknown-path on this server"
        );
        assert_eq!(body["statusCode"], 404);
    }
}

#[tokio::test]
async fn unsupported_method_on_a_known_path_is_404() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("uploads")).unwrap();
    std::fs::write(tmp.path().join("uploads/avatar.png"), b"\x89PNG").unwrap();
    let handler = Bootstrap::new(
        config(DeploymentTopology::FunctionPerInvocation, tmp.path()),
        Arc::new(MockConnector::succeeding()),
    )
    .into_function_handler()
    .unwrap();
    let server_app = Bootstrap::new(
        config(DeploymentTopology::LongRunningServer, tmp.path()),
        Arc::new(MockConnector::succeeding()),
    )
    .application()
    .unwrap();

    for (method, path) in [
        ("POST", "/api/v1/user"),
        ("DELETE", "/api/v1/profile/42"),
        ("POST", "/health/live"),
        ("PUT", "/health/ready"),
    ] {
        let response = handler.handle(request(method, path)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {path}");
        let body = body_json(response).await;
        assert_eq!(
            body,
            serde_json::json!({
                "status": "fail",
                "message": format!("Can't find {path} on this server"),
                "statusCode": 404,
            })
        );
    }

    for (method, path) in [("POST", "/uploads/avatar.png"), ("DELETE", "/metrics")] {
        let response = server_app
            .clone()
            .oneshot(request(method, path))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {path}");
        assert_eq!(body_json(response).await["statusCode"], 404);
    }
}

#[tokio::test]
async fn uploads_are_static_only_on_the_server() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(tmp.path().join("uploads")).unwrap();
    std::fs::write(tmp.path().join("uploads/avatar.png"), b"\x89PNG").unwrap();

    let server_app = Bootstrap::new(
        config(DeploymentTopology::LongRunningServer, tmp.path()),
        Arc::new(MockConnector::succeeding()),
    )
    .application()
    .unwrap();
    let response = server_app.oneshot(get("/uploads/avatar.png")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"\x89PNG");

    let edge = Bootstrap::new(
        config(DeploymentTopology::ReadOnlyEdge, tmp.path()),
        Arc::new(MockConnector::succeeding()),
    )
    .into_function_handler()
    .unwrap();
    let response = edge.handle(get("/uploads/avatar.png")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_json(response).await["message"]
        .as_str()
        .unwrap()
        .contains("/uploads/avatar.png"));
}

#[tokio::test]
async fn edge_has_no_filesystem_side_effects() {
    let tmp = tempfile::tempdir().unwrap();
    let handler = Bootstrap::new(
        config(DeploymentTopology::ReadOnlyEdge, tmp.path()),
        Arc::new(MockConnector::succeeding()),
    )
    .into_function_handler()
    .unwrap();

    let response = handler.handle(get("/api/v1/user")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = handler.handle(get("/socket.io")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}
