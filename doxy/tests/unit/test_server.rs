//! HTTP endpoint tests

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode, Uri},
    response::Response,
    Router,
};
use doxy::proxy::router::RoutingMode;
use doxy::server::serve::app;
use tokio::net::TcpListener;
use tower::ServiceExt;

use crate::common::{app_state, ScriptedRunner};

async fn body_string(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn deploy(body: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/doxy")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Echo server standing in for a deployed container
async fn spawn_upstream() -> u16 {
    async fn echo(method: Method, uri: Uri, body: String) -> String {
        format!("{} {} {}", method, uri, body)
    }

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { axum::serve(listener, Router::new().fallback(echo)).await });
    port
}

#[tokio::test]
async fn test_deploy_success() {
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(8080, RoutingMode::Subdomain, runner).await;
    let service = app(Arc::new(state.server_state()));

    let response = service
        .oneshot(deploy(r#"{"deploymentName": "foo"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "Deployed!");
    assert_eq!(state.registry.lookup("foo"), Some(0));
}

#[tokio::test]
async fn test_deploy_rejects_bad_requests() {
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(8080, RoutingMode::Subdomain, runner.clone()).await;
    let service = app(Arc::new(state.server_state()));

    let response = service
        .clone()
        .oneshot(deploy(r#"{"deploymentName": ""}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("No deployment name specified."));

    let response = service.oneshot(deploy("{not json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Could not decode JSON body."));

    assert!(state.registry.is_empty());
    assert!(runner.steps().is_empty());
}

#[tokio::test]
async fn test_deploy_failure_reports_command_output() {
    let runner = Arc::new(ScriptedRunner::failing_on("docker", "build"));
    let state = app_state(8080, RoutingMode::Subdomain, runner).await;
    let service = app(Arc::new(state.server_state()));

    let response = service
        .oneshot(deploy(r#"{"deploymentName": "foo", "dockerfile": "web.Dockerfile"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_string(response).await;
    assert!(body.contains("docker build -t image0 -f web.Dockerfile ."));
    assert!(body.contains("stdout:\nSending build context"));
    assert!(body.contains("stderr:\nunable to prepare context"));
    assert!(state.registry.is_empty());
}

#[tokio::test]
async fn test_subdomain_proxy_to_deployment() {
    let upstream_port = spawn_upstream().await;
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(upstream_port, RoutingMode::Subdomain, runner).await;
    let service = app(Arc::new(state.server_state()));

    let response = service
        .clone()
        .oneshot(deploy(r#"{"deploymentName": "foo"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/items?page=2")
        .header(header::HOST, "foo.telltale.xyz")
        .body(Body::from("hello"))
        .unwrap();
    let response = service.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "POST /items?page=2 hello");

    let request = Request::builder()
        .uri("/")
        .header(header::HOST, "bar.telltale.xyz")
        .body(Body::empty())
        .unwrap();
    let response = service.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "Deployment bar not found.");

    let request = Request::builder()
        .uri("/")
        .header(header::HOST, "telltale.xyz")
        .body(Body::empty())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_string(response).await, "No deployment prefix found.");
}

#[tokio::test]
async fn test_path_proxy_strips_prefix() {
    let upstream_port = spawn_upstream().await;
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(upstream_port, RoutingMode::Path, runner).await;
    let service = app(Arc::new(state.server_state()));

    let response = service
        .clone()
        .oneshot(deploy(r#"{"deploymentName": "foo"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = Request::builder()
        .uri("/foo/api/items")
        .body(Body::empty())
        .unwrap();
    let response = service.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "GET /api/items ");

    let request = Request::builder()
        .uri("/bar/api/items")
        .body(Body::empty())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unreachable_container_is_bad_gateway() {
    // reserve a port, then free it so nothing is listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(port, RoutingMode::Subdomain, runner).await;
    let service = app(Arc::new(state.server_state()));

    service
        .clone()
        .oneshot(deploy(r#"{"deploymentName": "foo"}"#))
        .await
        .unwrap();

    let request = Request::builder()
        .uri("/")
        .header(header::HOST, "foo.telltale.xyz")
        .body(Body::empty())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_list_deployments() {
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(8080, RoutingMode::Subdomain, runner).await;
    let service = app(Arc::new(state.server_state()));

    for name in ["web", "api"] {
        let response = service
            .clone()
            .oneshot(deploy(&format!(r#"{{"deploymentName": "{}"}}"#, name)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = Request::builder()
        .uri("/doxy/deployments")
        .body(Body::empty())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["deployments"][0]["name"], "api");
    assert_eq!(json["deployments"][0]["hostPort"], 8081);
    assert_eq!(json["deployments"][1]["name"], "web");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dropped_deploy_request_finishes_build() {
    let runner = Arc::new(ScriptedRunner::slow(Duration::from_millis(50)));
    let state = app_state(8080, RoutingMode::Subdomain, runner.clone()).await;
    let service = app(Arc::new(state.server_state()));

    // the client disconnects while the build is running
    let request = tokio::spawn(
        service
            .clone()
            .oneshot(deploy(r#"{"deploymentName": "foo"}"#)),
    );
    tokio::time::sleep(Duration::from_millis(20)).await;
    request.abort();

    let response = service
        .oneshot(deploy(r#"{"deploymentName": "bar"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(runner.max_in_flight(), 1);
    assert_eq!(state.registry.lookup("foo"), Some(0));
    assert_eq!(state.registry.lookup("bar"), Some(1));
}

#[tokio::test]
async fn test_deploy_endpoint_answers_any_method() {
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(8080, RoutingMode::Subdomain, runner.clone()).await;
    let service = app(Arc::new(state.server_state()));

    let request = Request::builder().uri("/doxy").body(Body::empty()).unwrap();
    let response = service.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_string(response).await.contains("Could not decode JSON body."));
    assert!(runner.steps().is_empty());
}

#[tokio::test]
async fn test_control_paths_proxied_for_deployments() {
    let upstream_port = spawn_upstream().await;
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(upstream_port, RoutingMode::Subdomain, runner).await;
    let service = app(Arc::new(state.server_state()));

    service
        .clone()
        .oneshot(deploy(r#"{"deploymentName": "foo"}"#))
        .await
        .unwrap();

    // addressed to a deployment: the app's own /doxy/version
    let request = Request::builder()
        .uri("/doxy/version")
        .header(header::HOST, "foo.telltale.xyz")
        .body(Body::empty())
        .unwrap();
    let response = service.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "GET /doxy/version ");

    // addressed to doxy itself
    let request = Request::builder()
        .uri("/doxy/version")
        .header(header::HOST, "telltale.xyz")
        .body(Body::empty())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_control_paths_reserved_in_path_mode() {
    let runner = Arc::new(ScriptedRunner::new());
    let state = app_state(8080, RoutingMode::Path, runner).await;
    let service = app(Arc::new(state.server_state()));

    let request = Request::builder()
        .uri("/doxy/deployments")
        .body(Body::empty())
        .unwrap();
    let response = service.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(json["total"], 0);
}
