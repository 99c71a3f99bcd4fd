mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use common::scale_deployment;
use kubechat::config::EngineConfig;
use kubechat::server::{ServerState, build_router};
use tower::util::ServiceExt;

fn app() -> Router {
    let orchestrator = common::harness(Ok(common::ok_scale_result(5)), EngineConfig::default());
    build_router(ServerState { orchestrator })
}

/// `/healthz` answers without touching the orchestrator at all.
#[tokio::test]
async fn healthz_reports_ok() {
    let response = app()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Submitting a SAFE operation over HTTP returns 200 with an execution id
/// that `GET /operations/:id` then resolves.
#[tokio::test]
async fn submit_then_fetch_execution_round_trips_over_http() {
    let app = app();
    let body = serde_json::to_vec(&common::list_pods("u1", "default")).unwrap();

    let submit = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/operations")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(submit.status(), StatusCode::OK);

    let bytes = to_bytes(submit.into_body(), usize::MAX).await.unwrap();
    let outcome: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let execution_id = outcome["execution_id"].as_str().expect("execution_id present");

    let fetch = app
        .oneshot(
            Request::builder()
                .uri(format!("/operations/{execution_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(fetch.status(), StatusCode::OK);

    let bytes = to_bytes(fetch.into_body(), usize::MAX).await.unwrap();
    let execution: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(execution["status"], "COMPLETED");
}

/// A DANGEROUS operation submitted over HTTP comes back `PENDING_APPROVAL`
/// with a decidable approval id, matching the in-process orchestrator path.
#[tokio::test]
async fn dangerous_operation_returns_pending_approval_over_http() {
    let app = app();
    let body = serde_json::to_vec(&scale_deployment("u1", "prod", "payments", 0, Some(5))).unwrap();

    let submit = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/operations")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(submit.status(), StatusCode::OK);

    let bytes = to_bytes(submit.into_body(), usize::MAX).await.unwrap();
    let outcome: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(outcome["status"], "PENDING_APPROVAL");
    assert!(outcome["approval"]["id"].is_string());
}

/// Malformed JSON input is rejected by axum's extractor before the
/// orchestrator ever sees it.
#[tokio::test]
async fn malformed_submit_body_is_rejected() {
    let response = app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/operations")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

/// `/metrics` exposes the process's Prometheus text exposition format.
#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text_format() {
    let response = app()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
