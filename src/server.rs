use std::net::SocketAddr;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use prometheus::{Encoder, Histogram, IntCounterVec, Registry, TextEncoder};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::error::EngineError;
use crate::model::{ApprovalDecision, ExecutionFilter, Operation, Page};
use crate::orchestrator::Orchestrator;

/* ============================= PROMETHEUS ============================= */

static SERVER_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static REQUESTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let c = IntCounterVec::new(
        prometheus::Opts::new("kubechat_requests_total", "Total demo API requests"),
        &["route", "status"],
    )
    .expect("metric definition is valid");
    SERVER_REGISTRY
        .register(Box::new(c.clone()))
        .expect("metric not yet registered");
    c
});

static REQUEST_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    let h = Histogram::with_opts(prometheus::HistogramOpts::new(
        "kubechat_request_duration_seconds",
        "Duration of demo API request processing in seconds",
    ))
    .expect("metric definition is valid");
    SERVER_REGISTRY
        .register(Box::new(h.clone()))
        .expect("metric not yet registered");
    h
});

/* ============================= STATE ============================= */

#[derive(Clone)]
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Thin HTTP surface over [`Orchestrator`]'s methods. Transport is a demo
/// convenience, not part of the core contract (spec.md §6 lists the
/// interface as transport-agnostic); no auth/role extraction happens here
/// (out of scope per spec.md §1).
pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/operations", post(submit_operation).get(list_executions))
        .route("/operations/:id", get(get_execution))
        .route("/approvals/:id/decide", post(decide_approval))
        .route("/approvals/pending", get(list_pending_approvals))
        .route("/executions/:id/rollback-plan", post(plan_rollback))
        .route("/executions/:id/rollback-validation", get(validate_rollback))
        .route("/rollback-plans/:id/execute", post(execute_rollback))
        .route("/rollback-executions/:id", get(get_rollback_status))
        .route("/audit/verify", get(verify_audit_chain))
        .route("/healthz", get(|| async { (StatusCode::OK, "OK") }))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: ServerState) -> Result<()> {
    let app = build_router(state);
    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "kubechat_http_server_started");

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("kubechat_http_server_shutting_down");
        })
        .await?;

    Ok(())
}

fn respond<T: serde::Serialize>(route: &str, result: Result<T, EngineError>) -> impl IntoResponse {
    match result {
        Ok(body) => {
            REQUESTS_TOTAL.with_label_values(&[route, "ok"]).inc();
            (StatusCode::OK, serde_json::to_string(&body).unwrap_or_default())
        }
        Err(e) => {
            REQUESTS_TOTAL.with_label_values(&[route, e.code()]).inc();
            (status_for(&e), serde_json::json!({ "error": e.to_string() }).to_string())
        }
    }
}

fn status_for(e: &EngineError) -> StatusCode {
    match e {
        EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EngineError::Unauthorised(_) => StatusCode::FORBIDDEN,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::AlreadyDecided(_) | EngineError::PreconditionFailed(_) => StatusCode::CONFLICT,
        EngineError::ExecutionTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        EngineError::Cancelled(_) => StatusCode::GONE,
        EngineError::ExternalFailure(_) | EngineError::AuditPersistFailed(_) | EngineError::StoreUnavailable(_) => {
            StatusCode::BAD_GATEWAY
        }
    }
}

async fn submit_operation(
    State(state): State<ServerState>,
    axum::Json(operation): axum::Json<Operation>,
) -> impl IntoResponse {
    let _timer = REQUEST_DURATION.start_timer();
    respond("submit_operation", state.orchestrator.submit_operation(operation).await)
}

async fn get_execution(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    respond("get_execution", state.orchestrator.get_execution(id).await)
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    actor_id: Option<String>,
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn list_executions(
    State(state): State<ServerState>,
    Query(q): Query<ListQuery>,
) -> impl IntoResponse {
    let page = Page {
        limit: q.limit.unwrap_or(50),
        offset: q.offset.unwrap_or(0),
    };
    let page = state
        .orchestrator
        .list_executions(q.actor_id.as_deref(), ExecutionFilter::default(), page)
        .await;
    (StatusCode::OK, serde_json::to_string(&page.items).unwrap_or_default())
}

#[derive(Debug, Deserialize)]
struct DecideBody {
    approver_id: String,
    decision: ApprovalDecision,
    reason: Option<String>,
}

async fn decide_approval(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<DecideBody>,
) -> impl IntoResponse {
    respond(
        "decide_approval",
        state
            .orchestrator
            .decide_approval(id, body.approver_id, body.decision, body.reason)
            .await,
    )
}

async fn list_pending_approvals(State(state): State<ServerState>) -> impl IntoResponse {
    let pending = state.orchestrator.list_pending_approvals(|_| true).await;
    (StatusCode::OK, serde_json::to_string(&pending).unwrap_or_default())
}

async fn plan_rollback(State(state): State<ServerState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    respond("plan_rollback", state.orchestrator.plan_rollback(id).await)
}

async fn validate_rollback(State(state): State<ServerState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    respond("validate_rollback", state.orchestrator.validate_rollback(id).await)
}

#[derive(Debug, Deserialize)]
struct ExecuteRollbackBody {
    actor_id: String,
}

async fn execute_rollback(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    axum::Json(body): axum::Json<ExecuteRollbackBody>,
) -> impl IntoResponse {
    respond(
        "execute_rollback",
        state.orchestrator.execute_rollback(id, body.actor_id).await,
    )
}

async fn get_rollback_status(State(state): State<ServerState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    respond("get_rollback_status", state.orchestrator.get_rollback_status(id).await)
}

#[derive(Debug, Deserialize)]
struct VerifyQuery {
    from: Option<u64>,
    to: Option<u64>,
}

async fn verify_audit_chain(State(state): State<ServerState>, Query(q): Query<VerifyQuery>) -> impl IntoResponse {
    let range = match (q.from, q.to) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    };
    let results = state.orchestrator.verify_audit_chain(range).await;
    (StatusCode::OK, serde_json::to_string(&results).unwrap_or_default())
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = SERVER_REGISTRY.gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => match String::from_utf8(buffer) {
            Ok(body) => (StatusCode::OK, body),
            Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
        },
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding error".to_string()),
    }
}
