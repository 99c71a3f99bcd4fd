use std::sync::Arc;
use std::time::Duration;

use kubechat::approvals::ApprovalRegistry;
use kubechat::audit::AuditChain;
use kubechat::config::EngineConfig;
use kubechat::executor::ExecutionDriver;
use kubechat::model::{Operation, OperationArgs, OperationResult, ResourceKind, Verb};
use kubechat::orchestrator::Orchestrator;
use kubechat::ports::{ExecutorPort, ScriptedExecutor};
use kubechat::rollback_executor::RollbackExecutor;
use kubechat::store::Store;

pub use kubechat::error::{EngineError, EngineResult};

/// Build a full `Orchestrator` stack wired to a scripted executor so tests
/// never depend on a live cluster.
pub fn harness(result: EngineResult<OperationResult>, config: EngineConfig) -> Arc<Orchestrator> {
    let store = Arc::new(Store::new());
    let audit = Arc::new(AuditChain::new());
    let approvals = Arc::new(ApprovalRegistry::new(config.allow_self_approval));
    let port: Arc<dyn ExecutorPort> = Arc::new(ScriptedExecutor {
        result,
        delay: Duration::ZERO,
    });
    let driver = Arc::new(ExecutionDriver::new(port, config.default_execution_timeout));
    let rollback_executor = Arc::new(RollbackExecutor::new(
        store.clone(),
        audit.clone(),
        driver.clone(),
        config.rollback_step_timeout,
    ));

    Arc::new(Orchestrator::new(store, audit, approvals, driver, rollback_executor, config))
}

pub fn list_pods(actor: &str, namespace: &str) -> Operation {
    Operation::new(
        actor,
        "s1",
        Verb::List,
        ResourceKind::Pods,
        namespace,
        "pods",
        "prod-cluster",
        OperationArgs::Empty,
    )
}

pub fn scale_deployment(actor: &str, namespace: &str, name: &str, replicas: i32, current: Option<i32>) -> Operation {
    Operation::new(
        actor,
        "s1",
        Verb::Scale,
        ResourceKind::Deployments,
        namespace,
        name,
        "prod-cluster",
        OperationArgs::Scale {
            replicas,
            current_replicas: current,
        },
    )
}

pub fn delete_deployment(actor: &str, namespace: &str, name: &str) -> Operation {
    Operation::new(
        actor,
        "s1",
        Verb::Delete,
        ResourceKind::Deployments,
        namespace,
        name,
        "prod-cluster",
        OperationArgs::Delete {
            grace_period_seconds: None,
        },
    )
}

pub fn ok_scale_result(previous_replicas: i32) -> OperationResult {
    OperationResult {
        success: true,
        message: None,
        previous_state: Some(kubechat::model::CapturedState::Scale { previous_replicas }),
        backup_data: None,
        raw: None,
    }
}

pub fn ok_delete_with_backup(manifest: serde_json::Value) -> OperationResult {
    OperationResult {
        success: true,
        message: None,
        previous_state: None,
        backup_data: Some(manifest),
        raw: None,
    }
}
