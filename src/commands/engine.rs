use std::sync::Arc;

use anyhow::{Context, Result};
use kube::Client;

use kubechat::approvals::ApprovalRegistry;
use kubechat::audit::AuditChain;
use kubechat::config::EngineConfig;
use kubechat::executor::ExecutionDriver;
use kubechat::orchestrator::Orchestrator;
use kubechat::ports::{ExecutorPort, KubeExecutor};
use kubechat::rollback_executor::RollbackExecutor;
use kubechat::store::Store;

/// Assembles one process-wide [`Orchestrator`] from a live cluster
/// connection, the way `commands::check::run` builds its `Client`.
pub async fn build() -> Result<Arc<Orchestrator>> {
    let config = EngineConfig::from_env();

    let client = Client::try_default()
        .await
        .context("Failed to connect to Kubernetes cluster. Is your kubeconfig valid?")?;

    let store = Arc::new(Store::new());
    let audit = Arc::new(AuditChain::new());
    let approvals = Arc::new(ApprovalRegistry::new(config.allow_self_approval));
    let port: Arc<dyn ExecutorPort> = Arc::new(KubeExecutor::new(client));
    let driver = Arc::new(ExecutionDriver::new(port, config.default_execution_timeout));
    let rollback_executor = Arc::new(RollbackExecutor::new(
        store.clone(),
        audit.clone(),
        driver.clone(),
        config.rollback_step_timeout,
    ));

    Ok(Arc::new(Orchestrator::new(
        store,
        audit,
        approvals,
        driver,
        rollback_executor,
        config,
    )))
}
