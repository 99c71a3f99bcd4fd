use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::approvals::ApprovalRegistry;
use crate::audit::AuditChain;
use crate::classifier;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::executor::ExecutionDriver;
use crate::model::{
    ApprovalDecision, ApprovalHandle, ApprovalStatus, AuditRecordDraft, Execution,
    ExecutionFilter, ExecutionPage, ExecutionStatus, Operation, OperationArgs, Page, RollbackPlan,
    RollbackValidation, SafetyLevel, SubmitOutcome, SubmitStatus, Verb,
};
use crate::rollback_executor::RollbackExecutor;
use crate::rollback_planner;
use crate::store::Store;

/// The only component that mutates `Execution.status` (C6).
///
/// Composes C1 (classifier), C2 (audit chain), C3 (approvals), C4
/// (rollback planner), C5 (execution driver), and C7 (rollback executor)
/// into the state machine of spec.md §4.6. Exposes the transport-agnostic
/// external interface of spec.md §6 as inherent async methods.
pub struct Orchestrator {
    store: Arc<Store>,
    audit: Arc<AuditChain>,
    approvals: Arc<ApprovalRegistry>,
    driver: Arc<ExecutionDriver>,
    rollback_executor: Arc<RollbackExecutor>,
    config: EngineConfig,
    /// Per-execution-id guard: exactly one driver invocation per Execution
    /// (spec.md §4.6 concurrency rules).
    in_flight: Mutex<HashSet<Uuid>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<Store>,
        audit: Arc<AuditChain>,
        approvals: Arc<ApprovalRegistry>,
        driver: Arc<ExecutionDriver>,
        rollback_executor: Arc<RollbackExecutor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            audit,
            approvals,
            driver,
            rollback_executor,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// `SubmitOperation` (spec.md §6).
    pub async fn submit_operation(&self, operation: Operation) -> EngineResult<SubmitOutcome> {
        validate_operation(&operation)?;

        let safety_level = classifier::classify(&operation, &self.config);
        let mut execution = Execution::new(operation, safety_level);

        if safety_level == SafetyLevel::Dangerous {
            let approval = self
                .approvals
                .open(execution.id, execution.operation.actor_id.clone(), self.config.approval_ttl)
                .await;
            execution.status = ExecutionStatus::PendingApproval;
            execution.approval_id = Some(approval.id);

            self.store.put_execution(execution.clone()).await;
            self.write_transition_audit(&execution).await?;

            info!(execution_id = %execution.id, approval_id = %approval.id, "execution_pending_approval");

            return Ok(SubmitOutcome {
                execution_id: execution.id,
                status: SubmitStatus::PendingApproval,
                approval: Some(ApprovalHandle {
                    id: approval.id,
                    expires_at: approval.expires_at,
                }),
            });
        }

        self.store.put_execution(execution.clone()).await;
        self.run_to_completion(&mut execution).await;

        Ok(SubmitOutcome {
            execution_id: execution.id,
            status: SubmitStatus::ExecutingImmediate,
            approval: None,
        })
    }

    /// `GetExecution` (spec.md §6).
    pub async fn get_execution(&self, id: Uuid) -> EngineResult<Execution> {
        self.store
            .get_execution(id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("execution {id}")))
    }

    /// `ListExecutions` (spec.md §6).
    pub async fn list_executions(
        &self,
        actor_id: Option<&str>,
        filter: ExecutionFilter,
        page: Page,
    ) -> ExecutionPage {
        self.store.list_executions(actor_id, &filter, page).await
    }

    /// `DecideApproval` (spec.md §6).
    pub async fn decide_approval(
        &self,
        approval_id: Uuid,
        approver_id: impl Into<String>,
        decision: ApprovalDecision,
        reason: Option<String>,
    ) -> EngineResult<crate::model::Approval> {
        let approval = self
            .approvals
            .decide(approval_id, approver_id, decision, reason)
            .await?;

        let mut execution = self.get_execution(approval.execution_id).await?;

        match approval.status {
            ApprovalStatus::Approved => {
                execution.status = ExecutionStatus::Approved;
                self.store.put_execution(execution.clone()).await;
                self.run_to_completion(&mut execution).await;
            }
            ApprovalStatus::Rejected => {
                execution.status = ExecutionStatus::Rejected;
                execution.completed_at = Some(chrono::Utc::now());
                execution.error = Some("approval_rejected".to_string());
                self.store.put_execution(execution.clone()).await;
                self.write_transition_audit(&execution).await?;
            }
            _ => {}
        }

        Ok(approval)
    }

    /// `ListPendingApprovals` (spec.md §6).
    pub async fn list_pending_approvals(
        &self,
        authorised: impl FnMut(&crate::model::Approval) -> bool,
    ) -> Vec<crate::model::Approval> {
        self.approvals.list_pending(authorised).await
    }

    /// `PlanRollback` (spec.md §6) — idempotent: returns the existing plan
    /// for this execution if one exists.
    pub async fn plan_rollback(&self, execution_id: Uuid) -> EngineResult<RollbackPlan> {
        if let Some(existing) = self.store.get_rollback_plan_for_execution(execution_id).await {
            return Ok(existing);
        }

        let execution = self.get_execution(execution_id).await?;

        match rollback_planner::plan(&execution, &self.config) {
            Some(plan) => {
                self.store.put_rollback_plan(plan.clone()).await;
                Ok(plan)
            }
            None => Err(EngineError::PreconditionFailed(format!(
                "execution {execution_id} has no reversible rollback plan"
            ))),
        }
    }

    /// `ValidateRollback` (spec.md §6).
    pub async fn validate_rollback(&self, execution_id: Uuid) -> EngineResult<RollbackValidation> {
        let plan = self.plan_rollback(execution_id).await?;
        Ok(plan.validation.unwrap_or_default())
    }

    /// `ExecuteRollback` (spec.md §6).
    pub async fn execute_rollback(
        &self,
        plan_id: Uuid,
        actor_id: impl Into<String>,
    ) -> EngineResult<crate::model::RollbackExecution> {
        self.rollback_executor
            .execute(plan_id, actor_id, CancellationToken::new())
            .await
    }

    /// `GetRollbackStatus` (spec.md §6).
    pub async fn get_rollback_status(&self, id: Uuid) -> EngineResult<crate::model::RollbackExecution> {
        self.store
            .get_rollback_execution(id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("rollback execution {id}")))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// `VerifyAuditChain` (spec.md §6).
    pub async fn verify_audit_chain(
        &self,
        range: Option<(u64, u64)>,
    ) -> Vec<crate::model::VerifyResult> {
        self.audit.verify(range).await
    }

    /// Cancel an in-flight or pending-approval Execution (spec.md §5).
    pub async fn cancel_execution(&self, execution_id: Uuid) -> EngineResult<Execution> {
        let mut execution = self.get_execution(execution_id).await?;

        if execution.status.is_terminal() {
            return Err(EngineError::PreconditionFailed(format!(
                "execution {execution_id} already terminal ({:?})",
                execution.status
            )));
        }

        if execution.status == ExecutionStatus::PendingApproval {
            if let Some(approval_id) = execution.approval_id {
                // C3 is the arbiter; ignore AlreadyDecided races with a
                // concurrent `Decide`/`Sweep` (spec.md §4.6).
                let _ = self.approvals.reject_for_cancellation(approval_id).await;
            }
        }

        execution.status = ExecutionStatus::Cancelled;
        execution.completed_at = Some(chrono::Utc::now());
        execution.error = Some("cancelled_by_caller".to_string());
        self.store.put_execution(execution.clone()).await;
        self.write_transition_audit(&execution).await?;

        Ok(execution)
    }

    /// Periodic sweep entry point: fail-and-audit every Execution whose
    /// approval just expired. Intended to be driven by a
    /// `tokio::time::interval` task at `config.approval_sweep_interval`
    /// (spec.md §4.3, §5).
    pub async fn run_approval_sweep(&self) {
        let expired = self.approvals.sweep().await;
        for expiry in expired {
            if let Ok(mut execution) = self.get_execution(expiry.execution_id).await {
                if execution.status == ExecutionStatus::PendingApproval {
                    execution.status = ExecutionStatus::Timeout;
                    execution.completed_at = Some(chrono::Utc::now());
                    execution.error = Some("approval_expired".to_string());
                    self.store.put_execution(execution.clone()).await;
                    if let Err(e) = self.write_transition_audit(&execution).await {
                        error!(execution_id = %execution.id, error = %e, "audit_write_failed_on_expiry");
                    }
                    warn!(execution_id = %execution.id, "execution_timed_out_on_approval_expiry");
                }
            }
        }
    }

    /// Drive an Execution from `Pending`/`Approved` through C5 to a
    /// terminal status, then C4/persist a rollback plan on success.
    /// Guarded so exactly one driver invocation runs per Execution id.
    async fn run_to_completion(&self, execution: &mut Execution) {
        {
            let mut guard = self.in_flight.lock().await;
            if !guard.insert(execution.id) {
                warn!(execution_id = %execution.id, "duplicate_driver_invocation_suppressed");
                return;
            }
        }

        self.driver
            .run(execution, CancellationToken::new(), None)
            .await;
        self.store.put_execution(execution.clone()).await;

        self.in_flight.lock().await.remove(&execution.id);

        if let Err(e) = self.write_transition_audit(execution).await {
            error!(execution_id = %execution.id, error = %e, "audit_persist_failed_after_execution");
            execution.status = ExecutionStatus::Failed;
            execution.error = Some("audit_persist_failed".to_string());
            self.store.put_execution(execution.clone()).await;
            return;
        }

        if execution.status == ExecutionStatus::Completed
            && execution.operation.verb.is_reversible_candidate()
        {
            match rollback_planner::plan(execution, &self.config) {
                Some(plan) => {
                    self.store.put_rollback_plan(plan.clone()).await;
                    info!(execution_id = %execution.id, plan_id = %plan.id, "rollback_plan_created");
                }
                None => {
                    // Reversible-candidate verb but the kind/shape doesn't
                    // actually produce a plan (e.g. read-only fallthrough);
                    // nothing to audit beyond the execution's own record.
                }
            }
        }
    }

    async fn write_transition_audit(&self, execution: &Execution) -> EngineResult<()> {
        let draft = AuditRecordDraft::for_execution(execution);
        self.audit.append(draft).await.map(|_| ())
    }
}

fn validate_operation(operation: &Operation) -> EngineResult<()> {
    if operation.actor_id.trim().is_empty() {
        return Err(EngineError::InvalidInput("actor_id must not be empty".to_string()));
    }
    if operation.name.trim().is_empty() {
        return Err(EngineError::InvalidInput("name must not be empty".to_string()));
    }
    if operation.namespace.trim().is_empty() {
        return Err(EngineError::InvalidInput("namespace must not be empty".to_string()));
    }

    if operation.verb == Verb::Scale {
        match &operation.arguments {
            OperationArgs::Scale { replicas, .. } if *replicas < 0 => {
                return Err(EngineError::InvalidInput(
                    "replicas must not be negative".to_string(),
                ));
            }
            OperationArgs::Scale { .. } => {}
            _ => {
                return Err(EngineError::InvalidInput(
                    "scale operation requires replicas argument".to_string(),
                ));
            }
        }
    }

    Ok(())
}
