use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::audit::AuditChain;
use crate::error::{EngineError, EngineResult};
use crate::executor::ExecutionDriver;
use crate::model::{
    AuditRecordDraft, Execution, ExecutionStatus, Operation, OperationArgs, RollbackExecution,
    RollbackExecutionStatus, RollbackPlanStatus, RollbackStep, SafetyLevel, StepLogEntry, StepStatus,
};
use crate::store::Store;

/// Replays a stored [`crate::model::RollbackPlan`] step-by-step (C7).
///
/// Stop-on-first-failure: the first failing step ends the replay and the
/// plan is marked `FAILED`; later steps are never attempted (spec.md §4.7).
pub struct RollbackExecutor {
    store: Arc<Store>,
    audit: Arc<AuditChain>,
    driver: Arc<ExecutionDriver>,
    step_timeout: Duration,
}

impl RollbackExecutor {
    pub fn new(
        store: Arc<Store>,
        audit: Arc<AuditChain>,
        driver: Arc<ExecutionDriver>,
        step_timeout: Duration,
    ) -> Self {
        Self {
            store,
            audit,
            driver,
            step_timeout,
        }
    }

    pub async fn execute(
        &self,
        plan_id: Uuid,
        actor_id: impl Into<String>,
        ctx: CancellationToken,
    ) -> EngineResult<RollbackExecution> {
        let actor_id = actor_id.into();
        let mut plan = self
            .store
            .get_rollback_plan(plan_id)
            .await
            .ok_or_else(|| EngineError::NotFound(format!("rollback plan {plan_id}")))?;

        if plan.status != RollbackPlanStatus::Planned {
            return Err(EngineError::PreconditionFailed(format!(
                "plan {plan_id} is not PLANNED (status={:?})",
                plan.status
            )));
        }
        if plan.expires_at <= Utc::now() {
            return Err(EngineError::PreconditionFailed(format!(
                "plan {plan_id} expired at {}",
                plan.expires_at
            )));
        }
        if let Some(validation) = &plan.validation {
            if validation.is_blocked() {
                return Err(EngineError::PreconditionFailed(format!(
                    "plan {plan_id} has blocking validation reasons: {:?}",
                    validation.blocking
                )));
            }
        }
        if self.store.has_in_flight_rollback(plan_id).await {
            return Err(EngineError::PreconditionFailed(format!(
                "plan {plan_id} already has a rollback execution in flight"
            )));
        }

        plan.status = RollbackPlanStatus::Executing;
        self.store.update_rollback_plan(plan.clone()).await;

        let mut rollback_execution = RollbackExecution {
            id: Uuid::new_v4(),
            plan_id,
            actor_id: actor_id.clone(),
            status: RollbackExecutionStatus::Executing,
            started_at: Utc::now(),
            completed_at: None,
            step_log: Vec::new(),
            error: None,
        };
        self.store.put_rollback_execution(rollback_execution.clone()).await;

        let mut steps: Vec<RollbackStep> = plan.steps.clone();
        steps.sort_by_key(|s| s.sequence);

        for step in &steps {
            if ctx.is_cancelled() {
                let entry = StepLogEntry {
                    sequence: step.sequence,
                    status: StepStatus::Cancelled,
                    started_at: Utc::now(),
                    completed_at: Some(Utc::now()),
                    output: None,
                    error: Some("cancelled before step started".to_string()),
                };
                rollback_execution.step_log.push(entry);
                rollback_execution.status = RollbackExecutionStatus::Cancelled;
                rollback_execution.completed_at = Some(Utc::now());
                plan.status = RollbackPlanStatus::Cancelled;
                self.store.update_rollback_plan(plan.clone()).await;
                self.store.put_rollback_execution(rollback_execution.clone()).await;
                self.audit_step(&plan.actor_id, &plan.session_id, step, StepStatus::Cancelled, None)
                    .await;
                return Ok(rollback_execution);
            }

            let started_at = Utc::now();
            let mut synthetic = synthetic_execution(step, &plan.actor_id, &plan.session_id, &plan.original_operation.cluster_context);
            self.driver
                .run(&mut synthetic, ctx.clone(), Some(self.step_timeout))
                .await;

            let (status, output, error) = match synthetic.status {
                ExecutionStatus::Completed => (
                    StepStatus::Completed,
                    synthetic.result.as_ref().and_then(|r| r.message.clone()),
                    None,
                ),
                ExecutionStatus::Cancelled => (StepStatus::Cancelled, None, synthetic.error.clone()),
                _ => (StepStatus::Failed, None, synthetic.error.clone()),
            };

            rollback_execution.step_log.push(StepLogEntry {
                sequence: step.sequence,
                status,
                started_at,
                completed_at: Some(Utc::now()),
                output: output.clone(),
                error: error.clone(),
            });

            self.audit_step(&plan.actor_id, &plan.session_id, step, status, error.clone())
                .await;

            if status != StepStatus::Completed {
                rollback_execution.status = match status {
                    StepStatus::Cancelled => RollbackExecutionStatus::Cancelled,
                    _ => RollbackExecutionStatus::Failed,
                };
                rollback_execution.completed_at = Some(Utc::now());
                rollback_execution.error = error;
                plan.status = match status {
                    StepStatus::Cancelled => RollbackPlanStatus::Cancelled,
                    _ => RollbackPlanStatus::Failed,
                };
                self.store.update_rollback_plan(plan.clone()).await;
                self.store.put_rollback_execution(rollback_execution.clone()).await;
                return Ok(rollback_execution);
            }
        }

        rollback_execution.status = RollbackExecutionStatus::Completed;
        rollback_execution.completed_at = Some(Utc::now());
        plan.status = RollbackPlanStatus::Completed;
        self.store.update_rollback_plan(plan.clone()).await;
        self.store.put_rollback_execution(rollback_execution.clone()).await;

        Ok(rollback_execution)
    }

    async fn audit_step(
        &self,
        actor_id: &str,
        session_id: &str,
        step: &RollbackStep,
        status: StepStatus,
        error: Option<String>,
    ) {
        let execution_status = match status {
            StepStatus::Completed => ExecutionStatus::Completed,
            StepStatus::Failed => ExecutionStatus::Failed,
            StepStatus::Cancelled => ExecutionStatus::Cancelled,
        };

        let generated_command = match &error {
            Some(err) => format!("{} (error: {err})", step.description),
            None => step.description.clone(),
        };

        let draft = AuditRecordDraft {
            actor_id: Some(actor_id.to_string()),
            session_id: Some(session_id.to_string()),
            query_text: format!("rollback step {} for {}/{}", step.sequence, step.namespace, step.name),
            generated_command,
            safety_level: SafetyLevel::Warning,
            execution_status,
            execution_result: None,
            cluster_context: None,
            namespace_context: Some(step.namespace.clone()),
            source_ip: None,
            user_agent: None,
        };

        let _ = self.audit.append(draft).await;
    }
}

fn synthetic_execution(
    step: &RollbackStep,
    actor_id: &str,
    session_id: &str,
    cluster_context: &str,
) -> Execution {
    let arguments = match &step.verb {
        crate::model::Verb::Scale => {
            let previous_replicas = step
                .captured_state
                .get("previous_replicas")
                .and_then(|v| v.as_i64())
                .unwrap_or(0) as i32;
            OperationArgs::Scale {
                replicas: previous_replicas,
                current_replicas: None,
            }
        }
        crate::model::Verb::Delete => OperationArgs::Delete {
            grace_period_seconds: None,
        },
        _ => OperationArgs::Empty,
    };

    let operation = Operation::new(
        actor_id,
        session_id,
        step.verb,
        step.resource_kind,
        step.namespace.clone(),
        step.name.clone(),
        cluster_context,
        arguments,
    );
    let mut execution = Execution::new(operation, SafetyLevel::Warning);
    execution.result = Some(crate::model::OperationResult {
        success: false,
        message: None,
        previous_state: None,
        backup_data: Some(step.captured_state.clone()),
        raw: Some(json!({ "rollback_step": step.sequence })),
    });
    execution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CapturedState, Operation as Op, OperationResult, ResourceKind, RollbackPlan, RollbackValidation, Verb,
    };

    fn make_plan(step_count: u32, status: RollbackPlanStatus, blocked: bool) -> RollbackPlan {
        let op = Op::new(
            "u1",
            "s1",
            Verb::Scale,
            ResourceKind::Deployments,
            "prod",
            "payments",
            "prod-cluster",
            OperationArgs::Scale {
                replicas: 2,
                current_replicas: Some(5),
            },
        );
        let steps: Vec<RollbackStep> = (1..=step_count)
            .map(|sequence| RollbackStep {
                sequence,
                verb: Verb::Scale,
                resource_kind: ResourceKind::Deployments,
                namespace: "prod".to_string(),
                name: "payments".to_string(),
                description: "scale back".to_string(),
                captured_state: serde_json::to_value(CapturedState::Scale {
                    previous_replicas: 5,
                })
                .unwrap(),
            })
            .collect();

        RollbackPlan {
            id: Uuid::new_v4(),
            execution_id: op.id,
            actor_id: "u1".to_string(),
            session_id: "s1".to_string(),
            original_operation: op,
            steps,
            status,
            reason: "test".to_string(),
            estimated_duration_ms: 15_000,
            validation: Some(RollbackValidation {
                blocking: if blocked {
                    vec!["protected namespace".to_string()]
                } else {
                    Vec::new()
                },
            }),
            created_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    async fn harness(
        result: Result<OperationResult, EngineError>,
    ) -> (Arc<Store>, RollbackExecutor) {
        let store = Arc::new(Store::new());
        let audit = Arc::new(AuditChain::new());
        let port: Arc<dyn crate::ports::ExecutorPort> =
            Arc::new(crate::ports::ScriptedExecutor {
                result,
                delay: Duration::ZERO,
            });
        let driver = Arc::new(ExecutionDriver::new(port, Duration::from_secs(5)));
        let executor = RollbackExecutor::new(store.clone(), audit, driver, Duration::from_secs(5));
        (store, executor)
    }

    #[tokio::test]
    async fn all_steps_succeed_completes_plan_and_execution() {
        let (store, executor) = harness(Ok(OperationResult {
            success: true,
            message: Some("ok".to_string()),
            previous_state: None,
            backup_data: None,
            raw: None,
        }))
        .await;

        let plan = make_plan(3, RollbackPlanStatus::Planned, false);
        store.put_rollback_plan(plan.clone()).await;

        let result = executor
            .execute(plan.id, "u2", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, RollbackExecutionStatus::Completed);
        assert_eq!(result.step_log.len(), 3);
        let stored_plan = store.get_rollback_plan(plan.id).await.unwrap();
        assert_eq!(stored_plan.status, RollbackPlanStatus::Completed);
    }

    #[tokio::test]
    async fn first_failure_stops_remaining_steps() {
        let (store, executor) = harness(Err(EngineError::ExternalFailure(
            "apiserver rejected patch".to_string(),
        )))
        .await;

        let plan = make_plan(3, RollbackPlanStatus::Planned, false);
        store.put_rollback_plan(plan.clone()).await;

        let result = executor
            .execute(plan.id, "u2", CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.status, RollbackExecutionStatus::Failed);
        assert_eq!(result.step_log.len(), 1);
        let stored_plan = store.get_rollback_plan(plan.id).await.unwrap();
        assert_eq!(stored_plan.status, RollbackPlanStatus::Failed);
    }

    #[tokio::test]
    async fn blocked_plan_rejected_with_precondition_failed() {
        let (store, executor) = harness(Ok(OperationResult {
            success: true,
            message: None,
            previous_state: None,
            backup_data: None,
            raw: None,
        }))
        .await;

        let plan = make_plan(1, RollbackPlanStatus::Planned, true);
        store.put_rollback_plan(plan.clone()).await;

        let result = executor.execute(plan.id, "u2", CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn expired_plan_rejected_with_precondition_failed() {
        let (store, executor) = harness(Ok(OperationResult {
            success: true,
            message: None,
            previous_state: None,
            backup_data: None,
            raw: None,
        }))
        .await;

        let mut plan = make_plan(1, RollbackPlanStatus::Planned, false);
        plan.expires_at = Utc::now() - chrono::Duration::minutes(1);
        store.put_rollback_plan(plan.clone()).await;

        let result = executor.execute(plan.id, "u2", CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::PreconditionFailed(_))));
    }

    #[tokio::test]
    async fn non_planned_status_rejected() {
        let (store, executor) = harness(Ok(OperationResult {
            success: true,
            message: None,
            previous_state: None,
            backup_data: None,
            raw: None,
        }))
        .await;

        let plan = make_plan(1, RollbackPlanStatus::Completed, false);
        store.put_rollback_plan(plan.clone()).await;

        let result = executor.execute(plan.id, "u2", CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::PreconditionFailed(_))));
    }
}
