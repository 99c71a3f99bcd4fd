use chrono::Utc;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::model::{
    CapturedState, Execution, ExecutionStatus, ResourceKind, RollbackPlan, RollbackPlanStatus,
    RollbackStep, RollbackValidation, Verb,
};

/// Builds a [`RollbackPlan`] from a `COMPLETED` [`Execution`] (C4).
///
/// Synchronous and pure over its inputs: the captured state is taken from
/// the `Execution`'s `OperationResult`, never re-read from the cluster
/// (spec.md §4.5).
pub fn plan(execution: &Execution, cfg: &EngineConfig) -> Option<RollbackPlan> {
    if execution.status != ExecutionStatus::Completed {
        return None;
    }

    let op = &execution.operation;
    let now = Utc::now();
    let expires_at = now
        + chrono::Duration::from_std(cfg.default_plan_ttl).unwrap_or(chrono::Duration::hours(24));

    let (steps, reason, mut validation) = match (op.verb, op.resource_kind) {
        (Verb::Scale, ResourceKind::Deployments) => {
            let previous = execution.result.as_ref().and_then(|r| match &r.previous_state {
                Some(CapturedState::Scale { previous_replicas }) => Some(*previous_replicas),
                _ => None,
            });

            match previous {
                Some(previous_replicas) => (
                    vec![RollbackStep {
                        sequence: 1,
                        verb: Verb::Scale,
                        resource_kind: ResourceKind::Deployments,
                        namespace: op.namespace.clone(),
                        name: op.name.clone(),
                        description: format!(
                            "scale {}/{} back to {} replicas",
                            op.namespace, op.name, previous_replicas
                        ),
                        captured_state: serde_json::to_value(CapturedState::Scale {
                            previous_replicas,
                        })
                        .unwrap_or(serde_json::Value::Null),
                    }],
                    "compensate a scale operation by restoring the prior replica count".to_string(),
                    RollbackValidation::default(),
                ),
                None => (
                    Vec::new(),
                    "captured_state missing for scale operation".to_string(),
                    RollbackValidation {
                        blocking: vec!["captured_state missing".to_string()],
                    },
                ),
            }
        }
        (Verb::Restart, ResourceKind::Deployments) => (
            Vec::new(),
            "rollouts are non-reversible to the prior pod generation via this API surface"
                .to_string(),
            RollbackValidation {
                blocking: vec!["restart is not reversible".to_string()],
            },
        ),
        (Verb::Delete, ResourceKind::Pods) => (
            vec![RollbackStep {
                sequence: 1,
                verb: Verb::Delete,
                resource_kind: ResourceKind::Pods,
                namespace: op.namespace.clone(),
                name: op.name.clone(),
                description: format!(
                    "no compensation required; the controller will recreate {}/{}",
                    op.namespace, op.name
                ),
                captured_state: serde_json::to_value(CapturedState::None)
                    .unwrap_or(serde_json::Value::Null),
            }],
            "pod deletion is self-healing via its controller; this step is an audit marker only"
                .to_string(),
            RollbackValidation::default(),
        ),
        (
            Verb::Delete,
            ResourceKind::Deployments | ResourceKind::Services | ResourceKind::Configmaps | ResourceKind::Secrets,
        ) => {
            let backup = execution
                .result
                .as_ref()
                .and_then(|r| r.backup_data.clone())
                .filter(|v| !v.is_null() && *v != serde_json::json!({}));

            match backup {
                Some(manifest) => (
                    vec![RollbackStep {
                        sequence: 1,
                        verb: Verb::Delete,
                        resource_kind: op.resource_kind,
                        namespace: op.namespace.clone(),
                        name: op.name.clone(),
                        description: format!(
                            "recreate {}/{} from the captured manifest",
                            op.namespace, op.name
                        ),
                        captured_state: serde_json::to_value(CapturedState::Manifest { manifest })
                            .unwrap_or(serde_json::Value::Null),
                    }],
                    "recreate the deleted object from its captured manifest".to_string(),
                    RollbackValidation::default(),
                ),
                None => (
                    Vec::new(),
                    "no backup manifest was captured at execution time".to_string(),
                    RollbackValidation {
                        blocking: vec!["captured_state missing".to_string()],
                    },
                ),
            }
        }
        (Verb::Get | Verb::List | Verb::Logs, _) => return None,
        _ => return None,
    };

    if cfg.protected_namespaces.contains(&op.namespace) {
        validation.blocking.push("protected namespace".to_string());
    }

    let status = if validation.is_blocked() {
        RollbackPlanStatus::Invalid
    } else {
        RollbackPlanStatus::Planned
    };

    let estimated_duration_ms =
        steps.len() as i64 * cfg.rollback_step_duration_estimate.as_millis() as i64;

    Some(RollbackPlan {
        id: Uuid::new_v4(),
        execution_id: execution.id,
        actor_id: op.actor_id.clone(),
        session_id: op.session_id.clone(),
        original_operation: op.clone(),
        steps,
        status,
        reason,
        estimated_duration_ms,
        validation: Some(validation),
        created_at: now,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Operation, OperationArgs, OperationResult, SafetyLevel};

    fn completed_execution(verb: Verb, kind: ResourceKind, result: OperationResult) -> Execution {
        let args = match verb {
            Verb::Scale => OperationArgs::Scale {
                replicas: 2,
                current_replicas: Some(5),
            },
            Verb::Delete => OperationArgs::Delete {
                grace_period_seconds: None,
            },
            _ => OperationArgs::Empty,
        };
        let op = Operation::new("u1", "s1", verb, kind, "prod", "payments", "prod-cluster", args);
        let mut execution = Execution::new(op, SafetyLevel::Warning);
        execution.status = ExecutionStatus::Completed;
        execution.completed_at = Some(Utc::now());
        execution.result = Some(result);
        execution
    }

    #[test]
    fn scale_with_previous_state_yields_one_step() {
        let cfg = EngineConfig::default();
        let execution = completed_execution(
            Verb::Scale,
            ResourceKind::Deployments,
            OperationResult {
                success: true,
                message: None,
                previous_state: Some(CapturedState::Scale {
                    previous_replicas: 5,
                }),
                backup_data: None,
                raw: None,
            },
        );
        let plan = plan(&execution, &cfg).expect("plan expected");
        assert_eq!(plan.status, RollbackPlanStatus::Planned);
        assert_eq!(plan.steps.len(), 1);
        assert!(plan.created_at > execution.completed_at.unwrap());
    }

    #[test]
    fn restart_is_invalid() {
        let cfg = EngineConfig::default();
        let execution = completed_execution(
            Verb::Restart,
            ResourceKind::Deployments,
            OperationResult {
                success: true,
                message: None,
                previous_state: None,
                backup_data: None,
                raw: None,
            },
        );
        let plan = plan(&execution, &cfg).expect("plan expected even though invalid");
        assert_eq!(plan.status, RollbackPlanStatus::Invalid);
    }

    #[test]
    fn delete_deployment_without_backup_is_invalid() {
        let cfg = EngineConfig::default();
        let execution = completed_execution(
            Verb::Delete,
            ResourceKind::Deployments,
            OperationResult {
                success: true,
                message: None,
                previous_state: None,
                backup_data: None,
                raw: None,
            },
        );
        let plan = plan(&execution, &cfg).expect("plan expected");
        assert_eq!(plan.status, RollbackPlanStatus::Invalid);
        assert!(plan
            .validation
            .unwrap()
            .blocking
            .contains(&"captured_state missing".to_string()));
    }

    #[test]
    fn delete_deployment_with_backup_is_planned() {
        let cfg = EngineConfig::default();
        let execution = completed_execution(
            Verb::Delete,
            ResourceKind::Deployments,
            OperationResult {
                success: true,
                message: None,
                previous_state: None,
                backup_data: Some(serde_json::json!({"kind": "Deployment"})),
                raw: None,
            },
        );
        let plan = plan(&execution, &cfg).expect("plan expected");
        assert_eq!(plan.status, RollbackPlanStatus::Planned);
    }

    #[test]
    fn read_only_verbs_produce_no_plan() {
        let cfg = EngineConfig::default();
        let execution = completed_execution(
            Verb::Get,
            ResourceKind::Pods,
            OperationResult {
                success: true,
                message: None,
                previous_state: None,
                backup_data: None,
                raw: None,
            },
        );
        assert!(plan(&execution, &cfg).is_none());
    }

    #[test]
    fn non_completed_execution_produces_no_plan() {
        let cfg = EngineConfig::default();
        let mut execution = completed_execution(
            Verb::Scale,
            ResourceKind::Deployments,
            OperationResult {
                success: true,
                message: None,
                previous_state: Some(CapturedState::Scale { previous_replicas: 5 }),
                backup_data: None,
                raw: None,
            },
        );
        execution.status = ExecutionStatus::Failed;
        assert!(plan(&execution, &cfg).is_none());
    }
}
