use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Execution, ExecutionFilter, ExecutionPage, Page, RollbackExecution, RollbackPlan};

/// Persistence port for everything except the audit chain, which has its
/// own single-writer discipline ([`crate::audit::AuditChain`]). Durability
/// transport is out of scope per spec.md §1; this in-memory implementation
/// is what the orchestrator is built and tested against.
#[derive(Default)]
pub struct Store {
    executions: RwLock<HashMap<Uuid, Execution>>,
    rollback_plans: RwLock<HashMap<Uuid, RollbackPlan>>,
    rollback_plans_by_execution: RwLock<HashMap<Uuid, Uuid>>,
    rollback_executions: RwLock<HashMap<Uuid, RollbackExecution>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_execution(&self, execution: Execution) {
        self.executions.write().await.insert(execution.id, execution);
    }

    pub async fn get_execution(&self, id: Uuid) -> Option<Execution> {
        self.executions.read().await.get(&id).cloned()
    }

    pub async fn list_executions(
        &self,
        actor_id: Option<&str>,
        filter: &ExecutionFilter,
        page: Page,
    ) -> ExecutionPage {
        let page = page.clamp();
        let guard = self.executions.read().await;
        let mut matching: Vec<Execution> = guard
            .values()
            .filter(|e| actor_id.is_none_or(|a| e.operation.actor_id == a))
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .filter(|e| filter.from.is_none_or(|from| e.created_at >= from))
            .filter(|e| filter.to.is_none_or(|to| e.created_at <= to))
            .cloned()
            .collect();

        matching.sort_by_key(|e| e.created_at);
        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();

        ExecutionPage { items, total }
    }

    pub async fn put_rollback_plan(&self, plan: RollbackPlan) {
        self.rollback_plans_by_execution
            .write()
            .await
            .insert(plan.execution_id, plan.id);
        self.rollback_plans.write().await.insert(plan.id, plan);
    }

    pub async fn get_rollback_plan(&self, id: Uuid) -> Option<RollbackPlan> {
        self.rollback_plans.read().await.get(&id).cloned()
    }

    pub async fn get_rollback_plan_for_execution(&self, execution_id: Uuid) -> Option<RollbackPlan> {
        let plan_id = *self
            .rollback_plans_by_execution
            .read()
            .await
            .get(&execution_id)?;
        self.get_rollback_plan(plan_id).await
    }

    pub async fn update_rollback_plan(&self, plan: RollbackPlan) {
        self.rollback_plans.write().await.insert(plan.id, plan);
    }

    pub async fn put_rollback_execution(&self, rollback_execution: RollbackExecution) {
        self.rollback_executions
            .write()
            .await
            .insert(rollback_execution.id, rollback_execution);
    }

    pub async fn get_rollback_execution(&self, id: Uuid) -> Option<RollbackExecution> {
        self.rollback_executions.read().await.get(&id).cloned()
    }

    /// True if some `RollbackExecution` for `plan_id` is currently
    /// `EXECUTING` (spec.md §4.7 precondition / §5 per-plan guard).
    pub async fn has_in_flight_rollback(&self, plan_id: Uuid) -> bool {
        self.rollback_executions
            .read()
            .await
            .values()
            .any(|re| {
                re.plan_id == plan_id
                    && re.status == crate::model::RollbackExecutionStatus::Executing
            })
    }
}
