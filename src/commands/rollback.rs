use anyhow::Result;
use kubechat::orchestrator::Orchestrator;
use uuid::Uuid;

pub async fn plan(orchestrator: &Orchestrator, execution_id: Uuid) -> Result<()> {
    let plan = orchestrator.plan_rollback(execution_id).await?;

    println!("plan_id: {}", plan.id);
    println!("status: {:?}", plan.status);
    println!("reason: {}", plan.reason);
    println!("steps: {}", plan.steps.len());
    println!("estimated_duration_ms: {}", plan.estimated_duration_ms);
    if let Some(validation) = &plan.validation {
        if !validation.blocking.is_empty() {
            println!("blocking: {}", validation.blocking.join("; "));
        }
    }
    for step in &plan.steps {
        println!("  [{}] {}", step.sequence, step.description);
    }

    Ok(())
}

pub async fn validate(orchestrator: &Orchestrator, execution_id: Uuid) -> Result<()> {
    let validation = orchestrator.validate_rollback(execution_id).await?;

    if validation.blocking.is_empty() {
        println!("valid: rollback plan has no blocking reasons");
    } else {
        println!("invalid: {}", validation.blocking.join("; "));
    }

    Ok(())
}

pub async fn execute(orchestrator: &Orchestrator, plan_id: Uuid, actor_id: String) -> Result<()> {
    let rollback_execution = orchestrator.execute_rollback(plan_id, actor_id).await?;

    println!("rollback_execution_id: {}", rollback_execution.id);
    println!("status: {:?}", rollback_execution.status);
    for entry in &rollback_execution.step_log {
        println!("  step {}: {:?}", entry.sequence, entry.status);
        if let Some(err) = &entry.error {
            println!("    error: {err}");
        }
    }

    Ok(())
}

pub async fn status(orchestrator: &Orchestrator, rollback_execution_id: Uuid) -> Result<()> {
    let rollback_execution = orchestrator.get_rollback_status(rollback_execution_id).await?;

    println!("rollback_execution_id: {}", rollback_execution.id);
    println!("plan_id: {}", rollback_execution.plan_id);
    println!("status: {:?}", rollback_execution.status);
    println!("started_at: {}", rollback_execution.started_at);
    if let Some(t) = rollback_execution.completed_at {
        println!("completed_at: {t}");
    }
    for entry in &rollback_execution.step_log {
        println!("  step {}: {:?}", entry.sequence, entry.status);
    }

    Ok(())
}
