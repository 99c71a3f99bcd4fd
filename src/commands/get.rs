use anyhow::Result;
use kubechat::model::describe_operation;
use kubechat::orchestrator::Orchestrator;
use uuid::Uuid;

pub async fn run(orchestrator: &Orchestrator, execution_id: Uuid) -> Result<()> {
    let execution = orchestrator.get_execution(execution_id).await?;

    println!("execution_id: {}", execution.id);
    println!("status: {:?}", execution.status);
    println!("safety_level: {}", execution.safety_level.as_str());
    println!("command: {}", describe_operation(&execution.operation));
    println!("created_at: {}", execution.created_at);
    if let Some(t) = execution.executed_at {
        println!("executed_at: {t}");
    }
    if let Some(t) = execution.completed_at {
        println!("completed_at: {t}");
    }
    if let Some(ms) = execution.duration_ms {
        println!("duration_ms: {ms}");
    }
    if let Some(err) = &execution.error {
        println!("error: {err}");
    }
    if let Some(result) = &execution.result {
        println!("result.success: {}", result.success);
        if let Some(msg) = &result.message {
            println!("result.message: {msg}");
        }
    }

    Ok(())
}
