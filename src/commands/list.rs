use anyhow::Result;
use kubechat::model::{describe_operation, ExecutionFilter, Page};
use kubechat::orchestrator::Orchestrator;

pub async fn run(
    orchestrator: &Orchestrator,
    actor_id: Option<String>,
    limit: u32,
    offset: u32,
) -> Result<()> {
    let page = orchestrator
        .list_executions(actor_id.as_deref(), ExecutionFilter::default(), Page { limit, offset })
        .await;

    println!(
        "{:<36} {:<12} {:<10} {:<50}",
        "EXECUTION_ID", "STATUS", "SAFETY", "COMMAND"
    );
    println!("{}", "-".repeat(112));

    for execution in &page.items {
        println!(
            "{:<36} {:<12} {:<10} {:<50}",
            execution.id,
            format!("{:?}", execution.status),
            execution.safety_level.as_str(),
            describe_operation(&execution.operation)
        );
    }

    println!("\nShowing {} of {} executions", page.items.len(), page.total);
    Ok(())
}
