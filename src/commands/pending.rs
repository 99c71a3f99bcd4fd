use anyhow::Result;
use kubechat::orchestrator::Orchestrator;

pub async fn run(orchestrator: &Orchestrator) -> Result<()> {
    let pending = orchestrator.list_pending_approvals(|_| true).await;

    println!("{:<36} {:<36} {:<14} {:<25}", "APPROVAL_ID", "EXECUTION_ID", "REQUESTER", "EXPIRES_AT");
    println!("{}", "-".repeat(114));

    for approval in &pending {
        println!(
            "{:<36} {:<36} {:<14} {:<25}",
            approval.id, approval.execution_id, approval.requester_id, approval.expires_at
        );
    }

    println!("\nTotal: {} pending approvals", pending.len());
    Ok(())
}
