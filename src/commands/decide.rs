use anyhow::{bail, Result};
use kubechat::model::ApprovalDecision;
use kubechat::orchestrator::Orchestrator;
use uuid::Uuid;

pub async fn run(
    orchestrator: &Orchestrator,
    approval_id: Uuid,
    approver_id: String,
    decision: String,
    reason: Option<String>,
) -> Result<()> {
    let decision = match decision.as_str() {
        "approve" => ApprovalDecision::Approved,
        "reject" => ApprovalDecision::Rejected,
        other => bail!("unknown decision '{other}'. Supported: approve, reject"),
    };

    let approval = orchestrator
        .decide_approval(approval_id, approver_id, decision, reason)
        .await?;

    println!("approval_id: {}", approval.id);
    println!("status: {:?}", approval.status);
    if let Some(approver) = &approval.approver_id {
        println!("approver_id: {approver}");
    }

    Ok(())
}
