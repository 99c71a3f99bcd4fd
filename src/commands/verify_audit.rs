use anyhow::Result;
use kubechat::orchestrator::Orchestrator;

pub async fn run(orchestrator: &Orchestrator, from: Option<u64>, to: Option<u64>) -> Result<()> {
    let range = match (from, to) {
        (Some(a), Some(b)) => Some((a, b)),
        _ => None,
    };

    let results = orchestrator.verify_audit_chain(range).await;
    let failures: Vec<_> = results.iter().filter(|r| !r.ok).collect();

    println!("checked: {} records", results.len());
    if failures.is_empty() {
        println!("result: OK, chain intact");
    } else {
        println!("result: TAMPERED");
        for failure in &failures {
            println!(
                "  seq {}: {}",
                failure.seq,
                failure.reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    Ok(())
}
