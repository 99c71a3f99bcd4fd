use std::sync::Arc;

use anyhow::{Context, Result};
use kubechat::orchestrator::Orchestrator;
use kubechat::server::{self, ServerState};
use tokio::time;
use tracing::info;

pub async fn run(orchestrator: Arc<Orchestrator>, addr: String) -> Result<()> {
    let addr = addr.parse().context("invalid --addr")?;
    let state = ServerState {
        orchestrator: orchestrator.clone(),
    };

    println!("Starting kubechat HTTP server on {addr}...\n");
    println!("  Available endpoints:");
    println!("    POST /operations ................. submit an operation");
    println!("    GET  /operations .................. list executions");
    println!("    GET  /operations/:id .............. fetch one execution");
    println!("    POST /approvals/:id/decide ........ approve or reject");
    println!("    GET  /approvals/pending ........... list pending approvals");
    println!("    POST /executions/:id/rollback-plan  plan a rollback");
    println!("    GET  /executions/:id/rollback-validation");
    println!("    POST /rollback-plans/:id/execute .. replay a rollback");
    println!("    GET  /rollback-executions/:id ..... rollback status");
    println!("    GET  /audit/verify ................ verify the audit chain");
    println!("    GET  /healthz, /metrics");
    println!();

    tokio::spawn(run_approval_sweeper(orchestrator));

    server::serve(addr, state).await
}

async fn run_approval_sweeper(orchestrator: Arc<Orchestrator>) {
    let mut interval = time::interval(orchestrator.config().approval_sweep_interval);
    loop {
        interval.tick().await;
        info!("approval_sweep_tick");
        orchestrator.run_approval_sweep().await;
    }
}
