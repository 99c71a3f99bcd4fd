mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Submit {
            actor_id,
            session_id,
            verb,
            resource_kind,
            namespace,
            name,
            cluster_context,
            replicas,
            tail_lines,
            grace_period_seconds,
        } => {
            let orchestrator = commands::engine::build().await?;
            commands::submit::run(
                &orchestrator,
                actor_id,
                session_id,
                verb,
                resource_kind,
                namespace,
                name,
                cluster_context,
                replicas,
                tail_lines,
                grace_period_seconds,
            )
            .await?;
        }
        Commands::Get { execution_id } => {
            let orchestrator = commands::engine::build().await?;
            commands::get::run(&orchestrator, execution_id).await?;
        }
        Commands::List { actor_id, limit, offset } => {
            let orchestrator = commands::engine::build().await?;
            commands::list::run(&orchestrator, actor_id, limit, offset).await?;
        }
        Commands::Decide {
            approval_id,
            approver_id,
            decision,
            reason,
        } => {
            let orchestrator = commands::engine::build().await?;
            commands::decide::run(&orchestrator, approval_id, approver_id, decision, reason).await?;
        }
        Commands::Pending => {
            let orchestrator = commands::engine::build().await?;
            commands::pending::run(&orchestrator).await?;
        }
        Commands::PlanRollback { execution_id } => {
            let orchestrator = commands::engine::build().await?;
            commands::rollback::plan(&orchestrator, execution_id).await?;
        }
        Commands::ValidateRollback { execution_id } => {
            let orchestrator = commands::engine::build().await?;
            commands::rollback::validate(&orchestrator, execution_id).await?;
        }
        Commands::ExecuteRollback { plan_id, actor_id } => {
            let orchestrator = commands::engine::build().await?;
            commands::rollback::execute(&orchestrator, plan_id, actor_id).await?;
        }
        Commands::RollbackStatus { rollback_execution_id } => {
            let orchestrator = commands::engine::build().await?;
            commands::rollback::status(&orchestrator, rollback_execution_id).await?;
        }
        Commands::VerifyAudit { from, to } => {
            let orchestrator = commands::engine::build().await?;
            commands::verify_audit::run(&orchestrator, from, to).await?;
        }
        Commands::Serve { addr } => {
            let orchestrator = commands::engine::build().await?;
            commands::serve::run(orchestrator, addr).await?;
        }
    }

    Ok(())
}
