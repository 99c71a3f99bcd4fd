use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kubechat")]
#[command(about = "Command lifecycle engine for natural-language Kubernetes operations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit an operation for classification and (conditional) execution
    Submit {
        #[arg(long)]
        actor_id: String,
        #[arg(long, default_value = "cli-session")]
        session_id: String,
        /// get | list | delete | scale | restart | logs
        #[arg(long)]
        verb: String,
        /// pods | deployments | services | configmaps | secrets
        #[arg(long)]
        resource_kind: String,
        #[arg(long)]
        namespace: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "default")]
        cluster_context: String,
        /// Target replica count, required for `scale`
        #[arg(long)]
        replicas: Option<i32>,
        /// Tail line count hint, used by `logs`
        #[arg(long)]
        tail_lines: Option<i64>,
        /// Grace period in seconds, used by `delete`
        #[arg(long)]
        grace_period_seconds: Option<i64>,
    },

    /// Fetch one Execution by id
    Get { execution_id: uuid::Uuid },

    /// List Executions, optionally filtered by actor
    List {
        #[arg(long)]
        actor_id: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Approve or reject a pending Approval
    Decide {
        approval_id: uuid::Uuid,
        #[arg(long)]
        approver_id: String,
        /// approve | reject
        #[arg(long)]
        decision: String,
        #[arg(long)]
        reason: Option<String>,
    },

    /// List approvals currently awaiting a decision
    Pending,

    /// Generate (or fetch the existing) rollback plan for a completed Execution
    PlanRollback { execution_id: uuid::Uuid },

    /// Report the blocking validation reasons, if any, for an Execution's rollback plan
    ValidateRollback { execution_id: uuid::Uuid },

    /// Replay a planned rollback's steps
    ExecuteRollback {
        plan_id: uuid::Uuid,
        #[arg(long)]
        actor_id: String,
    },

    /// Fetch the status and step log of a rollback execution
    RollbackStatus { rollback_execution_id: uuid::Uuid },

    /// Verify the hash chain of the audit log, optionally restricted to [from, to]
    VerifyAudit {
        #[arg(long)]
        from: Option<u64>,
        #[arg(long)]
        to: Option<u64>,
    },

    /// Run the demo HTTP server
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: String,
    },
}
