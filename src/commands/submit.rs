use anyhow::{bail, Result};
use kubechat::model::{Operation, OperationArgs, ResourceKind, SubmitStatus, Verb};
use kubechat::orchestrator::Orchestrator;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    orchestrator: &Orchestrator,
    actor_id: String,
    session_id: String,
    verb: String,
    resource_kind: String,
    namespace: String,
    name: String,
    cluster_context: String,
    replicas: Option<i32>,
    tail_lines: Option<i64>,
    grace_period_seconds: Option<i64>,
) -> Result<()> {
    let verb = parse_verb(&verb)?;
    let resource_kind = parse_resource_kind(&resource_kind)?;

    let arguments = match verb {
        Verb::Scale => {
            let Some(replicas) = replicas else {
                bail!("scale requires --replicas");
            };
            OperationArgs::Scale {
                replicas,
                current_replicas: None,
            }
        }
        Verb::Logs => OperationArgs::Logs { tail_lines },
        Verb::Delete => OperationArgs::Delete {
            grace_period_seconds,
        },
        Verb::Get | Verb::List | Verb::Restart => OperationArgs::Empty,
    };

    let operation = Operation::new(
        actor_id,
        session_id,
        verb,
        resource_kind,
        namespace,
        name,
        cluster_context,
        arguments,
    );

    let outcome = orchestrator.submit_operation(operation).await?;

    println!("execution_id: {}", outcome.execution_id);
    match outcome.status {
        SubmitStatus::ExecutingImmediate => println!("status: executing immediately"),
        SubmitStatus::PendingApproval => {
            let approval = outcome.approval.expect("approval handle present when pending");
            println!("status: pending approval");
            println!("approval_id: {}", approval.id);
            println!("expires_at: {}", approval.expires_at);
        }
    }

    Ok(())
}

fn parse_verb(raw: &str) -> Result<Verb> {
    Ok(match raw {
        "get" => Verb::Get,
        "list" => Verb::List,
        "delete" => Verb::Delete,
        "scale" => Verb::Scale,
        "restart" => Verb::Restart,
        "logs" => Verb::Logs,
        other => bail!("unknown verb '{other}'. Supported: get, list, delete, scale, restart, logs"),
    })
}

fn parse_resource_kind(raw: &str) -> Result<ResourceKind> {
    Ok(match raw {
        "pods" => ResourceKind::Pods,
        "deployments" => ResourceKind::Deployments,
        "services" => ResourceKind::Services,
        "configmaps" => ResourceKind::Configmaps,
        "secrets" => ResourceKind::Secrets,
        other => bail!(
            "unknown resource kind '{other}'. Supported: pods, deployments, services, configmaps, secrets"
        ),
    })
}
