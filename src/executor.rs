use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::model::{Execution, ExecutionStatus};
use crate::ports::ExecutorPort;

/// Invokes `ExecutorPort` with timeout/cancel and records the result onto
/// an [`Execution`] (C5). Never retries; retries are the caller's concern.
pub struct ExecutionDriver {
    port: Arc<dyn ExecutorPort>,
    default_timeout: Duration,
}

impl ExecutionDriver {
    pub fn new(port: Arc<dyn ExecutorPort>, default_timeout: Duration) -> Self {
        Self {
            port,
            default_timeout,
        }
    }

    /// Preconditions (checked by the caller, asserted here defensively):
    /// `execution.status == Approved` or
    /// `(execution.safety_level != Dangerous && execution.status == Pending)`.
    pub async fn run(&self, execution: &mut Execution, ctx: CancellationToken, caller_deadline: Option<Duration>) {
        execution.status = ExecutionStatus::Executing;
        let started_at = Utc::now();
        execution.executed_at = Some(started_at);

        let deadline = match caller_deadline {
            Some(d) => d.min(self.default_timeout),
            None => self.default_timeout,
        };

        let outcome = self.port.apply(&execution.operation, deadline, ctx).await;
        let completed_at = Utc::now();
        execution.completed_at = Some(completed_at);
        execution.duration_ms = Some((completed_at - started_at).num_milliseconds());

        match outcome {
            Ok(result) => {
                execution.status = ExecutionStatus::Completed;
                execution.result = Some(result);
                execution.error = None;
            }
            Err(EngineError::ExecutionTimeout(msg)) => {
                execution.status = ExecutionStatus::Timeout;
                execution.error = Some(format!("execution_timeout: {msg}"));
            }
            Err(EngineError::Cancelled(msg)) => {
                execution.status = ExecutionStatus::Cancelled;
                execution.error = Some(format!("cancelled: {msg}"));
            }
            Err(other) => {
                execution.status = ExecutionStatus::Failed;
                execution.error = Some(other.to_string());
            }
        }
    }
}
