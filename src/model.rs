use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/* ============================= OPERATION ============================= */

/// A single Kubernetes verb KubeChat knows how to translate and execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Get,
    List,
    Delete,
    Scale,
    Restart,
    Logs,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::List => "list",
            Verb::Delete => "delete",
            Verb::Scale => "scale",
            Verb::Restart => "restart",
            Verb::Logs => "logs",
        }
    }

    /// Verbs for which a compensating rollback plan can ever be produced
    /// (spec.md §4.5's reversibility matrix, kind-independent half).
    pub fn is_reversible_candidate(&self) -> bool {
        matches!(self, Verb::Scale | Verb::Delete)
    }
}

/// The kind of resource an [`Operation`] targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Pods,
    Deployments,
    Services,
    Configmaps,
    Secrets,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Pods => "pods",
            ResourceKind::Deployments => "deployments",
            ResourceKind::Services => "services",
            ResourceKind::Configmaps => "configmaps",
            ResourceKind::Secrets => "secrets",
        }
    }
}

/// Verb-specific arguments, represented as a tagged variant rather than a
/// map-of-anything (spec.md §9 "Polymorphism").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationArgs {
    Scale {
        replicas: i32,
        /// Planner-supplied hint of the current replica count, if known.
        #[serde(default)]
        current_replicas: Option<i32>,
    },
    Logs {
        #[serde(default)]
        tail_lines: Option<i64>,
    },
    Delete {
        #[serde(default)]
        grace_period_seconds: Option<i64>,
    },
    Empty,
}

impl Default for OperationArgs {
    fn default() -> Self {
        OperationArgs::Empty
    }
}

/// The intent to change (or read) cluster state, produced by the (out of
/// scope) upstream NL planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub actor_id: String,
    pub session_id: String,
    pub verb: Verb,
    pub resource_kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub cluster_context: String,
    #[serde(default)]
    pub arguments: OperationArgs,
    /// A pre-classified hint from the upstream planner. Always re-validated
    /// by the classifier; never authoritative on its own (spec.md §9).
    #[serde(default)]
    pub safety_hint: Option<SafetyLevel>,
    pub created_at: DateTime<Utc>,
}

impl Operation {
    pub fn new(
        actor_id: impl Into<String>,
        session_id: impl Into<String>,
        verb: Verb,
        resource_kind: ResourceKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
        cluster_context: impl Into<String>,
        arguments: OperationArgs,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            actor_id: actor_id.into(),
            session_id: session_id.into(),
            verb,
            resource_kind,
            namespace: namespace.into(),
            name: name.into(),
            cluster_context: cluster_context.into(),
            arguments,
            safety_hint: None,
            created_at: Utc::now(),
        }
    }
}

/* ============================= SAFETY ============================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SafetyLevel {
    Safe,
    Warning,
    Dangerous,
}

impl SafetyLevel {
    /// Escalate one step, saturating at `Dangerous` (spec.md §4.1 step 6).
    pub fn escalate(self) -> Self {
        match self {
            SafetyLevel::Safe => SafetyLevel::Warning,
            SafetyLevel::Warning => SafetyLevel::Dangerous,
            SafetyLevel::Dangerous => SafetyLevel::Dangerous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyLevel::Safe => "SAFE",
            SafetyLevel::Warning => "WARNING",
            SafetyLevel::Dangerous => "DANGEROUS",
        }
    }
}

/* ============================= EXECUTION ============================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    PendingApproval,
    Approved,
    Executing,
    Completed,
    Failed,
    Timeout,
    Rejected,
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Timeout
                | ExecutionStatus::Rejected
                | ExecutionStatus::Cancelled
        )
    }
}

/// Captured state attached to a successful [`OperationResult`] for a
/// reversible verb. Opaque to the engine, typed for the `ExecutorPort`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CapturedState {
    Scale { previous_replicas: i32 },
    Manifest { manifest: serde_json::Value },
    None,
}

/// The result of invoking `ExecutorPort::Apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Required to be populated on success for reversible verbs (spec.md §9).
    #[serde(default)]
    pub previous_state: Option<CapturedState>,
    /// Manifest bytes needed to recreate a deleted object; required on
    /// success for `delete` of {deployments, services, configmaps, secrets}.
    #[serde(default)]
    pub backup_data: Option<serde_json::Value>,
    #[serde(default)]
    pub raw: Option<serde_json::Value>,
}

/// The workflow record for one [`Operation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub operation: Operation,
    pub safety_level: SafetyLevel,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub approval_id: Option<Uuid>,
    #[serde(default)]
    pub result: Option<OperationResult>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Execution {
    pub fn new(operation: Operation, safety_level: SafetyLevel) -> Self {
        Self {
            id: operation.id,
            operation,
            safety_level,
            status: ExecutionStatus::Pending,
            approval_id: None,
            result: None,
            created_at: Utc::now(),
            executed_at: None,
            completed_at: None,
            duration_ms: None,
            error: None,
        }
    }
}

/* ============================= APPROVAL ============================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Approval {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub requester_id: String,
    #[serde(default)]
    pub approver_id: Option<String>,
    pub status: ApprovalStatus,
    #[serde(default)]
    pub reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub decided_at: Option<DateTime<Utc>>,
}

/* ============================= AUDIT ============================= */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub query_text: String,
    pub generated_command: String,
    pub safety_level: SafetyLevel,
    pub execution_status: ExecutionStatus,
    #[serde(default)]
    pub execution_result: Option<OperationResult>,
    #[serde(default)]
    pub cluster_context: Option<String>,
    #[serde(default)]
    pub namespace_context: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub source_ip: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub checksum: String,
    #[serde(default)]
    pub previous_checksum: Option<String>,
}

/// The not-yet-sequenced, not-yet-hashed payload handed to the audit chain.
/// `AuditChain::append` fills in `seq`, `timestamp`, and the checksums.
#[derive(Debug, Clone)]
pub struct AuditRecordDraft {
    pub actor_id: Option<String>,
    pub session_id: Option<String>,
    pub query_text: String,
    pub generated_command: String,
    pub safety_level: SafetyLevel,
    pub execution_status: ExecutionStatus,
    pub execution_result: Option<OperationResult>,
    pub cluster_context: Option<String>,
    pub namespace_context: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditRecordDraft {
    pub fn for_execution(execution: &Execution) -> Self {
        Self {
            actor_id: Some(execution.operation.actor_id.clone()),
            session_id: Some(execution.operation.session_id.clone()),
            query_text: format!(
                "{} {} {}/{}",
                execution.operation.verb.as_str(),
                execution.operation.resource_kind.as_str(),
                execution.operation.namespace,
                execution.operation.name
            ),
            generated_command: describe_operation(&execution.operation),
            safety_level: execution.safety_level,
            execution_status: execution.status,
            execution_result: execution.result.clone(),
            cluster_context: Some(execution.operation.cluster_context.clone()),
            namespace_context: Some(execution.operation.namespace.clone()),
            source_ip: None,
            user_agent: None,
        }
    }
}

/// Render a human/machine-readable description of the concrete command the
/// planner's `Operation` corresponds to (used as `generated_command`).
pub fn describe_operation(op: &Operation) -> String {
    match &op.arguments {
        OperationArgs::Scale {
            replicas,
            current_replicas,
        } => format!(
            "kubectl scale deployment/{} --replicas={} -n {} (current={:?})",
            op.name, replicas, op.namespace, current_replicas
        ),
        OperationArgs::Logs { tail_lines } => format!(
            "kubectl logs {}/{} -n {} (tail={:?})",
            op.resource_kind.as_str(),
            op.name,
            op.namespace,
            tail_lines
        ),
        OperationArgs::Delete {
            grace_period_seconds,
        } => format!(
            "kubectl delete {}/{} -n {} (grace={:?})",
            op.resource_kind.as_str(),
            op.name,
            op.namespace,
            grace_period_seconds
        ),
        OperationArgs::Empty => format!(
            "kubectl {} {}/{} -n {}",
            op.verb.as_str(),
            op.resource_kind.as_str(),
            op.name,
            op.namespace
        ),
    }
}

/// Outcome of verifying a single audit record against its chain neighbour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResult {
    pub seq: u64,
    pub ok: bool,
    #[serde(default)]
    pub reason: Option<String>,
}

/* ============================= ROLLBACK PLAN ============================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackPlanStatus {
    Planned,
    Executing,
    Completed,
    Failed,
    Cancelled,
    Invalid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackStep {
    pub sequence: u32,
    pub verb: Verb,
    pub resource_kind: ResourceKind,
    pub namespace: String,
    pub name: String,
    pub description: String,
    pub captured_state: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackValidation {
    #[serde(default)]
    pub blocking: Vec<String>,
}

impl RollbackValidation {
    pub fn is_blocked(&self) -> bool {
        !self.blocking.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackPlan {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub actor_id: String,
    pub session_id: String,
    pub original_operation: Operation,
    pub steps: Vec<RollbackStep>,
    pub status: RollbackPlanStatus,
    pub reason: String,
    pub estimated_duration_ms: i64,
    #[serde(default)]
    pub validation: Option<RollbackValidation>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/* ============================= ROLLBACK EXECUTION ============================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RollbackExecutionStatus {
    Executing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLogEntry {
    pub sequence: u32,
    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackExecution {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub actor_id: String,
    pub status: RollbackExecutionStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub step_log: Vec<StepLogEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

/* ============================= EXTERNAL-INTERFACE DTOs ============================= */

/// The authenticated caller, assumed by spec.md §1 to arrive with every
/// inbound request (auth/role extraction is out of scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub actor_id: String,
    pub session_id: String,
    pub role: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitStatus {
    ExecutingImmediate,
    PendingApproval,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalHandle {
    pub id: Uuid,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub execution_id: Uuid,
    pub status: SubmitStatus,
    #[serde(default)]
    pub approval: Option<ApprovalHandle>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub status: Option<ExecutionStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Page {
    pub fn clamp(mut self) -> Self {
        self.limit = self.limit.min(100).max(1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionPage {
    pub items: Vec<Execution>,
    pub total: usize,
}
