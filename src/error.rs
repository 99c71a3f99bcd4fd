use thiserror::Error;

/// Error taxonomy for the command lifecycle engine.
///
/// Every public operation on [`crate::orchestrator::Orchestrator`] and the
/// other components returns one of these kinds. Transport layers (the demo
/// `axum` router, the CLI) map these onto status codes / exit codes; that
/// mapping is not part of the core contract.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorised: {0}")]
    Unauthorised(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already decided: {0}")]
    AlreadyDecided(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("execution timed out: {0}")]
    ExecutionTimeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("external failure: {0}")]
    ExternalFailure(String),

    /// The chain append failed after a cluster-affecting call may already
    /// have happened. Operators must be paged; see `spec.md` §7.
    #[error("audit persist failed: {0}")]
    AuditPersistFailed(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    /// Stable machine-readable tag, used when stamping `Execution.error`.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Unauthorised(_) => "unauthorised",
            EngineError::NotFound(_) => "not_found",
            EngineError::AlreadyDecided(_) => "already_decided",
            EngineError::PreconditionFailed(_) => "precondition_failed",
            EngineError::ExecutionTimeout(_) => "execution_timeout",
            EngineError::Cancelled(_) => "cancelled",
            EngineError::ExternalFailure(_) => "external_failure",
            EngineError::AuditPersistFailed(_) => "audit_persist_failed",
            EngineError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
