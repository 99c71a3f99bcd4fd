use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::error::{EngineError, EngineResult};
use crate::model::{AuditRecord, AuditRecordDraft, VerifyResult};

const FIELD_SEPARATOR: u8 = 0x1E;
const CHAIN_SEPARATOR: u8 = 0x7C;

#[derive(Default)]
struct ChainState {
    records: Vec<AuditRecord>,
}

/// Single logical appender for the tamper-evident audit chain (C2).
///
/// `append` is serialized through a single-writer `tokio::sync::Mutex`
/// (spec.md §5: "single-writer mutex... readers snapshot then verify").
/// `verify` clones the relevant slice under a short lock and recomputes
/// outside of it, so verification never blocks concurrent appends for
/// longer than the snapshot copy.
pub struct AuditChain {
    state: Mutex<ChainState>,
}

impl Default for AuditChain {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditChain {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Append one record, returning its assigned `seq`.
    ///
    /// If the (in this implementation, infallible) durable write were to
    /// fail, `seq` must not be consumed and the caller gets
    /// `EngineError::AuditPersistFailed` — see spec.md §4.2 "Failure
    /// semantics". The in-memory store never fails this way, but the
    /// error path is retained so callers (the orchestrator) exercise the
    /// same branch a durable backend would require.
    pub async fn append(&self, draft: AuditRecordDraft) -> EngineResult<u64> {
        let mut guard = self.state.lock().await;

        let prev = guard.records.last().map(|r| r.checksum.clone());
        let seq = guard.records.last().map(|r| r.seq + 1).unwrap_or(0);
        let timestamp = Utc::now();

        let bytes = canonical_bytes(
            timestamp,
            draft.actor_id.as_deref(),
            draft.session_id.as_deref(),
            &draft.query_text,
            &draft.generated_command,
            draft.safety_level.as_str(),
            draft.execution_status,
            draft.execution_result.as_ref(),
            draft.cluster_context.as_deref(),
            draft.namespace_context.as_deref(),
            draft.source_ip.as_deref(),
            draft.user_agent.as_deref(),
        );
        let checksum = hash_record(&bytes, prev.as_deref());

        let record = AuditRecord {
            seq,
            actor_id: draft.actor_id,
            session_id: draft.session_id,
            query_text: draft.query_text,
            generated_command: draft.generated_command,
            safety_level: draft.safety_level,
            execution_status: draft.execution_status,
            execution_result: draft.execution_result,
            cluster_context: draft.cluster_context,
            namespace_context: draft.namespace_context,
            timestamp,
            source_ip: draft.source_ip,
            user_agent: draft.user_agent,
            checksum,
            previous_checksum: prev,
        };

        guard.records.push(record);
        Ok(seq)
    }

    /// Recompute and compare checksums for an inclusive `[a, b]` range
    /// (default: full chain). Read-only; may run concurrently with
    /// `append`.
    pub async fn verify(&self, range: Option<(u64, u64)>) -> Vec<VerifyResult> {
        let snapshot = {
            let guard = self.state.lock().await;
            guard.records.clone()
        };

        let (lo, hi) = range.unwrap_or((0, snapshot.len().saturating_sub(1) as u64));

        snapshot
            .iter()
            .filter(|r| r.seq >= lo && r.seq <= hi)
            .map(|record| verify_one(record, &snapshot))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Fetch all records whose logical `execution_id` (carried via
    /// `query_text`/caller bookkeeping at the orchestrator layer) matches.
    /// Exposed for tests and the `verify-audit` CLI command; the chain
    /// itself only indexes by `seq`.
    pub async fn snapshot(&self) -> Vec<AuditRecord> {
        self.state.lock().await.records.clone()
    }
}

#[allow(clippy::too_many_arguments)]
fn canonical_bytes(
    timestamp: DateTime<Utc>,
    actor_id: Option<&str>,
    session_id: Option<&str>,
    query_text: &str,
    generated_command: &str,
    safety_level: &str,
    execution_status: crate::model::ExecutionStatus,
    execution_result: Option<&crate::model::OperationResult>,
    cluster_context: Option<&str>,
    namespace_context: Option<&str>,
    source_ip: Option<&str>,
    user_agent: Option<&str>,
) -> Vec<u8> {
    let execution_result_json = execution_result
        .map(|r| serde_json::to_string(r).unwrap_or_default())
        .unwrap_or_default();
    let execution_status_str = serde_json::to_value(execution_status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    let fields: [&str; 12] = [
        &timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
        actor_id.unwrap_or(""),
        session_id.unwrap_or(""),
        query_text,
        generated_command,
        safety_level,
        &execution_status_str,
        &execution_result_json,
        cluster_context.unwrap_or(""),
        namespace_context.unwrap_or(""),
        source_ip.unwrap_or(""),
        user_agent.unwrap_or(""),
    ];

    let mut bytes = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            bytes.push(FIELD_SEPARATOR);
        }
        bytes.extend_from_slice(field.as_bytes());
    }
    bytes
}

fn hash_record(canonical: &[u8], previous_checksum: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical);
    hasher.update([CHAIN_SEPARATOR]);
    if let Some(prev) = previous_checksum {
        hasher.update(prev.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn verify_one(record: &AuditRecord, chain: &[AuditRecord]) -> VerifyResult {
    let bytes = canonical_bytes(
        record.timestamp,
        record.actor_id.as_deref(),
        record.session_id.as_deref(),
        &record.query_text,
        &record.generated_command,
        record.safety_level.as_str(),
        record.execution_status,
        record.execution_result.as_ref(),
        record.cluster_context.as_deref(),
        record.namespace_context.as_deref(),
        record.source_ip.as_deref(),
        record.user_agent.as_deref(),
    );
    let recomputed = hash_record(&bytes, record.previous_checksum.as_deref());

    if recomputed != record.checksum {
        return VerifyResult {
            seq: record.seq,
            ok: false,
            reason: Some("checksum mismatch".to_string()),
        };
    }

    if record.seq > 0 {
        let expected_prev = chain
            .iter()
            .find(|r| r.seq == record.seq - 1)
            .map(|r| r.checksum.clone());
        if expected_prev != record.previous_checksum {
            return VerifyResult {
                seq: record.seq,
                ok: false,
                reason: Some("previous_checksum does not match predecessor".to_string()),
            };
        }
    }

    VerifyResult {
        seq: record.seq,
        ok: true,
        reason: None,
    }
}

/// Maps an infallible in-memory persistence step's hypothetical failure
/// onto the taxonomy's dedicated kind. Kept as a free function so the
/// orchestrator (and a future durable `Store`) share one conversion site.
pub fn persist_failed(context: impl Into<String>) -> EngineError {
    EngineError::AuditPersistFailed(context.into())
}
