mod common;

use kubechat::audit::AuditChain;
use kubechat::model::{AuditRecordDraft, ExecutionStatus, SafetyLevel};

fn draft(query_text: &str) -> AuditRecordDraft {
    AuditRecordDraft {
        actor_id: Some("u1".to_string()),
        session_id: Some("s1".to_string()),
        query_text: query_text.to_string(),
        generated_command: format!("kubectl get {query_text}"),
        safety_level: SafetyLevel::Safe,
        execution_status: ExecutionStatus::Completed,
        execution_result: None,
        cluster_context: Some("prod-cluster".to_string()),
        namespace_context: Some("default".to_string()),
        source_ip: None,
        user_agent: None,
    }
}

/// S1: a single appended record verifies clean over its own range.
#[tokio::test]
async fn single_record_verifies_ok() {
    let chain = AuditChain::new();
    let seq = chain.append(draft("pods/a")).await.unwrap();
    let results = chain.verify(Some((seq, seq))).await;
    assert_eq!(results.len(), 1);
    assert!(results[0].ok);
}

/// P2/P6: every record appended during a run verifies ok, and adjacent
/// seqs are chained by checksum.
#[tokio::test]
async fn full_chain_verifies_ok_and_is_linked() {
    let chain = AuditChain::new();
    for i in 0..10 {
        chain.append(draft(&format!("pods/{i}"))).await.unwrap();
    }

    let results = chain.verify(None).await;
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| r.ok));

    let records = chain.snapshot().await;
    for window in records.windows(2) {
        assert_eq!(window[1].previous_checksum.as_deref(), Some(window[0].checksum.as_str()));
    }
}

/// Verifying an inclusive sub-range only recomputes records in that range.
#[tokio::test]
async fn partial_range_verify_is_scoped() {
    let chain = AuditChain::new();
    for i in 0..10 {
        chain.append(draft(&format!("pods/{i}"))).await.unwrap();
    }

    let results = chain.verify(Some((3, 5))).await;
    let seqs: Vec<u64> = results.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, vec![3, 4, 5]);
    assert!(results.iter().all(|r| r.ok));
}

/// R3: mutating any single field changes the checksum (bit-flip detection).
#[tokio::test]
async fn single_field_change_changes_checksum() {
    let chain = AuditChain::new();
    chain.append(draft("pods/a")).await.unwrap();
    let original = chain.snapshot().await.into_iter().next().unwrap();

    let chain2 = AuditChain::new();
    let mut altered = draft("pods/a");
    altered.query_text = "pods/b".to_string();
    chain2.append(altered).await.unwrap();
    let mutated = chain2.snapshot().await.into_iter().next().unwrap();

    assert_ne!(original.checksum, mutated.checksum);
}

/// Verify is read-only and may run concurrently with appends.
#[tokio::test]
async fn verify_runs_concurrently_with_appends() {
    use std::sync::Arc;

    let chain = Arc::new(AuditChain::new());
    for i in 0..20 {
        chain.append(draft(&format!("pods/{i}"))).await.unwrap();
    }

    let appender = {
        let chain = chain.clone();
        tokio::spawn(async move {
            for i in 20..40 {
                chain.append(draft(&format!("pods/{i}"))).await.unwrap();
            }
        })
    };
    let verifier = {
        let chain = chain.clone();
        tokio::spawn(async move { chain.verify(None).await })
    };

    appender.await.unwrap();
    let results = verifier.await.unwrap();
    assert!(results.iter().all(|r| r.ok));
    assert_eq!(chain.len().await, 40);
}
