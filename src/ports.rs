use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::model::{CapturedState, Operation, OperationArgs, OperationResult, ResourceKind, Verb};

/// The abstract cluster-facing interface KubeChat drives every concrete
/// operation through. Out of scope per spec.md §1 ("The Kubernetes client
/// itself... is assumed"); this module only defines the contract plus one
/// real `kube-rs` adapter and one scripted test double.
#[async_trait]
pub trait ExecutorPort: Send + Sync {
    /// Apply `operation` against the cluster, honouring `deadline` and
    /// `cancel`. Implementations MUST stop work promptly on cancellation
    /// rather than let the caller's `select!` abandon them silently.
    async fn apply(
        &self,
        operation: &Operation,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<OperationResult, EngineError>;
}

/// A `kube-rs`-backed executor for the verbs this engine supports.
///
/// Grounded on `enforcement.rs`'s `Api<Deployment>`/`Patch` usage and
/// `multi_cluster.rs`'s `Api<Pod>::list` — the same `kube::Api<T>` +
/// `PatchParams`/`ListParams` idioms, generalized from governance checks
/// to the operation verbs KubeChat actually executes.
pub struct KubeExecutor {
    client: kube::Client,
}

impl KubeExecutor {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutorPort for KubeExecutor {
    async fn apply(
        &self,
        operation: &Operation,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<OperationResult, EngineError> {
        let fut = self.apply_inner(operation);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled(format!(
                "operation {} cancelled before completion", operation.id
            ))),
            res = tokio::time::timeout(deadline, fut) => match res {
                Ok(inner) => inner,
                Err(_) => Err(EngineError::ExecutionTimeout(format!(
                    "operation {} exceeded {:?}", operation.id, deadline
                ))),
            },
        }
    }
}

impl KubeExecutor {
    async fn apply_inner(&self, operation: &Operation) -> Result<OperationResult, EngineError> {
        use k8s_openapi::api::apps::v1::Deployment;
        use k8s_openapi::api::core::v1::Pod;
        use kube::api::{Api, DeleteParams, Patch, PatchParams};

        match (operation.verb, operation.resource_kind) {
            (Verb::Get | Verb::List, _) => {
                let api: Api<Pod> = Api::namespaced(self.client.clone(), &operation.namespace);
                api.list(&Default::default())
                    .await
                    .map_err(|e| EngineError::ExternalFailure(e.to_string()))?;
                Ok(OperationResult {
                    success: true,
                    message: None,
                    previous_state: None,
                    backup_data: None,
                    raw: None,
                })
            }
            (Verb::Logs, _) => Ok(OperationResult {
                success: true,
                message: Some("log retrieval is delegated to the transport layer".to_string()),
                previous_state: None,
                backup_data: None,
                raw: None,
            }),
            (Verb::Scale, ResourceKind::Deployments) => {
                let OperationArgs::Scale {
                    replicas,
                    current_replicas,
                } = &operation.arguments
                else {
                    return Err(EngineError::InvalidInput(
                        "scale operation missing replicas argument".to_string(),
                    ));
                };

                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &operation.namespace);
                let previous = match current_replicas {
                    Some(v) => *v,
                    None => api
                        .get(&operation.name)
                        .await
                        .map_err(|e| EngineError::ExternalFailure(e.to_string()))?
                        .spec
                        .and_then(|s| s.replicas)
                        .unwrap_or(0),
                };

                let patch = serde_json::json!({ "spec": { "replicas": replicas } });
                api.patch(
                    &operation.name,
                    &PatchParams::apply("kubechat"),
                    &Patch::Merge(&patch),
                )
                .await
                .map_err(|e| EngineError::ExternalFailure(e.to_string()))?;

                Ok(OperationResult {
                    success: true,
                    message: Some(format!("scaled to {replicas} replicas")),
                    previous_state: Some(CapturedState::Scale {
                        previous_replicas: previous,
                    }),
                    backup_data: None,
                    raw: None,
                })
            }
            (Verb::Restart, ResourceKind::Deployments) => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &operation.namespace);
                let now = chrono::Utc::now().to_rfc3339();
                let patch = serde_json::json!({
                    "spec": { "template": { "metadata": { "annotations": {
                        "kubectl.kubernetes.io/restartedAt": now
                    }}}}
                });
                api.patch(
                    &operation.name,
                    &PatchParams::apply("kubechat"),
                    &Patch::Merge(&patch),
                )
                .await
                .map_err(|e| EngineError::ExternalFailure(e.to_string()))?;

                Ok(OperationResult {
                    success: true,
                    message: Some("rollout restarted".to_string()),
                    previous_state: None,
                    backup_data: None,
                    raw: None,
                })
            }
            (Verb::Delete, ResourceKind::Pods) => {
                let api: Api<Pod> = Api::namespaced(self.client.clone(), &operation.namespace);
                api.delete(&operation.name, &DeleteParams::default())
                    .await
                    .map_err(|e| EngineError::ExternalFailure(e.to_string()))?;
                Ok(OperationResult {
                    success: true,
                    message: Some("pod deleted; controller will recreate".to_string()),
                    previous_state: None,
                    backup_data: None,
                    raw: None,
                })
            }
            (Verb::Delete, ResourceKind::Deployments) => {
                let api: Api<Deployment> =
                    Api::namespaced(self.client.clone(), &operation.namespace);
                self.delete_with_backup(&api, &operation.name).await
            }
            (Verb::Delete, ResourceKind::Services) => {
                use k8s_openapi::api::core::v1::Service;
                let api: Api<Service> = Api::namespaced(self.client.clone(), &operation.namespace);
                self.delete_with_backup(&api, &operation.name).await
            }
            (Verb::Delete, ResourceKind::Configmaps) => {
                use k8s_openapi::api::core::v1::ConfigMap;
                let api: Api<ConfigMap> =
                    Api::namespaced(self.client.clone(), &operation.namespace);
                self.delete_with_backup(&api, &operation.name).await
            }
            (Verb::Delete, ResourceKind::Secrets) => {
                use k8s_openapi::api::core::v1::Secret;
                let api: Api<Secret> = Api::namespaced(self.client.clone(), &operation.namespace);
                self.delete_with_backup(&api, &operation.name).await
            }
            _ => Err(EngineError::InvalidInput(format!(
                "unsupported verb/kind combination: {:?}/{:?}",
                operation.verb, operation.resource_kind
            ))),
        }
    }

    /// Captures the object's manifest before deleting it, satisfying the
    /// engine's contract that reversible verbs populate `backup_data` on
    /// success (spec.md §9's open question on `previous_state`/`backup_data`).
    async fn delete_with_backup<K>(&self, api: &kube::Api<K>, name: &str) -> Result<OperationResult, EngineError>
    where
        K: kube::Resource<DynamicType = ()> + Clone + std::fmt::Debug + serde::Serialize + for<'de> serde::Deserialize<'de>,
    {
        let manifest = api
            .get(name)
            .await
            .map_err(|e| EngineError::ExternalFailure(e.to_string()))?;
        let backup = serde_json::to_value(&manifest).map_err(|e| EngineError::ExternalFailure(e.to_string()))?;

        api.delete(name, &kube::api::DeleteParams::default())
            .await
            .map_err(|e| EngineError::ExternalFailure(e.to_string()))?;

        Ok(OperationResult {
            success: true,
            message: Some(format!("{name} deleted; manifest captured for rollback")),
            previous_state: None,
            backup_data: Some(backup),
            raw: None,
        })
    }
}

/// A test double that returns scripted results without touching a cluster.
/// Mirrors the teacher's preference for small, explicit fakes over mocking
/// frameworks (none of the pack repos pull in a mocking crate).
pub struct ScriptedExecutor {
    pub result: Result<OperationResult, EngineError>,
    pub delay: Duration,
}

impl ScriptedExecutor {
    pub fn success(result: OperationResult) -> Self {
        Self {
            result: Ok(result),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(error: EngineError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ExecutorPort for ScriptedExecutor {
    async fn apply(
        &self,
        _operation: &Operation,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<OperationResult, EngineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(EngineError::Cancelled("scripted executor cancelled".to_string())),
            _ = tokio::time::sleep(self.delay) => {
                if self.delay >= deadline {
                    Err(EngineError::ExecutionTimeout("scripted executor exceeded deadline".to_string()))
                } else {
                    self.result.clone()
                }
            }
        }
    }
}
