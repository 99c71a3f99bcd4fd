use crate::config::EngineConfig;
use crate::model::{Operation, OperationArgs, ResourceKind, SafetyLevel, Verb};

/// Classify an [`Operation`]'s risk level from the static policy in
/// spec.md §4.1. Pure, deterministic, side-effect-free — callers must
/// never await inside this function.
pub fn classify(operation: &Operation, cfg: &EngineConfig) -> SafetyLevel {
    let base = classify_base(operation);
    let protected = cfg.protected_namespaces.contains(&operation.namespace);
    let reads_only = matches!(operation.verb, Verb::Get | Verb::List | Verb::Logs);

    if protected && !reads_only {
        base.escalate()
    } else {
        base
    }
}

fn classify_base(operation: &Operation) -> SafetyLevel {
    // 1. read-only verbs are always SAFE.
    if matches!(operation.verb, Verb::Get | Verb::List | Verb::Logs) {
        return SafetyLevel::Safe;
    }

    // 2. restarting a deployment is a WARNING.
    if operation.verb == Verb::Restart && operation.resource_kind == ResourceKind::Deployments {
        return SafetyLevel::Warning;
    }

    // 3. scaling a deployment: replicas=0 is DANGEROUS, everything else WARNING.
    if operation.verb == Verb::Scale && operation.resource_kind == ResourceKind::Deployments {
        if let OperationArgs::Scale { replicas, .. } = &operation.arguments {
            if *replicas == 0 {
                return SafetyLevel::Dangerous;
            }
        }
        return SafetyLevel::Warning;
    }

    // 4. deleting pods/configmaps is a WARNING.
    if operation.verb == Verb::Delete
        && matches!(
            operation.resource_kind,
            ResourceKind::Pods | ResourceKind::Configmaps
        )
    {
        return SafetyLevel::Warning;
    }

    // 5. deleting deployments/services/secrets is DANGEROUS.
    if operation.verb == Verb::Delete
        && matches!(
            operation.resource_kind,
            ResourceKind::Deployments | ResourceKind::Services | ResourceKind::Secrets
        )
    {
        return SafetyLevel::Dangerous;
    }

    // 7. conservative default.
    SafetyLevel::Warning
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Operation, OperationArgs};

    fn op(verb: Verb, kind: ResourceKind, ns: &str, args: OperationArgs) -> Operation {
        Operation::new("u1", "s1", verb, kind, ns, "thing", "prod-cluster", args)
    }

    #[test]
    fn reads_are_always_safe() {
        let cfg = EngineConfig::default();
        for verb in [Verb::Get, Verb::List, Verb::Logs] {
            let o = op(verb, ResourceKind::Secrets, "kube-system", OperationArgs::Empty);
            assert_eq!(classify(&o, &cfg), SafetyLevel::Safe);
        }
    }

    #[test]
    fn restart_deployment_is_warning() {
        let cfg = EngineConfig::default();
        let o = op(
            Verb::Restart,
            ResourceKind::Deployments,
            "default",
            OperationArgs::Empty,
        );
        assert_eq!(classify(&o, &cfg), SafetyLevel::Warning);
    }

    #[test]
    fn scale_to_zero_is_dangerous_regardless_of_namespace() {
        let cfg = EngineConfig::default();
        let o = op(
            Verb::Scale,
            ResourceKind::Deployments,
            "default",
            OperationArgs::Scale {
                replicas: 0,
                current_replicas: Some(5),
            },
        );
        assert_eq!(classify(&o, &cfg), SafetyLevel::Dangerous);
    }

    #[test]
    fn scale_nonzero_is_warning() {
        let cfg = EngineConfig::default();
        let o = op(
            Verb::Scale,
            ResourceKind::Deployments,
            "default",
            OperationArgs::Scale {
                replicas: 3,
                current_replicas: Some(5),
            },
        );
        assert_eq!(classify(&o, &cfg), SafetyLevel::Warning);
    }

    #[test]
    fn delete_pod_is_warning() {
        let cfg = EngineConfig::default();
        let o = op(
            Verb::Delete,
            ResourceKind::Pods,
            "default",
            OperationArgs::Delete {
                grace_period_seconds: None,
            },
        );
        assert_eq!(classify(&o, &cfg), SafetyLevel::Warning);
    }

    #[test]
    fn delete_deployment_is_dangerous() {
        let cfg = EngineConfig::default();
        let o = op(
            Verb::Delete,
            ResourceKind::Deployments,
            "default",
            OperationArgs::Delete {
                grace_period_seconds: None,
            },
        );
        assert_eq!(classify(&o, &cfg), SafetyLevel::Dangerous);
    }

    #[test]
    fn delete_pod_in_kube_system_escalates_to_dangerous() {
        let cfg = EngineConfig::default();
        let o = op(
            Verb::Delete,
            ResourceKind::Pods,
            "kube-system",
            OperationArgs::Delete {
                grace_period_seconds: None,
            },
        );
        assert_eq!(classify(&o, &cfg), SafetyLevel::Dangerous);
    }

    #[test]
    fn reads_in_protected_namespace_stay_safe() {
        let cfg = EngineConfig::default();
        let o = op(Verb::Get, ResourceKind::Pods, "kube-system", OperationArgs::Empty);
        assert_eq!(classify(&o, &cfg), SafetyLevel::Safe);
    }

    #[test]
    fn classification_is_deterministic() {
        let cfg = EngineConfig::default();
        let o = op(
            Verb::Scale,
            ResourceKind::Deployments,
            "prod",
            OperationArgs::Scale {
                replicas: 2,
                current_replicas: Some(4),
            },
        );
        assert_eq!(classify(&o, &cfg), classify(&o, &cfg));
    }

    #[test]
    fn custom_protected_namespace_escalates_warning_to_dangerous() {
        let mut cfg = EngineConfig::default();
        cfg.protected_namespaces.insert("finance".to_string());
        let o = op(
            Verb::Delete,
            ResourceKind::Pods,
            "finance",
            OperationArgs::Delete {
                grace_period_seconds: None,
            },
        );
        assert_eq!(classify(&o, &cfg), SafetyLevel::Dangerous);
    }
}
