use std::collections::HashSet;
use std::time::Duration;

/// Process-wide configuration for the command lifecycle engine.
///
/// Loaded from the environment with typed defaults, in the same spirit as
/// the rest of this crate reaches for `kube::Config`/`Client::try_default`
/// rather than a config framework: a handful of `KUBECHAT_*` variables,
/// parsed once at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Namespaces that escalate safety by one step (spec.md §4.1 step 6).
    pub protected_namespaces: HashSet<String>,

    /// Default TTL for a newly opened approval ticket.
    pub approval_ttl: Duration,

    /// Cadence at which the approval registry sweeps for expiry.
    pub approval_sweep_interval: Duration,

    /// Whether an approver may decide a ticket they themselves opened.
    pub allow_self_approval: bool,

    /// Upper bound on a single `ExecutorPort::apply` call.
    pub default_execution_timeout: Duration,

    /// Upper bound on a single rollback step's execution.
    pub rollback_step_timeout: Duration,

    /// How long a generated rollback plan remains executable.
    pub default_plan_ttl: Duration,

    /// Heuristic duration attributed to each mutating rollback step.
    pub rollback_step_duration_estimate: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            protected_namespaces: ["kube-system", "kube-public"]
                .into_iter()
                .map(String::from)
                .collect(),
            approval_ttl: Duration::from_secs(3600),
            approval_sweep_interval: Duration::from_secs(10),
            allow_self_approval: false,
            default_execution_timeout: Duration::from_secs(30),
            rollback_step_timeout: Duration::from_secs(30),
            default_plan_ttl: Duration::from_secs(24 * 3600),
            rollback_step_duration_estimate: Duration::from_secs(15),
        }
    }
}

impl EngineConfig {
    /// Build configuration from the environment, falling back to defaults
    /// for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let protected_namespaces = std::env::var("KUBECHAT_PROTECTED_NAMESPACES")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<HashSet<_>>()
            })
            .filter(|set| !set.is_empty())
            .unwrap_or(defaults.protected_namespaces);

        Self {
            protected_namespaces,
            approval_ttl: env_duration_secs("KUBECHAT_APPROVAL_TTL_SECS", defaults.approval_ttl),
            approval_sweep_interval: env_duration_secs(
                "KUBECHAT_APPROVAL_SWEEP_INTERVAL_SECS",
                defaults.approval_sweep_interval,
            ),
            allow_self_approval: std::env::var("KUBECHAT_ALLOW_SELF_APPROVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.allow_self_approval),
            default_execution_timeout: env_duration_secs(
                "KUBECHAT_EXECUTION_TIMEOUT_SECS",
                defaults.default_execution_timeout,
            ),
            rollback_step_timeout: env_duration_secs(
                "KUBECHAT_ROLLBACK_STEP_TIMEOUT_SECS",
                defaults.rollback_step_timeout,
            ),
            default_plan_ttl: env_duration_secs(
                "KUBECHAT_ROLLBACK_PLAN_TTL_SECS",
                defaults.default_plan_ttl,
            ),
            rollback_step_duration_estimate: env_duration_secs(
                "KUBECHAT_ROLLBACK_STEP_DURATION_ESTIMATE_SECS",
                defaults.rollback_step_duration_estimate,
            ),
        }
    }
}

fn env_duration_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
