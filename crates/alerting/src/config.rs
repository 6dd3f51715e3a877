use chrono::Duration;
use common::domain::ThresholdPolicy;

/// Policy used when neither the tenant nor the global scope defines one
pub const DEFAULT_THRESHOLD_POLICY: ThresholdPolicy = ThresholdPolicy::new(200.0, 250.0, 5000.0);

/// Alert generation tunables
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertingConfig {
    /// Repeats of the same (type, device, tenant) inside this window are suppressed
    pub dedup_window: Duration,
    pub default_policy: ThresholdPolicy,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            dedup_window: Duration::seconds(20),
            default_policy: DEFAULT_THRESHOLD_POLICY,
        }
    }
}
