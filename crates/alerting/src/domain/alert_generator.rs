use crate::config::AlertingConfig;
use crate::domain::{DuplicateAlertGuard, ThresholdResolver};
use chrono::{DateTime, Utc};
use common::domain::{
    Alert, AlertRepository, AlertType, DomainResult, NewAlert, Reading, ThresholdPolicy,
    ThresholdPolicyRepository,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Turns one stored reading into zero or more persisted alerts.
///
/// Flow:
/// 1. Resolve the tenant's threshold policy
/// 2. Build candidates: at most one voltage alert, at most one power alert
/// 3. Drop candidates the duplicate guard rejects
/// 4. Persist the survivors in a single write
///
/// Any lookup failure abandons the whole evaluation before anything is written.
pub struct AlertGenerator {
    resolver: ThresholdResolver,
    guard: DuplicateAlertGuard,
    alert_repository: Arc<dyn AlertRepository>,
}

impl AlertGenerator {
    pub fn new(
        resolver: ThresholdResolver,
        guard: DuplicateAlertGuard,
        alert_repository: Arc<dyn AlertRepository>,
    ) -> Self {
        Self {
            resolver,
            guard,
            alert_repository,
        }
    }

    /// Wire resolver and guard from repositories and config
    pub fn from_repositories(
        threshold_repository: Arc<dyn ThresholdPolicyRepository>,
        alert_repository: Arc<dyn AlertRepository>,
        config: AlertingConfig,
    ) -> Self {
        Self::new(
            ThresholdResolver::new(threshold_repository, config.default_policy),
            DuplicateAlertGuard::new(alert_repository.clone(), config.dedup_window),
            alert_repository,
        )
    }

    #[instrument(skip(self, reading), fields(reading_id = reading.id, company_id = reading.company_id, device_id = reading.device_id))]
    pub async fn evaluate(&self, reading: &Reading) -> DomainResult<Vec<Alert>> {
        let now = Utc::now();
        let resolved = self.resolver.resolve(reading.company_id, None).await?;

        let candidates = alert_candidates(reading, &resolved.policy, now);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let mut passing = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self
                .guard
                .should_raise(
                    candidate.alert_type,
                    candidate.device_id,
                    candidate.company_id,
                    now,
                )
                .await?
            {
                passing.push(candidate);
            }
        }

        if passing.is_empty() {
            debug!("all candidates suppressed by dedup window");
            return Ok(Vec::new());
        }

        let alerts = self
            .alert_repository
            .insert_alerts(passing, self.guard.window_start(now))
            .await?;

        for alert in &alerts {
            info!(
                alert_id = alert.id,
                alert_type = %alert.alert_type,
                value = %alert.value,
                policy_source = %resolved.source,
                "alert raised"
            );
        }

        Ok(alerts)
    }
}

/// Threshold comparison for a single reading. Over- and under-voltage are
/// mutually exclusive; over-power is independent of both.
pub fn alert_candidates(
    reading: &Reading,
    policy: &ThresholdPolicy,
    now: DateTime<Utc>,
) -> Vec<NewAlert> {
    let mut candidates = Vec::new();
    let candidate = |alert_type, message, value| NewAlert {
        company_id: reading.company_id,
        device_id: Some(reading.device_id),
        alert_type,
        message,
        value,
        created_at: now,
    };

    if let Some(voltage) = reading.voltage {
        if voltage > policy.voltage_max {
            candidates.push(candidate(
                AlertType::OverVoltage,
                format!(
                    "Voltage exceeds maximum threshold ({}V). Current value: {:.2}V",
                    policy.voltage_max, voltage
                ),
                format!("{:.2}V", voltage),
            ));
        } else if voltage < policy.voltage_min {
            candidates.push(candidate(
                AlertType::UnderVoltage,
                format!(
                    "Voltage is below minimum threshold ({}V). Current value: {:.2}V",
                    policy.voltage_min, voltage
                ),
                format!("{:.2}V", voltage),
            ));
        }
    }

    if let Some(power) = reading.power {
        if power > policy.power_max {
            candidates.push(candidate(
                AlertType::OverPower,
                format!(
                    "Power exceeds maximum threshold ({}W). Current value: {:.2}W",
                    policy.power_max, power
                ),
                format!("{:.2}W", power),
            ));
        }
    }

    candidates
}
