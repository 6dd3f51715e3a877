use chrono::{DateTime, Duration, Utc};
use common::domain::{AlertRepository, AlertType, DomainResult, RecentAlertQuery};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Suppresses a repeat of the same (type, device, tenant) alert inside the
/// dedup window. The check always goes to the alert store so every generator
/// instance sees the same answer.
#[derive(Clone)]
pub struct DuplicateAlertGuard {
    alert_repository: Arc<dyn AlertRepository>,
    window: Duration,
}

impl DuplicateAlertGuard {
    pub fn new(alert_repository: Arc<dyn AlertRepository>, window: Duration) -> Self {
        Self {
            alert_repository,
            window,
        }
    }

    /// Start of the window that ends at `now`
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    #[instrument(skip(self))]
    pub async fn should_raise(
        &self,
        alert_type: AlertType,
        device_id: Option<i64>,
        company_id: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let recent = self
            .alert_repository
            .exists_since(RecentAlertQuery {
                alert_type,
                device_id,
                company_id,
                since: self.window_start(now),
            })
            .await?;

        if recent {
            debug!(%alert_type, "recent alert found, suppressing");
        }

        Ok(!recent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{DomainError, MockAlertRepository};

    #[tokio::test]
    async fn test_query_covers_the_last_window() {
        let now = Utc::now();
        let mut repo = MockAlertRepository::new();
        repo.expect_exists_since()
            .withf(move |q| {
                q.alert_type == AlertType::OverPower
                    && q.device_id == Some(3)
                    && q.company_id == 9
                    && q.since == now - Duration::seconds(20)
            })
            .return_once(|_| Ok(false));

        let guard = DuplicateAlertGuard::new(Arc::new(repo), Duration::seconds(20));

        assert!(guard
            .should_raise(AlertType::OverPower, Some(3), 9, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_recent_alert_blocks() {
        let mut repo = MockAlertRepository::new();
        repo.expect_exists_since().return_once(|_| Ok(true));

        let guard = DuplicateAlertGuard::new(Arc::new(repo), Duration::seconds(20));

        assert!(!guard
            .should_raise(AlertType::OverVoltage, Some(3), 9, Utc::now())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_store_error_propagates() {
        let mut repo = MockAlertRepository::new();
        repo.expect_exists_since()
            .return_once(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("timeout"))));

        let guard = DuplicateAlertGuard::new(Arc::new(repo), Duration::seconds(20));

        assert!(guard
            .should_raise(AlertType::OverVoltage, None, 9, Utc::now())
            .await
            .is_err());
    }
}
