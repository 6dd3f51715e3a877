use crate::domain::result::{DomainError, DomainResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Closed set of threshold violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertType {
    OverVoltage,
    UnderVoltage,
    OverPower,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::OverVoltage => "over_voltage",
            AlertType::UnderVoltage => "under_voltage",
            AlertType::OverPower => "over_power",
        }
    }

    /// Human readable label used in chat messages
    pub fn label(&self) -> &'static str {
        match self {
            AlertType::OverVoltage => "Over-voltage",
            AlertType::UnderVoltage => "Under-voltage",
            AlertType::OverPower => "Over-power",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "over_voltage" => Ok(AlertType::OverVoltage),
            "under_voltage" => Ok(AlertType::UnderVoltage),
            "over_power" => Ok(AlertType::OverPower),
            other => Err(DomainError::UnknownAlertType(other.to_string())),
        }
    }
}

/// A persisted threshold violation. Only `delivered` ever changes.
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub id: i64,
    pub company_id: i64,
    pub device_id: Option<i64>,
    pub alert_type: AlertType,
    pub message: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub delivered: bool,
}

/// Alert candidate produced by the generator
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub company_id: i64,
    pub device_id: Option<i64>,
    pub alert_type: AlertType,
    pub message: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// Input for the dedup existence check
#[derive(Debug, Clone, PartialEq)]
pub struct RecentAlertQuery {
    pub alert_type: AlertType,
    pub device_id: Option<i64>,
    pub company_id: i64,
    pub since: DateTime<Utc>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// True if an alert matching (type, device, company) was created after `since`
    async fn exists_since(&self, query: RecentAlertQuery) -> DomainResult<bool>;

    /// Persist alerts atomically, skipping any candidate for which an alert of
    /// the same (type, device, company) already exists after `dedup_since`.
    /// Returns the alerts actually written.
    async fn insert_alerts(
        &self,
        alerts: Vec<NewAlert>,
        dedup_since: DateTime<Utc>,
    ) -> DomainResult<Vec<Alert>>;

    /// Undelivered alerts, oldest first
    async fn list_undelivered(&self, limit: i64) -> DomainResult<Vec<Alert>>;

    /// Flip the delivery flag after a successful chat send
    async fn mark_delivered(&self, alert_id: i64) -> DomainResult<()>;
}
