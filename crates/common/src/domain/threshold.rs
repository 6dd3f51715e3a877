use crate::domain::result::DomainResult;
use async_trait::async_trait;
use std::fmt;

/// Voltage and power limits applied to a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub voltage_min: f64,
    pub voltage_max: f64,
    pub power_max: f64,
}

impl ThresholdPolicy {
    pub const fn new(voltage_min: f64, voltage_max: f64, power_max: f64) -> Self {
        Self {
            voltage_min,
            voltage_max,
            power_max,
        }
    }
}

/// Where a resolved policy came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicySource {
    User,
    Company,
    Global,
    Default,
}

impl fmt::Display for PolicySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicySource::User => "user",
            PolicySource::Company => "company",
            PolicySource::Global => "global",
            PolicySource::Default => "default",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedPolicy {
    pub policy: ThresholdPolicy,
    pub source: PolicySource,
}

/// Threshold policy lookups.
///
/// Invariant held by the schema: at most one global row, at most one row per
/// company (user_id NULL) and at most one row per (company, user).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ThresholdPolicyRepository: Send + Sync {
    /// Policy scoped to a single user inside a company
    async fn get_user_policy(
        &self,
        company_id: i64,
        user_id: i64,
    ) -> DomainResult<Option<ThresholdPolicy>>;

    /// Company-wide policy
    async fn get_company_policy(&self, company_id: i64) -> DomainResult<Option<ThresholdPolicy>>;

    /// Global policy (no company, no user)
    async fn get_global_policy(&self) -> DomainResult<Option<ThresholdPolicy>>;
}
