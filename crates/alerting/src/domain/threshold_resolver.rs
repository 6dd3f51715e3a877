use common::domain::{
    DomainResult, PolicySource, ResolvedPolicy, ThresholdPolicy, ThresholdPolicyRepository,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Picks the threshold policy that applies to a tenant.
///
/// Lookup order is user (when given) → company → global → built-in default.
/// A missing scope just falls through; only store failures are returned.
#[derive(Clone)]
pub struct ThresholdResolver {
    repository: Arc<dyn ThresholdPolicyRepository>,
    default_policy: ThresholdPolicy,
}

impl ThresholdResolver {
    pub fn new(
        repository: Arc<dyn ThresholdPolicyRepository>,
        default_policy: ThresholdPolicy,
    ) -> Self {
        Self {
            repository,
            default_policy,
        }
    }

    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        company_id: i64,
        user_id: Option<i64>,
    ) -> DomainResult<ResolvedPolicy> {
        let resolved = self.lookup(company_id, user_id).await?;
        debug!(
            source = %resolved.source,
            voltage_min = resolved.policy.voltage_min,
            voltage_max = resolved.policy.voltage_max,
            power_max = resolved.policy.power_max,
            "resolved threshold policy"
        );
        Ok(resolved)
    }

    async fn lookup(&self, company_id: i64, user_id: Option<i64>) -> DomainResult<ResolvedPolicy> {
        if let Some(user_id) = user_id {
            if let Some(policy) = self.repository.get_user_policy(company_id, user_id).await? {
                return Ok(ResolvedPolicy {
                    policy,
                    source: PolicySource::User,
                });
            }
        }

        if let Some(policy) = self.repository.get_company_policy(company_id).await? {
            return Ok(ResolvedPolicy {
                policy,
                source: PolicySource::Company,
            });
        }

        if let Some(policy) = self.repository.get_global_policy().await? {
            return Ok(ResolvedPolicy {
                policy,
                source: PolicySource::Global,
            });
        }

        Ok(ResolvedPolicy {
            policy: self.default_policy,
            source: PolicySource::Default,
        })
    }
}
