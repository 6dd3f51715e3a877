use crate::domain::{DomainError, DomainResult, ThresholdPolicy, ThresholdPolicyRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tokio_postgres::types::ToSql;
use tokio_postgres::Row;
use tracing::instrument;

/// PostgreSQL implementation of ThresholdPolicyRepository trait
#[derive(Clone)]
pub struct PostgresThresholdPolicyRepository {
    client: PostgresClient,
}

impl PostgresThresholdPolicyRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn fetch_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> DomainResult<Option<ThresholdPolicy>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(sql, params)
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.as_ref().map(policy_from_row))
    }
}

fn policy_from_row(row: &Row) -> ThresholdPolicy {
    ThresholdPolicy {
        voltage_min: row.get(0),
        voltage_max: row.get(1),
        power_max: row.get(2),
    }
}

#[async_trait]
impl ThresholdPolicyRepository for PostgresThresholdPolicyRepository {
    #[instrument(skip(self))]
    async fn get_user_policy(
        &self,
        company_id: i64,
        user_id: i64,
    ) -> DomainResult<Option<ThresholdPolicy>> {
        self.fetch_one(
            "SELECT voltage_min, voltage_max, power_max
             FROM threshold_policies
             WHERE company_id = $1 AND user_id = $2",
            &[&company_id, &user_id],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_company_policy(&self, company_id: i64) -> DomainResult<Option<ThresholdPolicy>> {
        self.fetch_one(
            "SELECT voltage_min, voltage_max, power_max
             FROM threshold_policies
             WHERE company_id = $1 AND user_id IS NULL",
            &[&company_id],
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_global_policy(&self) -> DomainResult<Option<ThresholdPolicy>> {
        self.fetch_one(
            "SELECT voltage_min, voltage_max, power_max
             FROM threshold_policies
             WHERE company_id IS NULL AND user_id IS NULL",
            &[],
        )
        .await
    }
}
