use crate::domain::{DomainError, DomainResult, NewReading, Reading, ReadingRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// PostgreSQL implementation of ReadingRepository trait
#[derive(Clone)]
pub struct PostgresReadingRepository {
    client: PostgresClient,
}

impl PostgresReadingRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReadingRepository for PostgresReadingRepository {
    #[instrument(skip(self, input), fields(company_id = input.company_id, device_id = input.device_id))]
    async fn insert_reading(&self, input: NewReading) -> DomainResult<Reading> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "INSERT INTO readings (company_id, device_id, recorded_at, voltage_v, current_a, power_w, apparent_power_va, power_factor)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING id",
                &[
                    &input.company_id,
                    &input.device_id,
                    &input.recorded_at,
                    &input.voltage,
                    &input.current,
                    &input.power,
                    &input.apparent_power,
                    &input.power_factor,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let id: i64 = row.get(0);
        debug!(reading_id = id, "stored reading");

        Ok(Reading {
            id,
            company_id: input.company_id,
            device_id: input.device_id,
            recorded_at: input.recorded_at,
            voltage: input.voltage,
            current: input.current,
            power: input.power,
            apparent_power: input.apparent_power,
            power_factor: input.power_factor,
        })
    }
}
