use crate::domain::{Device, DeviceRepository, DomainError, DomainResult};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, instrument};

/// Device row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct DeviceRow {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Row> for DeviceRow {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get(0),
            company_id: row.get(1),
            name: row.get(2),
            code: row.get(3),
            is_active: row.get(4),
            created_at: row.get(5),
        }
    }
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: row.id,
            company_id: row.company_id,
            name: row.name,
            code: row.code,
            is_active: row.is_active,
            created_at: Some(row.created_at),
        }
    }
}

/// PostgreSQL implementation of DeviceRepository trait
#[derive(Clone)]
pub struct PostgresDeviceRepository {
    client: PostgresClient,
}

impl PostgresDeviceRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceRepository for PostgresDeviceRepository {
    #[instrument(skip(self, api_key))]
    async fn find_active_by_api_key(&self, api_key: &str) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, company_id, name, code, is_active, created_at
                 FROM devices
                 WHERE api_key = $1 AND is_active = true",
                &[&api_key],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let device = row.map(|r| Device::from(DeviceRow::from(&r)));
        if let Some(device) = &device {
            debug!(device_id = device.id, company_id = device.company_id, "resolved device credential");
        }
        Ok(device)
    }

    #[instrument(skip(self), fields(device_id = device_id))]
    async fn get_device(&self, device_id: i64) -> DomainResult<Option<Device>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, company_id, name, code, is_active, created_at
                 FROM devices
                 WHERE id = $1",
                &[&device_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|r| Device::from(DeviceRow::from(&r))))
    }
}
