use crate::domain::{
    Alert, AlertRepository, AlertType, DomainError, DomainResult, NewAlert, RecentAlertQuery,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use tracing::{debug, instrument};

const ALERT_COLUMNS: &str =
    "id, company_id, device_id, alert_type, message, value, created_at, telegram_sent";

/// Alert row as stored in PostgreSQL
#[derive(Debug, Clone)]
pub struct AlertRow {
    pub id: i64,
    pub company_id: i64,
    pub device_id: Option<i64>,
    pub alert_type: String,
    pub message: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub telegram_sent: bool,
}

impl From<&Row> for AlertRow {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get(0),
            company_id: row.get(1),
            device_id: row.get(2),
            alert_type: row.get(3),
            message: row.get(4),
            value: row.get(5),
            created_at: row.get(6),
            telegram_sent: row.get(7),
        }
    }
}

impl TryFrom<AlertRow> for Alert {
    type Error = DomainError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Alert {
            id: row.id,
            company_id: row.company_id,
            device_id: row.device_id,
            alert_type: row.alert_type.parse::<AlertType>()?,
            message: row.message,
            value: row.value,
            created_at: row.created_at,
            delivered: row.telegram_sent,
        })
    }
}

/// Advisory lock key serializing dedup decisions for one (type, device, company)
fn dedup_lock_key(alert: &NewAlert) -> String {
    match alert.device_id {
        Some(device_id) => format!("alert:{}:{}:{}", alert.company_id, device_id, alert.alert_type),
        None => format!("alert:{}:-:{}", alert.company_id, alert.alert_type),
    }
}

/// PostgreSQL implementation of AlertRepository trait
#[derive(Clone)]
pub struct PostgresAlertRepository {
    client: PostgresClient,
}

impl PostgresAlertRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertRepository for PostgresAlertRepository {
    #[instrument(skip(self), fields(alert_type = %query.alert_type, company_id = query.company_id))]
    async fn exists_since(&self, query: RecentAlertQuery) -> DomainResult<bool> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_one(
                "SELECT EXISTS (
                    SELECT 1 FROM alerts
                    WHERE alert_type = $1
                      AND device_id IS NOT DISTINCT FROM $2
                      AND company_id = $3
                      AND created_at > $4
                 )",
                &[
                    &query.alert_type.as_str(),
                    &query.device_id,
                    &query.company_id,
                    &query.since,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.get(0))
    }

    #[instrument(skip(self, alerts), fields(candidates = alerts.len()))]
    async fn insert_alerts(
        &self,
        alerts: Vec<NewAlert>,
        dedup_since: DateTime<Utc>,
    ) -> DomainResult<Vec<Alert>> {
        if alerts.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let mut written = Vec::with_capacity(alerts.len());
        for alert in alerts {
            // Held until commit, so a concurrent writer re-checks after we insert
            tx.execute(
                "SELECT pg_advisory_xact_lock(hashtext($1::text))",
                &[&dedup_lock_key(&alert)],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

            let row = tx
                .query_opt(
                    "INSERT INTO alerts (company_id, device_id, alert_type, message, value, created_at)
                     SELECT $1::bigint, $2::bigint, $3::text, $4::text, $5::text, $6::timestamptz
                     WHERE NOT EXISTS (
                        SELECT 1 FROM alerts
                        WHERE alert_type = $3::text
                          AND device_id IS NOT DISTINCT FROM $2::bigint
                          AND company_id = $1::bigint
                          AND created_at > $7::timestamptz
                     )
                     RETURNING id",
                    &[
                        &alert.company_id,
                        &alert.device_id,
                        &alert.alert_type.as_str(),
                        &alert.message,
                        &alert.value,
                        &alert.created_at,
                        &dedup_since,
                    ],
                )
                .await
                .map_err(|e| DomainError::RepositoryError(e.into()))?;

            match row {
                Some(row) => {
                    let id: i64 = row.get(0);
                    debug!(alert_id = id, alert_type = %alert.alert_type, "alert inserted");
                    written.push(Alert {
                        id,
                        company_id: alert.company_id,
                        device_id: alert.device_id,
                        alert_type: alert.alert_type,
                        message: alert.message,
                        value: alert.value,
                        created_at: alert.created_at,
                        delivered: false,
                    });
                }
                None => {
                    debug!(alert_type = %alert.alert_type, "alert suppressed by concurrent duplicate");
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(written)
    }

    #[instrument(skip(self))]
    async fn list_undelivered(&self, limit: i64) -> DomainResult<Vec<Alert>> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows = conn
            .query(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts
                     WHERE telegram_sent = false
                     ORDER BY created_at ASC, id ASC
                     LIMIT $1"
                ),
                &[&limit],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        rows.iter()
            .map(|row| Alert::try_from(AlertRow::from(row)))
            .collect()
    }

    #[instrument(skip(self), fields(alert_id = alert_id))]
    async fn mark_delivered(&self, alert_id: i64) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let rows_affected = conn
            .execute(
                "UPDATE alerts SET telegram_sent = true WHERE id = $1",
                &[&alert_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        if rows_affected == 0 {
            return Err(DomainError::AlertNotFound(alert_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(device_id: Option<i64>) -> NewAlert {
        NewAlert {
            company_id: 3,
            device_id,
            alert_type: AlertType::OverVoltage,
            message: "m".to_string(),
            value: "254.32V".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_dedup_lock_key_distinguishes_missing_device() {
        assert_eq!(dedup_lock_key(&candidate(Some(9))), "alert:3:9:over_voltage");
        assert_eq!(dedup_lock_key(&candidate(None)), "alert:3:-:over_voltage");
    }

    #[test]
    fn test_row_with_unknown_type_is_rejected() {
        let row = AlertRow {
            id: 1,
            company_id: 3,
            device_id: None,
            alert_type: "bogus".to_string(),
            message: String::new(),
            value: String::new(),
            created_at: Utc::now(),
            telegram_sent: false,
        };

        assert!(matches!(
            Alert::try_from(row),
            Err(DomainError::UnknownAlertType(_))
        ));
    }
}
