use crate::domain::AlertGenerator;
use chrono::Utc;
use common::domain::{
    DeviceRepository, DomainError, DomainResult, NewReading, Reading, ReadingInput,
    ReadingRepository,
};
use common::garde::validate_struct;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Accepts a reading from a device credential, stores it and runs alert
/// generation. Alert generation never fails the ingestion.
pub struct ReadingIngestionService {
    device_repository: Arc<dyn DeviceRepository>,
    reading_repository: Arc<dyn ReadingRepository>,
    alert_generator: Arc<AlertGenerator>,
}

impl ReadingIngestionService {
    pub fn new(
        device_repository: Arc<dyn DeviceRepository>,
        reading_repository: Arc<dyn ReadingRepository>,
        alert_generator: Arc<AlertGenerator>,
    ) -> Self {
        Self {
            device_repository,
            reading_repository,
            alert_generator,
        }
    }

    #[instrument(skip(self, api_key, input))]
    pub async fn ingest(&self, api_key: &str, input: ReadingInput) -> DomainResult<Reading> {
        validate_struct(&input)?;

        let device = match self.device_repository.find_active_by_api_key(api_key).await? {
            Some(device) => device,
            None => {
                warn!("rejecting reading with unknown or inactive device credential");
                return Err(DomainError::InvalidDeviceCredential);
            }
        };

        let reading = self
            .reading_repository
            .insert_reading(NewReading::from_input(
                device.company_id,
                device.id,
                Utc::now(),
                input,
            ))
            .await?;

        match self.alert_generator.evaluate(&reading).await {
            Ok(alerts) => debug!(
                reading_id = reading.id,
                alerts = alerts.len(),
                "reading evaluated"
            ),
            Err(e) => error!(
                reading_id = reading.id,
                device_id = reading.device_id,
                error = %e,
                "alert evaluation abandoned"
            ),
        }

        Ok(reading)
    }
}
