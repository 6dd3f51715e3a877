use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use garde::Validate;

/// Measurement payload as submitted by a device, before credential resolution.
///
/// Every field is optional on its own; power may be negative (export) and is
/// normalized to its magnitude when stored.
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct ReadingInput {
    #[garde(custom(finite), range(min = 0.0))]
    pub voltage: Option<f64>,
    #[garde(custom(finite), range(min = 0.0))]
    pub current: Option<f64>,
    #[garde(custom(finite))]
    pub power: Option<f64>,
    #[garde(custom(finite), range(min = 0.0))]
    pub apparent_power: Option<f64>,
    #[garde(custom(finite), range(min = -1.0, max = 1.0))]
    pub power_factor: Option<f64>,
}

/// NaN never crosses a threshold
fn finite(value: &Option<f64>, _: &()) -> garde::Result {
    match value {
        Some(v) if !v.is_finite() => Err(garde::Error::new("must be a finite number")),
        _ => Ok(()),
    }
}

/// A stored measurement sample. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub id: i64,
    pub company_id: i64,
    pub device_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub apparent_power: Option<f64>,
    pub power_factor: Option<f64>,
}

/// Input for storing a reading once the device has been resolved
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub company_id: i64,
    pub device_id: i64,
    pub recorded_at: DateTime<Utc>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power: Option<f64>,
    pub apparent_power: Option<f64>,
    pub power_factor: Option<f64>,
}

impl NewReading {
    pub fn from_input(
        company_id: i64,
        device_id: i64,
        recorded_at: DateTime<Utc>,
        input: ReadingInput,
    ) -> Self {
        Self {
            company_id,
            device_id,
            recorded_at,
            voltage: input.voltage,
            current: input.current,
            power: input.power.map(f64::abs),
            apparent_power: input.apparent_power,
            power_factor: input.power_factor,
        }
    }
}

/// Append-only reading storage
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ReadingRepository: Send + Sync {
    async fn insert_reading(&self, input: NewReading) -> DomainResult<Reading>;
}
