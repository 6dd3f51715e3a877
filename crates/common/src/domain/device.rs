use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A field device registered to a company.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: i64,
    pub company_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Read-only view of the device directory.
///
/// Device CRUD lives outside this system; the pipeline only needs to turn a
/// credential into a (company, device) pair and to look up display names.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Find an active device by its API key
    async fn find_active_by_api_key(&self, api_key: &str) -> DomainResult<Option<Device>>;

    /// Get a device by ID regardless of its active flag
    async fn get_device(&self, device_id: i64) -> DomainResult<Option<Device>>;
}
