pub mod domain;
pub mod garde;
pub mod postgres;
pub mod telemetry;

// Re-export mocks when testing feature is enabled
#[cfg(any(test, feature = "testing"))]
pub use domain::MockAlertRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockDeviceRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockEmailOutboxRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockReadingRepository;
#[cfg(any(test, feature = "testing"))]
pub use domain::MockThresholdPolicyRepository;
