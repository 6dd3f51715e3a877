mod alert_generator;
mod duplicate_guard;
mod reading_ingestion_service;
mod threshold_resolver;

pub use alert_generator::*;
pub use duplicate_guard::*;
pub use reading_ingestion_service::*;
pub use threshold_resolver::*;
