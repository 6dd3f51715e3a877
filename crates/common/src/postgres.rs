mod alert_repository;
mod client;
mod config;
mod device_repository;
mod email_outbox_repository;
mod migrations;
mod reading_repository;
mod threshold_repository;

pub use alert_repository::*;
pub use client::*;
pub use config::*;
pub use device_repository::*;
pub use email_outbox_repository::*;
pub use migrations::*;
pub use reading_repository::*;
pub use threshold_repository::*;
