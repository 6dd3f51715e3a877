mod delivery_worker;
mod notification_service;
mod templates;
mod transport;

pub use delivery_worker::*;
pub use notification_service::*;
pub use templates::*;
pub use transport::*;
