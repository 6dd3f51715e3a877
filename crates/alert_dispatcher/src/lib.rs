pub mod alert_dispatcher;
pub mod domain;
pub mod telegram;

pub use alert_dispatcher::*;
pub use domain::*;
pub use telegram::*;
