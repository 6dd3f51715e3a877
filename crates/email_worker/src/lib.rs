pub mod domain;
pub mod email_worker;
pub mod smtp;

pub use domain::*;
pub use email_worker::*;
pub use smtp::*;
