mod config;
mod lettre_transport;
mod unconfigured;

pub use config::*;
pub use lettre_transport::*;
pub use unconfigured::*;
