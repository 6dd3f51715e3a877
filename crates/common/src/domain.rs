mod alert;
mod device;
mod outbox;
mod reading;
mod result;
mod threshold;

pub use alert::*;
pub use device::*;
pub use outbox::*;
pub use reading::*;
pub use result::*;
pub use threshold::*;
