mod channel;
mod dispatcher;
mod formatter;

pub use channel::*;
pub use dispatcher::*;
pub use formatter::*;
