pub mod context;
pub mod dispatcher;

pub use context::{ConnectionContext, ConnectionState};
pub use dispatcher::Dispatcher;
