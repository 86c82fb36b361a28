//! Shared configuration, shutdown signalling and logging bootstrap used by
//! every other Ember crate.

pub mod config;
pub mod error;
pub mod logging;
pub mod shutdown;

pub use config::EmberConfig;
pub use error::ConfigError;
pub use shutdown::{Shutdown, ShutdownSignal};
