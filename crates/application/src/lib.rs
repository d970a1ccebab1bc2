//! Application-level wiring: configuration, assembly scheduling and the
//! embedding-facing subsystem facade.

mod config;
mod prepare;
mod subsystem;

pub use config::{ConfigError, RuntimeConfig};
pub use prepare::ModelPreparer;
pub use subsystem::{core_count, logical_core_count, LlmSubsystem};
