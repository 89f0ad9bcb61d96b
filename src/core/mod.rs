//! Core runtime: configuration, session actors, registry, supervisor.

mod actor;
mod builder;
mod config;
mod registry;
mod supervisor;

pub mod shutdown;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use supervisor::Supervisor;
