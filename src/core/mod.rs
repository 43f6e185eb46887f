//! Runtime core: process orchestration and lifecycle.
//!
//! The public API from this module is [`Supervisor`] with its [`SupervisorConfig`]
//! and the [`ProcessStats`] it reports.
//!
//! Internal modules:
//! - [`registry`]: running-unit table, start and stop flows;
//! - [`waiter`]: per-process exit observation and cleanup;
//! - [`stats`]: memory lookup for running processes;
//! - [`shutdown`]: cross-platform termination signal handling;
//! - [`supervisor`]: the facade collaborators call.

mod config;
mod registry;
mod shutdown;
mod stats;
mod supervisor;
mod waiter;

pub use config::SupervisorConfig;
pub use shutdown::shutdown_signal;
pub use stats::ProcessStats;
pub use supervisor::Supervisor;
