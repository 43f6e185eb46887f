//! # Running processes.
//!
//! - [`launch`](launch::launch) turns a unit's command line into a child process with piped streams
//! - [`spawn_reader`](reader::spawn_reader) follows stdout/stderr into the log ring and subscribers
//! - [`ProcessHandle`] is what the supervisor keeps for each running unit: stdin,
//!   console history, subscribers, lifecycle state and the kill trigger

mod handle;
mod launch;
mod reader;

pub use handle::{ProcessHandle, ProcessState};
pub use reader::OutputStream;

pub(crate) use launch::{launch, Launched};
pub(crate) use reader::spawn_reader;
