//! Console output plumbing: line sanitizing and bounded history.
//!
//! - [`strip_ansi`] removes color sequences before a line is stored or sent;
//! - [`LogRing`] keeps the most recent lines of a running unit.

mod ring;
mod sanitize;

pub use ring::{LogRing, DEFAULT_LOG_CAPACITY};
pub use sanitize::strip_ansi;
