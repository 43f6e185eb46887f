//! # Console subscribers of running units.
//!
//! This module provides the [`ConsoleTransport`] trait collaborators implement,
//! and the per-unit [`SubscriberRegistry`] that fans console lines out to them.
//!
//! ## Architecture
//! ```text
//! stdout reader ──┐                         ┌──► worker 1 ──► transport 1
//!                 ├──► SubscriberRegistry ──┼──► worker 2 ──► transport 2
//! stderr reader ──┘       (record)          └──► worker N ──► transport N
//! ```
//!
//! ## Implementing a transport
//! ```no_run
//! use async_trait::async_trait;
//! use procvisor::{ConsoleTransport, TransportError};
//!
//! struct Socket;
//!
//! #[async_trait]
//! impl ConsoleTransport for Socket {
//!     async fn send_text(&self, line: &str) -> Result<(), TransportError> {
//!         // write a text frame...
//!         let _ = line;
//!         Ok(())
//!     }
//!     async fn close(&self) {
//!         // send a close frame...
//!     }
//! }
//! ```

mod registry;
mod transport;

pub use registry::{SubscriberId, SubscriberRegistry};
pub use transport::{ChannelTransport, ConsoleTransport, TransportRef};
