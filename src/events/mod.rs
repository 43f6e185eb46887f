//! Supervisor events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Supervisor` (start/stop), the per-unit exit waiter,
//!   `SubscriberRegistry` (attach/detach/evict).
//! - **Consumers**: whatever the collaborator wires to
//!   [`Supervisor::subscribe_events`](crate::Supervisor::subscribe_events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
