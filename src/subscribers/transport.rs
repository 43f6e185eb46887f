//! # Console transport trait
//!
//! `ConsoleTransport` is the extension point collaborators implement to receive
//! a unit's console (a websocket, an SSE stream, a test recorder, ...). Each
//! attached transport is driven by a dedicated worker fed by a bounded queue
//! owned by the [`SubscriberRegistry`](crate::subscribers::SubscriberRegistry).
//!
//! ## Contract
//! - `send_text` may be slow; it never blocks the stream readers or other
//!   subscribers. A send that fails, panics, or exceeds the configured send
//!   timeout evicts the transport.
//! - `close` is called at most once by the registry: on eviction and at process
//!   exit. A plain detach does **not** close; the owner keeps the transport.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use procvisor::{ConsoleTransport, TransportError};
//!
//! struct Stdout;
//!
//! #[async_trait]
//! impl ConsoleTransport for Stdout {
//!     async fn send_text(&self, line: &str) -> Result<(), TransportError> {
//!         println!("{line}");
//!         Ok(())
//!     }
//!     async fn close(&self) {}
//!     fn name(&self) -> &str { "stdout" }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Contract for console subscribers.
#[async_trait]
pub trait ConsoleTransport: Send + Sync + 'static {
    /// Delivers one console line.
    async fn send_text(&self, line: &str) -> Result<(), TransportError>;

    /// Closes the underlying connection.
    async fn close(&self);

    /// Human-readable name (for logs).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Shared handle to a transport.
pub type TransportRef = Arc<dyn ConsoleTransport>;

/// Identity comparison for transports (data pointer only).
pub(crate) fn same_transport(a: &TransportRef, b: &TransportRef) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Transport backed by a bounded channel.
///
/// Useful when the real connection is driven by another task (e.g. a websocket
/// writer loop): that task reads lines from the receiver and sees `None` once
/// the transport is closed.
pub struct ChannelTransport {
    tx: Mutex<Option<mpsc::Sender<String>>>,
}

impl ChannelTransport {
    /// Creates the transport and the receiving half.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Arc::new(Self { tx: Mutex::new(Some(tx)) }), rx)
    }

    /// True once [`ConsoleTransport::close`] ran.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }
}

#[async_trait]
impl ConsoleTransport for ChannelTransport {
    async fn send_text(&self, line: &str) -> Result<(), TransportError> {
        let tx = self.tx.lock().clone().ok_or(TransportError::Closed)?;
        tx.send(line.to_owned())
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close(&self) {
        self.tx.lock().take();
    }

    fn name(&self) -> &str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_transport_forwards_until_closed() {
        let (transport, mut rx) = ChannelTransport::new(4);
        transport.send_text("hello").await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("hello"));

        transport.close().await;
        assert!(transport.is_closed());
        assert!(rx.recv().await.is_none());
        assert!(matches!(
            transport.send_text("late").await,
            Err(TransportError::Closed)
        ));
    }

    #[tokio::test]
    async fn channel_transport_fails_when_receiver_dropped() {
        let (transport, rx) = ChannelTransport::new(1);
        drop(rx);
        assert!(transport.send_text("nobody").await.is_err());
    }

    #[test]
    fn identity_ignores_vtable() {
        let (a, _rx_a) = ChannelTransport::new(1);
        let (b, _rx_b) = ChannelTransport::new(1);
        let a: TransportRef = a;
        let b: TransportRef = b;
        assert!(same_transport(&a, &a.clone()));
        assert!(!same_transport(&a, &b));
    }
}
