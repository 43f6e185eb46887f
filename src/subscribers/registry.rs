//! # Console fan-out to attached subscribers.
//!
//! [`SubscriberRegistry`] distributes each console line of one unit to every
//! attached [`ConsoleTransport`] without waiting on any of them.
//!
//! ## Architecture
//! ```text
//! record(logs, line)
//!     │   (try_send, registry lock held only for the loop)
//!     ├──► [queue S1] ──► worker S1 ──► backlog… then live lines ──► S1.send_text()
//!     ├──► [queue S2] ──► worker S2 ──► …                       ──► S2.send_text()
//!     └──► [queue SN] ──► worker SN ──► …                       ──► SN.send_text()
//!
//! close_all(msg) ──► every queue: Close(msg) ──► worker sends msg ──► transport.close()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `record()` never awaits transport I/O.
//! - **Per-subscriber FIFO**: backlog first, then live lines in broadcast order.
//! - **Exactly once**: a recorded line is in a new subscriber's backlog or delivered live, never both.
//! - **Eviction**: queue overflow, send error, send timeout or panic removes
//!   that subscriber only; its transport is closed.
//! - **Detach**: once `detach` returns, no delivery is attempted to that transport.
//! - **Close**: `close_all` runs once, at process exit; later attaches are refused.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::transport::{same_transport, TransportRef};
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::output::LogRing;
use crate::unit::UnitId;

static SUBSCRIBER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Identifier of an attached subscriber (unique per process lifetime).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn next() -> Self {
        Self(SUBSCRIBER_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

enum Feed {
    Line(Arc<str>),
    Close(Arc<str>),
}

struct Slot {
    transport: TransportRef,
    sender: mpsc::Sender<Feed>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

#[derive(Default)]
struct Slots {
    entries: HashMap<SubscriberId, Slot>,
    closed: bool,
}

/// Live set of console subscribers of one unit.
pub struct SubscriberRegistry {
    unit: UnitId,
    slots: Arc<Mutex<Slots>>,
    queue_capacity: usize,
    send_timeout: Duration,
    bus: Bus,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    ///
    /// `queue_capacity` is clamped to at least 1.
    pub fn new(unit: UnitId, queue_capacity: usize, send_timeout: Duration, bus: Bus) -> Self {
        Self {
            unit,
            slots: Arc::new(Mutex::new(Slots::default())),
            queue_capacity: queue_capacity.max(1),
            send_timeout,
            bus,
        }
    }

    /// Attaches a transport and spawns its worker.
    ///
    /// `backlog` is evaluated under the registry lock, so no broadcast can slip
    /// between the snapshot and the registration; its lines are delivered before
    /// any live line.
    ///
    /// Fails with `NotRunning` once [`close_all`](Self::close_all) ran.
    ///
    /// # Panics
    /// Must be called within a Tokio runtime; the worker is spawned here.
    pub fn attach<F>(&self, transport: TransportRef, backlog: F) -> Result<SubscriberId, SupervisorError>
    where
        F: FnOnce() -> Vec<String>,
    {
        let id = SubscriberId::next();
        {
            let mut slots = self.slots.lock();
            if slots.closed {
                return Err(SupervisorError::NotRunning { unit: self.unit });
            }

            let (sender, rx) = mpsc::channel(self.queue_capacity);
            let cancel = CancellationToken::new();
            let worker = Worker {
                id,
                unit: self.unit,
                transport: Arc::clone(&transport),
                cancel: cancel.clone(),
                slots: Arc::clone(&self.slots),
                send_timeout: self.send_timeout,
                bus: self.bus.clone(),
            };
            let handle = tokio::spawn(worker.run(backlog(), rx));

            slots.entries.insert(
                id,
                Slot {
                    transport,
                    sender,
                    cancel,
                    worker: handle,
                },
            );
            debug!(unit = %self.unit, subscriber = %id, total = slots.entries.len(), "console subscriber attached");
        }

        self.bus.publish(
            Event::new(EventKind::SubscriberAttached)
                .with_unit(self.unit)
                .with_subscriber(id),
        );
        Ok(id)
    }

    /// Detaches a subscriber. Idempotent: returns `false` if it was not attached.
    ///
    /// Waits for an in-flight send (bounded by the send timeout), so no delivery
    /// is attempted once this returns. The transport is not closed.
    pub async fn detach(&self, id: SubscriberId) -> bool {
        let slot = self.slots.lock().entries.remove(&id);
        let Some(slot) = slot else {
            return false;
        };

        slot.cancel.cancel();
        drop(slot.sender);
        let _ = slot.worker.await;

        debug!(unit = %self.unit, subscriber = %id, "console subscriber detached");
        self.bus.publish(
            Event::new(EventKind::SubscriberDetached)
                .with_unit(self.unit)
                .with_subscriber(id),
        );
        true
    }

    /// Detaches by transport identity. Idempotent.
    pub async fn detach_transport(&self, transport: &TransportRef) -> bool {
        let found = self
            .slots
            .lock()
            .entries
            .iter()
            .find(|(_, slot)| same_transport(&slot.transport, transport))
            .map(|(id, _)| *id);

        match found {
            Some(id) => self.detach(id).await,
            None => false,
        }
    }

    /// Appends `line` to `logs` and queues it for every attached subscriber.
    ///
    /// Both happen under the registry lock, the same lock [`attach`](Self::attach)
    /// takes its backlog under, so a new subscriber gets each line exactly once:
    /// either in its backlog or live. Subscribers whose queue is full or whose
    /// worker is gone are evicted; nothing is reported to the caller.
    pub fn record(&self, logs: &LogRing, line: &str) {
        let line: Arc<str> = Arc::from(line);
        let mut evicted = Vec::new();
        {
            let mut slots = self.slots.lock();
            logs.append(&*line);
            if slots.closed {
                return;
            }

            let mut failed = Vec::new();
            for (id, slot) in &slots.entries {
                match slot.sender.try_send(Feed::Line(Arc::clone(&line))) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => failed.push((*id, "queue_full")),
                    Err(mpsc::error::TrySendError::Closed(_)) => failed.push((*id, "worker_closed")),
                }
            }
            for (id, reason) in failed {
                if let Some(slot) = slots.entries.remove(&id) {
                    evicted.push((id, reason, slot));
                }
            }
        }

        for (id, reason, slot) in evicted {
            slot.cancel.cancel();
            debug!(unit = %self.unit, subscriber = %id, reason, "console subscriber evicted");
            self.bus.publish(
                Event::new(EventKind::SubscriberEvicted)
                    .with_unit(self.unit)
                    .with_subscriber(id)
                    .with_reason(reason),
            );
            let transport = slot.transport;
            let limit = self.send_timeout;
            tokio::spawn(async move {
                let _ = time::timeout(limit, transport.close()).await;
            });
        }
    }

    /// Sends `message` to every subscriber after its queued lines, closes every
    /// transport and refuses further attaches.
    pub async fn close_all(&self, message: &str) {
        let drained: Vec<(SubscriberId, Slot)> = {
            let mut slots = self.slots.lock();
            slots.closed = true;
            slots.entries.drain().collect()
        };
        if drained.is_empty() {
            return;
        }

        let message: Arc<str> = Arc::from(message);
        let closing = drained
            .into_iter()
            .map(|(id, slot)| self.close_one(id, slot, Arc::clone(&message)));
        futures::future::join_all(closing).await;
    }

    async fn close_one(&self, id: SubscriberId, slot: Slot, message: Arc<str>) {
        let Slot {
            transport,
            sender,
            cancel,
            mut worker,
        } = slot;

        match sender.try_send(Feed::Close(Arc::clone(&message))) {
            Ok(()) => {
                drop(sender);
                if time::timeout(self.send_timeout, &mut worker).await.is_err() {
                    worker.abort();
                    debug!(unit = %self.unit, subscriber = %id, "final console message not delivered in time");
                }
            }
            Err(_) => {
                // Queue full or worker gone: stop draining and send directly.
                drop(sender);
                cancel.cancel();
                if time::timeout(self.send_timeout, &mut worker).await.is_err() {
                    worker.abort();
                }
                if let Err(reason) = deliver(&transport, &message, self.send_timeout).await {
                    debug!(unit = %self.unit, subscriber = %id, reason, "final console message failed");
                }
            }
        }

        let _ = time::timeout(self.send_timeout, transport.close()).await;
    }

    /// Number of attached subscribers.
    pub fn len(&self) -> usize {
        self.slots.lock().entries.len()
    }
}

/// Per-subscriber delivery loop.
struct Worker {
    id: SubscriberId,
    unit: UnitId,
    transport: TransportRef,
    cancel: CancellationToken,
    slots: Arc<Mutex<Slots>>,
    send_timeout: Duration,
    bus: Bus,
}

impl Worker {
    async fn run(self, backlog: Vec<String>, mut rx: mpsc::Receiver<Feed>) {
        for line in backlog {
            if self.cancel.is_cancelled() {
                return;
            }
            if let Err(reason) = deliver(&self.transport, &line, self.send_timeout).await {
                self.evict(reason).await;
                return;
            }
        }

        loop {
            let feed = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                feed = rx.recv() => match feed {
                    Some(feed) => feed,
                    None => return,
                },
            };

            match feed {
                Feed::Line(line) => {
                    if let Err(reason) = deliver(&self.transport, &line, self.send_timeout).await {
                        self.evict(reason).await;
                        return;
                    }
                }
                Feed::Close(message) => {
                    if let Err(reason) = deliver(&self.transport, &message, self.send_timeout).await {
                        debug!(unit = %self.unit, subscriber = %self.id, reason, "final console message failed");
                    }
                    return;
                }
            }
        }
    }

    /// Removes this subscriber after a failed delivery.
    ///
    /// If the slot is already gone (detach or close raced us) the owner of that
    /// path decides about the transport.
    async fn evict(&self, reason: &'static str) {
        let removed = self.slots.lock().entries.remove(&self.id);
        if removed.is_none() {
            return;
        }
        drop(removed);

        debug!(
            unit = %self.unit,
            subscriber = %self.id,
            transport = self.transport.name(),
            reason,
            "console subscriber evicted"
        );
        self.bus.publish(
            Event::new(EventKind::SubscriberEvicted)
                .with_unit(self.unit)
                .with_subscriber(self.id)
                .with_reason(reason),
        );
        let _ = time::timeout(self.send_timeout, self.transport.close()).await;
    }
}

/// One bounded, panic-isolated send.
async fn deliver(transport: &TransportRef, line: &str, limit: Duration) -> Result<(), &'static str> {
    let send = std::panic::AssertUnwindSafe(transport.send_text(line)).catch_unwind();
    match time::timeout(limit, send).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(err))) => Err(err.as_label()),
        Ok(Err(_panic)) => Err("transport_panicked"),
        Err(_elapsed) => Err("send_timeout"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::subscribers::ConsoleTransport;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct Recorder {
        lines: Mutex<Vec<String>>,
        closed: AtomicBool,
        fail: AtomicBool,
        delay: Option<Duration>,
    }

    impl Recorder {
        fn lines(&self) -> Vec<String> {
            self.lines.lock().clone()
        }
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConsoleTransport for Recorder {
        async fn send_text(&self, line: &str) -> Result<(), TransportError> {
            if let Some(d) = self.delay {
                time::sleep(d).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(TransportError::Closed);
            }
            self.lines.lock().push(line.to_string());
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn registry(queue: usize, send_timeout: Duration) -> SubscriberRegistry {
        SubscriberRegistry::new(UnitId(1), queue, send_timeout, Bus::new(64))
    }

    async fn settle<F: Fn() -> bool>(cond: F) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn backlog_then_live_lines_in_order() {
        let reg = registry(16, Duration::from_secs(1));
        let rec = Arc::new(Recorder::default());

        reg.attach(rec.clone(), || vec!["old 1".into(), "old 2".into()])
            .unwrap();
        reg.record(&LogRing::default(), "new 1");
        reg.record(&LogRing::default(), "new 2");

        settle(|| rec.lines().len() == 4).await;
        assert_eq!(rec.lines(), vec!["old 1", "old 2", "new 1", "new 2"]);
    }

    #[tokio::test]
    async fn recorded_lines_reach_new_subscriber_exactly_once() {
        let reg = Arc::new(registry(1024, Duration::from_secs(1)));
        let logs = Arc::new(LogRing::new(1000));

        let writer = {
            let (reg, logs) = (reg.clone(), logs.clone());
            tokio::spawn(async move {
                for i in 0..300 {
                    reg.record(&logs, &format!("line {i}"));
                    if i % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            })
        };

        let rec = Arc::new(Recorder::default());
        reg.attach(rec.clone(), || logs.snapshot()).unwrap();
        writer.await.unwrap();

        settle(|| rec.lines().len() == 300).await;
        let expected: Vec<String> = (0..300).map(|i| format!("line {i}")).collect();
        assert_eq!(rec.lines(), expected);
    }

    #[tokio::test]
    async fn failing_subscriber_is_evicted_others_keep_receiving() {
        let reg = registry(16, Duration::from_secs(1));
        let good = Arc::new(Recorder::default());
        let bad = Arc::new(Recorder::default());
        bad.fail.store(true, Ordering::SeqCst);

        reg.attach(good.clone(), Vec::new).unwrap();
        reg.attach(bad.clone(), Vec::new).unwrap();

        reg.record(&LogRing::default(), "one");
        settle(|| bad.is_closed()).await;
        assert_eq!(reg.len(), 1);

        reg.record(&LogRing::default(), "two");
        settle(|| good.lines().len() == 2).await;
        assert_eq!(good.lines(), vec!["one", "two"]);
        assert!(!good.is_closed());
    }

    #[tokio::test]
    async fn slow_subscriber_overflow_is_evicted() {
        let reg = registry(1, Duration::from_secs(5));
        let slow = Arc::new(Recorder {
            delay: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        reg.attach(slow.clone(), Vec::new).unwrap();

        for i in 0..10 {
            reg.record(&LogRing::default(), &format!("line {i}"));
        }
        assert_eq!(reg.len(), 0);
        settle(|| slow.is_closed()).await;
    }

    #[tokio::test]
    async fn detach_is_idempotent_and_stops_delivery() {
        let reg = registry(16, Duration::from_secs(1));
        let rec = Arc::new(Recorder::default());
        let transport: TransportRef = rec.clone();

        let id = reg.attach(transport.clone(), Vec::new).unwrap();
        reg.record(&LogRing::default(), "before");
        settle(|| rec.lines().len() == 1).await;

        assert!(reg.detach_transport(&transport).await);
        assert!(!reg.detach(id).await);
        reg.record(&LogRing::default(), "after");
        time::sleep(Duration::from_millis(20)).await;

        assert_eq!(rec.lines(), vec!["before"]);
        assert!(!rec.is_closed());
    }

    #[tokio::test]
    async fn close_all_sends_final_message_then_closes() {
        let reg = registry(16, Duration::from_secs(1));
        let a = Arc::new(Recorder::default());
        let b = Arc::new(Recorder::default());
        reg.attach(a.clone(), Vec::new).unwrap();
        reg.attach(b.clone(), Vec::new).unwrap();

        reg.record(&LogRing::default(), "last line");
        reg.close_all("=== stopped ===").await;

        for rec in [&a, &b] {
            assert_eq!(rec.lines(), vec!["last line", "=== stopped ==="]);
            assert!(rec.is_closed());
        }
        assert_eq!(reg.len(), 0);

        let late = Arc::new(Recorder::default());
        assert!(matches!(
            reg.attach(late, Vec::new),
            Err(SupervisorError::NotRunning { .. })
        ));
    }

    #[tokio::test]
    async fn hung_subscriber_does_not_block_close_all() {
        let reg = registry(16, Duration::from_millis(50));
        let hung = Arc::new(Recorder {
            delay: Some(Duration::from_secs(60)),
            ..Default::default()
        });
        reg.attach(hung.clone(), Vec::new).unwrap();
        reg.record(&LogRing::default(), "stuck");

        time::timeout(Duration::from_secs(2), reg.close_all("bye"))
            .await
            .expect("close_all must be bounded");
        assert!(hung.is_closed());
    }
}
