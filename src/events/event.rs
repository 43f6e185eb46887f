//! # Lifecycle events emitted by the supervisor.
//!
//! [`EventKind`] classifies events in three groups:
//! - **Start events**: starting, started, start failed
//! - **Stop events**: stop requested, grace exceeded, exited
//! - **Console events**: subscriber attached, detached, evicted
//!
//! [`Event`] carries the optional metadata (unit, pid, exit code, reason, ...).
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically across all units.
//!
//! ## Example
//! ```rust
//! use procvisor::{Event, EventKind, UnitId};
//!
//! let ev = Event::new(EventKind::UnitExited)
//!     .with_unit(UnitId(4))
//!     .with_exit_code(1);
//!
//! assert_eq!(ev.kind, EventKind::UnitExited);
//! assert_eq!(ev.unit, Some(UnitId(4)));
//! assert_eq!(ev.exit_code, Some(1));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::subscribers::SubscriberId;
use crate::unit::UnitId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of supervisor events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Start ===
    /// Launch attempt began (table lock held, no duplicate possible).
    ///
    /// Sets: `unit`
    UnitStarting,

    /// Process created and registered; readers and exit waiter running.
    ///
    /// Sets: `unit`, `pid`
    UnitStarted,

    /// Launch attempt failed; nothing was registered.
    ///
    /// Sets: `unit`, `reason` (error label)
    StartFailed,

    // === Stop ===
    /// Graceful stop began; shutdown commands written to stdin.
    ///
    /// Sets: `unit`
    StopRequested,

    /// Process ignored the shutdown commands for the whole grace period and is
    /// being killed.
    ///
    /// Sets: `unit`, `timeout_ms` (grace)
    GraceExceeded,

    /// Process terminated (any cause) and cleanup finished.
    ///
    /// Sets: `unit`, `exit_code`
    UnitExited,

    // === Console ===
    /// Subscriber attached to a unit's console.
    ///
    /// Sets: `unit`, `subscriber`
    SubscriberAttached,

    /// Subscriber detached by its owner.
    ///
    /// Sets: `unit`, `subscriber`
    SubscriberDetached,

    /// Subscriber dropped after a delivery failure (error, timeout, overflow, panic).
    ///
    /// Sets: `unit`, `subscriber`, `reason`
    SubscriberEvicted,
}

/// Supervisor event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Unit the event refers to.
    pub unit: Option<UnitId>,
    /// OS process id.
    pub pid: Option<u32>,
    /// Exit code (`-1` when terminated by a signal).
    pub exit_code: Option<i32>,
    /// Console subscriber the event refers to.
    pub subscriber: Option<SubscriberId>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Human-readable reason (error labels, eviction cause, ...).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            unit: None,
            pid: None,
            exit_code: None,
            subscriber: None,
            timeout_ms: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    #[inline]
    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }

    #[inline]
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    #[inline]
    pub fn with_subscriber(mut self, id: SubscriberId) -> Self {
        self.subscriber = Some(id);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True for events that end a process lifetime.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::UnitExited | EventKind::StartFailed)
    }
}
