use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::core::SupervisorConfig;
use crate::error::SupervisorError;
use crate::events::Bus;
use crate::output::LogRing;
use crate::subscribers::{SubscriberId, SubscriberRegistry, TransportRef};
use crate::unit::UnitId;

/// Lifecycle of one running process.
///
/// ```text
/// Starting ──► Running ──► Stopping ──► Exited
///                  └────────────────────────┘ (exits on its own)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned, not yet published in the running table.
    Starting,
    /// Published and accepting console commands.
    Running,
    /// A stop was requested; shutdown commands were sent.
    Stopping,
    /// Exit observed and cleanup finished.
    Exited,
}

impl ProcessState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessState::Starting => "starting",
            ProcessState::Running => "running",
            ProcessState::Stopping => "stopping",
            ProcessState::Exited => "exited",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the supervisor owns for one running unit.
///
/// The child process itself is owned by the exit waiter; the handle reaches it
/// through the kill token and observes it through the state channel.
pub struct ProcessHandle {
    unit: UnitId,
    name: Arc<str>,
    pid: Option<u32>,
    stdin: AsyncMutex<Option<ChildStdin>>,
    write_timeout: Duration,
    logs: Arc<LogRing>,
    subscribers: Arc<SubscriberRegistry>,
    state: watch::Sender<ProcessState>,
    exit_code: Mutex<Option<i32>>,
    kill: CancellationToken,
}

impl ProcessHandle {
    pub(crate) fn new(
        unit: UnitId,
        name: &str,
        pid: Option<u32>,
        stdin: ChildStdin,
        cfg: &SupervisorConfig,
        bus: Bus,
    ) -> Self {
        let (state, _) = watch::channel(ProcessState::Starting);
        Self {
            unit,
            name: Arc::from(name),
            pid,
            stdin: AsyncMutex::new(Some(stdin)),
            write_timeout: cfg.send_timeout,
            logs: Arc::new(LogRing::new(cfg.log_capacity_clamped())),
            subscribers: Arc::new(SubscriberRegistry::new(
                unit,
                cfg.subscriber_queue_clamped(),
                cfg.send_timeout,
                bus,
            )),
            state,
            exit_code: Mutex::new(None),
            kill: CancellationToken::new(),
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// OS process id, if the platform reported one.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ProcessState {
        *self.state.borrow()
    }

    /// Exit code once the process ended; `-1` when it was ended by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit_code.lock()
    }

    /// Snapshot of the retained console lines, oldest first.
    pub fn logs(&self) -> Vec<String> {
        self.logs.snapshot()
    }

    pub(crate) fn log_ring(&self) -> &Arc<LogRing> {
        &self.logs
    }

    pub(crate) fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    /// Attaches a console subscriber; it first receives the current history.
    ///
    /// # Panics
    /// Spawns the subscriber's worker with `tokio::spawn`, so it must be called
    /// from within a Tokio runtime.
    pub fn attach(&self, transport: TransportRef) -> Result<SubscriberId, SupervisorError> {
        self.subscribers.attach(transport, || self.logs.snapshot())
    }

    /// Writes `text` plus a newline to the process's stdin.
    ///
    /// Concurrent writers are serialized, so lines never interleave. The write is
    /// bounded by the send timeout; a process that stopped reading its input
    /// yields `WriteFailed` with `TimedOut` instead of blocking the caller.
    pub async fn send_line(&self, text: &str) -> Result<(), SupervisorError> {
        let mut stdin = self.stdin.lock().await;
        let pipe = stdin
            .as_mut()
            .ok_or(SupervisorError::StdinUnavailable { unit: self.unit })?;

        let mut buf = Vec::with_capacity(text.len() + 1);
        buf.extend_from_slice(text.as_bytes());
        buf.push(b'\n');

        let write = async {
            pipe.write_all(&buf).await?;
            pipe.flush().await
        };
        match time::timeout(self.write_timeout, write).await {
            Ok(res) => res.map_err(|source| SupervisorError::WriteFailed {
                unit: self.unit,
                source,
            }),
            Err(_) => Err(SupervisorError::WriteFailed {
                unit: self.unit,
                source: io::Error::new(io::ErrorKind::TimedOut, "stdin write timed out"),
            }),
        }
    }

    /// Waits until the exit waiter finished cleanup.
    pub async fn wait_exited(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s == ProcessState::Exited).await;
    }

    pub(crate) fn mark_running(&self) {
        self.state.send_if_modified(|s| {
            if *s == ProcessState::Starting {
                *s = ProcessState::Running;
                true
            } else {
                false
            }
        });
    }

    /// Moves `Running` to `Stopping`. Only the caller that made the move gets `true`.
    pub(crate) fn begin_stop(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == ProcessState::Running {
                *s = ProcessState::Stopping;
                true
            } else {
                false
            }
        })
    }

    /// Asks the exit waiter to kill the process.
    pub(crate) fn request_kill(&self) {
        self.kill.cancel();
    }

    pub(crate) fn kill_token(&self) -> CancellationToken {
        self.kill.clone()
    }

    /// Drops the stdin pipe; later writes fail with `StdinUnavailable`.
    pub(crate) async fn release_stdin(&self) {
        self.stdin.lock().await.take();
    }

    pub(crate) fn finish(&self, code: i32) {
        *self.exit_code.lock() = Some(code);
        self.state.send_replace(ProcessState::Exited);
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("unit", &self.unit)
            .field("name", &self.name)
            .field("pid", &self.pid)
            .field("state", &self.state())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
