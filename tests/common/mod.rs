//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use procvisor::{
    ConsoleTransport, Event, EventKind, SupervisorConfig, TransportError, Unit, UnitId, UnitRecord,
    UnitStatus,
};
use tempfile::TempDir;
use tokio::sync::broadcast;

// =============================================================================
// Units
// =============================================================================

/// Unit that records every status transition the supervisor writes.
pub struct TrackedUnit {
    inner: UnitRecord,
    history: Mutex<Vec<UnitStatus>>,
}

impl TrackedUnit {
    pub fn new(id: u64, dir: &Path, command_line: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: UnitRecord::new(id, format!("unit-{id}"), dir, command_line),
            history: Mutex::new(Vec::new()),
        })
    }

    pub fn history(&self) -> Vec<UnitStatus> {
        self.history.lock().clone()
    }

    pub fn set_command_line(&self, command_line: &str) {
        self.inner.set_command_line(command_line);
    }
}

impl Unit for TrackedUnit {
    fn id(&self) -> UnitId {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn working_dir(&self) -> &Path {
        self.inner.working_dir()
    }

    fn command_line(&self) -> String {
        self.inner.command_line()
    }

    fn status(&self) -> UnitStatus {
        self.inner.status()
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.started_at()
    }

    fn set_status(&self, status: UnitStatus) {
        self.history.lock().push(status);
        self.inner.set_status(status);
    }
}

/// Scratch directory holding `run.sh` with `body`.
pub struct Script {
    pub dir: TempDir,
}

impl Script {
    pub fn new(body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.sh"), body).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Unit running `sh run.sh` inside the script directory.
    pub fn unit(&self, id: u64) -> Arc<TrackedUnit> {
        TrackedUnit::new(id, self.dir.path(), "sh run.sh")
    }
}

/// Prints `ready`, echoes every stdin line as `got: <line>`, exits 0 on `stop`.
pub const ECHO_SERVER: &str = r#"echo "ready"
while read line; do
  case "$line" in
    stop) echo "stopping"; exit 0 ;;
    *) echo "got: $line" ;;
  esac
done
"#;

/// Never reads stdin and survives SIGTERM.
pub const STUBBORN_SERVER: &str = "trap '' TERM\necho \"ready\"\nexec sleep 60\n";

// =============================================================================
// Transports
// =============================================================================

/// Transport that stores every line it receives.
#[derive(Default)]
pub struct Recorder {
    lines: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsoleTransport for Recorder {
    async fn send_text(&self, line: &str) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        self.lines.lock().push(line.to_string());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

/// Transport whose sends always fail.
#[derive(Default)]
pub struct Broken {
    closed: AtomicBool,
}

impl Broken {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConsoleTransport for Broken {
    async fn send_text(&self, _line: &str) -> Result<(), TransportError> {
        Err(TransportError::Other("connection reset".into()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Short timeouts so failure paths finish quickly.
pub fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        grace: Duration::from_secs(3),
        kill_wait: Duration::from_secs(3),
        restart_delay: Duration::from_millis(50),
        send_timeout: Duration::from_secs(1),
        output_drain: Duration::from_millis(500),
        ..SupervisorConfig::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `check` every 10ms until it holds or `limit` elapses.
pub async fn eventually<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Drains every event already published.
pub fn drain_events(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Waits for the next event that ends a process lifetime.
pub async fn next_terminal(rx: &mut broadcast::Receiver<Event>, limit: Duration) -> Option<Event> {
    tokio::time::timeout(limit, async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.is_terminal() => return Some(ev),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

pub fn kinds(events: &[Event]) -> Vec<EventKind> {
    events.iter().map(|e| e.kind).collect()
}
