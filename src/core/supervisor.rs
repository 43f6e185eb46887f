//! # Supervisor: process lifecycle, console I/O and subscribers for many units.
//!
//! The [`Supervisor`] owns the event bus and the running-unit table. Every
//! operation is keyed by a unit; units without a running process answer with
//! `NotRunning` or an empty/offline result.
//!
//! ## High-level architecture
//! ```text
//! start(unit)
//!   └─► Registry::spawn_and_register
//!         ├─ launch(): split command line → spawn with piped stdio in working_dir
//!         ├─ table.insert(ProcessHandle)          (under the write lock)
//!         ├─ unit.set_status(Online)
//!         ├─ spawn_reader(stdout) ─┐
//!         ├─ spawn_reader(stderr) ─┴─► SubscriberRegistry.record (LogRing + queues)
//!         └─ spawn watch_exit(child)
//!                └─ exit → drain readers → remove entry + Offline → release stdin
//!                        → close_all("=== Server stopped ...") → UnitExited
//!
//! stop(unit)
//!   └─ "stop", "end" on stdin ── timeout(grace) ──► exited
//!                                   └─ elapsed → GraceExceeded → kill → timeout(kill_wait)
//! ```
//!
//! ## Example
//! ```no_run
//! use std::time::Duration;
//! use procvisor::{ChannelTransport, Supervisor, SupervisorConfig, UnitId, UnitRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = SupervisorConfig::default();
//!     cfg.grace = Duration::from_secs(10);
//!     let sup = Supervisor::new(cfg);
//!
//!     let lobby = UnitRecord::arc(UnitId(1), "lobby", "/srv/lobby", "java -jar server.jar nogui");
//!     sup.start(lobby.clone()).await?;
//!
//!     let (console, mut lines) = ChannelTransport::new(256);
//!     sup.attach_subscriber(&*lobby, console).await?;
//!     tokio::spawn(async move {
//!         while let Some(line) = lines.recv().await {
//!             println!("{line}");
//!         }
//!     });
//!
//!     sup.send_command(&*lobby, "say hello").await?;
//!     sup.run_until_signal().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, info, warn};

use crate::core::config::SupervisorConfig;
use crate::core::registry::Registry;
use crate::core::shutdown;
use crate::core::stats::{resident_memory, ProcessStats};
use crate::error::SupervisorError;
use crate::events::{Bus, Event};
use crate::process::{ProcessHandle, ProcessState};
use crate::subscribers::{SubscriberId, TransportRef};
use crate::unit::{Unit, UnitId, UnitRef};

/// Line sent to a subscriber that attaches to a unit without a running process.
const NOT_RUNNING_LINE: &str = "Error: Server is not running\n";

/// Runs and supervises the processes of many units.
pub struct Supervisor {
    cfg: SupervisorConfig,
    bus: Bus,
    registry: Arc<Registry>,
}

impl Supervisor {
    /// Creates a supervisor with no running units.
    pub fn new(cfg: SupervisorConfig) -> Self {
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let registry = Registry::new(cfg.clone(), bus.clone());
        Self { cfg, bus, registry }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    /// Subscribes to lifecycle events of all units.
    pub fn subscribe_events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Starts the unit's process.
    ///
    /// # Errors
    /// - `AlreadyRunning` if the unit has a process
    /// - `InvalidCommand` if its command line is blank
    /// - `LaunchFailed` / `StreamSetupFailed` if the OS could not create the process
    pub async fn start(&self, unit: UnitRef) -> Result<(), SupervisorError> {
        self.registry.spawn_and_register(unit).await.map(|_| ())
    }

    /// Stops the unit's process gracefully, killing it once the grace period elapses.
    ///
    /// Returns after the exit was observed (or `kill_wait` elapsed after the kill).
    pub async fn stop(&self, unit: &dyn Unit) -> Result<(), SupervisorError> {
        let handle = self.running(unit.id()).await?;
        self.registry.stop_handle(&handle).await;
        Ok(())
    }

    /// Stops the unit if running, waits `restart_delay`, and starts it again.
    ///
    /// If the old process is still registered after the kill wait, the restart
    /// is abandoned with `AlreadyRunning`.
    pub async fn restart(&self, unit: UnitRef) -> Result<(), SupervisorError> {
        let id = unit.id();
        match self.registry.get(id).await {
            Some(handle) => {
                if !self.registry.stop_handle(&handle).await {
                    warn!(unit = %id, pid = ?handle.pid(), "restart abandoned, previous process still registered");
                    return Err(SupervisorError::AlreadyRunning { unit: id });
                }
                time::sleep(self.cfg.restart_delay).await;
            }
            None => debug!(unit = %id, "restart of stopped unit, starting"),
        }
        self.start(unit).await
    }

    /// Writes one console command (plus newline) to the unit's stdin.
    pub async fn send_command(&self, unit: &dyn Unit, command: &str) -> Result<(), SupervisorError> {
        let handle = self.running(unit.id()).await?;
        handle.send_line(command).await
    }

    /// Console history of the running process; empty when not running.
    pub async fn get_logs(&self, unit: &dyn Unit) -> Vec<String> {
        match self.registry.get(unit.id()).await {
            Some(handle) => handle.logs(),
            None => Vec::new(),
        }
    }

    pub async fn is_running(&self, unit: &dyn Unit) -> bool {
        self.registry.contains(unit.id()).await
    }

    /// Lifecycle state of the unit's process, if it has one.
    pub async fn process_state(&self, unit: &dyn Unit) -> Option<ProcessState> {
        self.registry.get(unit.id()).await.map(|h| h.state())
    }

    /// Handle of the unit's running process.
    pub async fn handle(&self, unit: &dyn Unit) -> Option<Arc<ProcessHandle>> {
        self.registry.get(unit.id()).await
    }

    /// Resource usage of the unit's process.
    ///
    /// A failed memory lookup is logged and reported as 0 bytes; the unit still
    /// counts as running.
    pub async fn get_stats(&self, unit: &dyn Unit) -> ProcessStats {
        let Some(handle) = self.registry.get(unit.id()).await else {
            return ProcessStats::offline();
        };
        let pid = handle.pid();
        let memory = match pid {
            Some(pid) => match resident_memory(pid).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(unit = %unit.id(), pid, error = %err, "memory lookup failed");
                    0
                }
            },
            None => 0,
        };
        ProcessStats::running(pid, memory)
    }

    /// Attaches a console subscriber to the unit.
    ///
    /// The subscriber first receives the retained history, then live lines, and
    /// finally the exit line when the process ends. If the unit is not running,
    /// the transport receives `"Error: Server is not running\n"` and is closed.
    pub async fn attach_subscriber(
        &self,
        unit: &dyn Unit,
        transport: TransportRef,
    ) -> Result<SubscriberId, SupervisorError> {
        let id = unit.id();
        let attached = match self.registry.get(id).await {
            Some(handle) => handle.attach(Arc::clone(&transport)),
            None => Err(SupervisorError::NotRunning { unit: id }),
        };
        if attached.is_err() {
            debug!(unit = %id, transport = transport.name(), "attach to stopped unit rejected");
            self.reject(&transport).await;
        }
        attached
    }

    /// Detaches a console subscriber. Returns `false` if it was not attached.
    ///
    /// The transport is not closed. Once this returns, it receives no more lines.
    pub async fn detach_subscriber(&self, unit: &dyn Unit, transport: &TransportRef) -> bool {
        match self.registry.get(unit.id()).await {
            Some(handle) => handle.subscribers().detach_transport(transport).await,
            None => false,
        }
    }

    /// Ids of all units with a running process, sorted.
    pub async fn running_units(&self) -> Vec<UnitId> {
        self.registry.list().await
    }

    /// Stops every running unit concurrently.
    pub async fn stop_all(&self) {
        let handles = self.registry.handles().await;
        if handles.is_empty() {
            return;
        }
        info!(units = handles.len(), "stopping all units");
        join_all(handles.iter().map(|h| self.registry.stop_handle(h))).await;
    }

    /// Waits for a termination signal, then stops every running unit.
    pub async fn run_until_signal(&self) -> std::io::Result<()> {
        let signal = shutdown::shutdown_signal().await?;
        info!(%signal, "shutdown signal received");
        self.stop_all().await;
        Ok(())
    }

    async fn running(&self, id: UnitId) -> Result<Arc<ProcessHandle>, SupervisorError> {
        self.registry
            .get(id)
            .await
            .ok_or(SupervisorError::NotRunning { unit: id })
    }

    /// Tells a transport the unit is offline and closes it.
    async fn reject(&self, transport: &TransportRef) {
        let limit = self.cfg.send_timeout;
        match time::timeout(limit, transport.send_text(NOT_RUNNING_LINE)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!(transport = transport.name(), error = %err, "offline notice not delivered"),
            Err(_) => debug!(transport = transport.name(), "offline notice timed out"),
        }
        if time::timeout(limit, transport.close()).await.is_err() {
            debug!(transport = transport.name(), "transport close timed out");
        }
    }
}
