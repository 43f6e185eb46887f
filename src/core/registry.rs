//! # Running-unit table.
//!
//! Registry owns the map `UnitId → ProcessHandle` and the two flows that change it:
//! - `spawn_and_register` → launch, insert, wire readers and the exit waiter
//! - `stop_handle` → shutdown commands, bounded grace, kill fallback
//!
//! ## Rules
//! - at most one handle per unit id
//! - the write lock is held from the duplicate check to the insertion, never across an await
//! - entries are removed by the exit waiter, and only if they still hold the same handle
//! - unit status changes only under the write lock: Online on insert, Offline on removal

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::core::config::SupervisorConfig;
use crate::core::waiter;
use crate::error::SupervisorError;
use crate::events::{Bus, Event, EventKind};
use crate::process::{launch, spawn_reader, Launched, OutputStream, ProcessHandle};
use crate::unit::{Unit, UnitId, UnitRef, UnitStatus};

pub(crate) struct Registry {
    units: RwLock<HashMap<UnitId, Arc<ProcessHandle>>>,
    cfg: SupervisorConfig,
    bus: Bus,
}

impl Registry {
    pub fn new(cfg: SupervisorConfig, bus: Bus) -> Arc<Self> {
        Arc::new(Self {
            units: RwLock::new(HashMap::new()),
            cfg,
            bus,
        })
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.cfg
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub async fn get(&self, id: UnitId) -> Option<Arc<ProcessHandle>> {
        self.units.read().await.get(&id).cloned()
    }

    pub async fn contains(&self, id: UnitId) -> bool {
        self.units.read().await.contains_key(&id)
    }

    /// Returns sorted list of running unit ids.
    pub async fn list(&self) -> Vec<UnitId> {
        let units = self.units.read().await;
        let mut ids: Vec<UnitId> = units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn handles(&self) -> Vec<Arc<ProcessHandle>> {
        self.units.read().await.values().cloned().collect()
    }

    /// Launches the unit and publishes it as running.
    ///
    /// Readers and the exit waiter are spawned before the table lock is released,
    /// so an immediate exit still finds its entry to remove.
    pub async fn spawn_and_register(
        self: &Arc<Self>,
        unit: UnitRef,
    ) -> Result<Arc<ProcessHandle>, SupervisorError> {
        let id = unit.id();
        let mut units = self.units.write().await;
        if units.contains_key(&id) {
            return Err(SupervisorError::AlreadyRunning { unit: id });
        }

        self.bus
            .publish(Event::new(EventKind::UnitStarting).with_unit(id));

        let Launched {
            child,
            pid,
            stdin,
            stdout,
            stderr,
        } = match launch(unit.as_ref()) {
            Ok(launched) => launched,
            Err(err) => {
                warn!(unit = %id, name = unit.name(), error = %err, "unit failed to start");
                self.bus.publish(
                    Event::new(EventKind::StartFailed)
                        .with_unit(id)
                        .with_reason(err.as_label()),
                );
                return Err(err);
            }
        };

        let handle = Arc::new(ProcessHandle::new(
            id,
            unit.name(),
            pid,
            stdin,
            &self.cfg,
            self.bus.clone(),
        ));
        units.insert(id, Arc::clone(&handle));
        handle.mark_running();
        unit.set_status(UnitStatus::Online);

        let readers = [
            spawn_reader(
                id,
                OutputStream::Stdout,
                stdout,
                Arc::clone(handle.log_ring()),
                Arc::clone(handle.subscribers()),
            ),
            spawn_reader(
                id,
                OutputStream::Stderr,
                stderr,
                Arc::clone(handle.log_ring()),
                Arc::clone(handle.subscribers()),
            ),
        ];
        tokio::spawn(waiter::watch_exit(
            Arc::clone(self),
            Arc::clone(&handle),
            child,
            unit.clone(),
            readers,
        ));
        drop(units);

        info!(unit = %id, name = unit.name(), pid = ?pid, "unit started");
        self.bus
            .publish(Event::new(EventKind::UnitStarted).with_unit(id).with_pid(pid));
        Ok(handle)
    }

    /// Stops a running process: shutdown commands, then up to `grace` for the exit,
    /// then a kill and up to `kill_wait` for the exit to be observed.
    ///
    /// Only the caller that moved the handle to `Stopping` sends the commands;
    /// concurrent callers just wait. Stdin write failures are logged and fall
    /// through to the grace wait.
    ///
    /// Returns `false` if the exit was still not observed after `kill_wait`; the
    /// entry then stays in the table until the exit waiter removes it.
    pub async fn stop_handle(&self, handle: &ProcessHandle) -> bool {
        let id = handle.unit();
        let initiated = handle.begin_stop();
        if initiated {
            info!(unit = %id, name = handle.name(), "stopping unit");
            self.bus
                .publish(Event::new(EventKind::StopRequested).with_unit(id));
        }

        let graceful = async {
            if initiated {
                for command in &self.cfg.shutdown_commands {
                    if let Err(err) = handle.send_line(command).await {
                        debug!(unit = %id, %command, error = %err, "shutdown command not delivered");
                        break;
                    }
                }
            }
            handle.wait_exited().await;
        };
        if time::timeout(self.cfg.grace, graceful).await.is_ok() {
            debug!(unit = %id, "unit stopped within grace");
            return true;
        }

        warn!(unit = %id, name = handle.name(), grace = ?self.cfg.grace, "unit ignored shutdown, killing");
        self.bus.publish(
            Event::new(EventKind::GraceExceeded)
                .with_unit(id)
                .with_pid(handle.pid())
                .with_timeout(self.cfg.grace),
        );
        handle.request_kill();

        if time::timeout(self.cfg.kill_wait, handle.wait_exited())
            .await
            .is_err()
        {
            error!(unit = %id, pid = ?handle.pid(), kill_wait = ?self.cfg.kill_wait, "exit not observed after kill");
            return false;
        }
        true
    }

    /// Removes the unit's entry if it still refers to `handle` and marks the unit
    /// offline before the lock is released.
    ///
    /// A start that follows always sees the unit offline first, so a late
    /// removal can never overwrite the status of the next process.
    pub async fn remove_if_current(&self, handle: &Arc<ProcessHandle>, unit: &dyn Unit) -> bool {
        let mut units = self.units.write().await;
        match units.get(&handle.unit()) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                units.remove(&handle.unit());
                unit.set_status(UnitStatus::Offline);
                true
            }
            _ => false,
        }
    }
}
