use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{Unit, UnitId, UnitStatus};

#[derive(Debug, Default)]
struct State {
    status: UnitStatus,
    started_at: Option<DateTime<Utc>>,
}

/// In-memory [`Unit`] with uptime helpers.
#[derive(Debug)]
pub struct UnitRecord {
    id: UnitId,
    name: String,
    working_dir: PathBuf,
    command_line: RwLock<String>,
    state: RwLock<State>,
}

impl UnitRecord {
    /// Creates an offline unit.
    pub fn new(
        id: impl Into<UnitId>,
        name: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        command_line: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            working_dir: working_dir.into(),
            command_line: RwLock::new(command_line.into()),
            state: RwLock::new(State::default()),
        }
    }

    /// Same as [`UnitRecord::new`], wrapped in an `Arc`.
    pub fn arc(
        id: impl Into<UnitId>,
        name: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        command_line: impl Into<String>,
    ) -> Arc<Self> {
        Arc::new(Self::new(id, name, working_dir, command_line))
    }

    /// Replaces the startup command. Takes effect on the next start.
    pub fn set_command_line(&self, command_line: impl Into<String>) {
        *self.command_line.write() = command_line.into();
    }

    /// Time since the unit went online; zero while offline.
    pub fn uptime(&self) -> Duration {
        let state = self.state.read();
        match (state.status, state.started_at) {
            (UnitStatus::Online, Some(at)) => (Utc::now() - at).to_std().unwrap_or_default(),
            _ => Duration::ZERO,
        }
    }

    /// Formats uptime as `"9d 19h 8m 30s"`, `"0h 0m 5s"`, or `"Offline"`.
    pub fn format_uptime(&self) -> String {
        if self.status() != UnitStatus::Online {
            return "Offline".to_string();
        }
        format_uptime(self.uptime())
    }
}

pub(crate) fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let days = total / 86_400;
    let hours = (total / 3_600) % 24;
    let minutes = (total / 60) % 60;
    let seconds = total % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else {
        format!("{hours}h {minutes}m {seconds}s")
    }
}

impl Unit for UnitRecord {
    fn id(&self) -> UnitId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn command_line(&self) -> String {
        self.command_line.read().clone()
    }

    fn status(&self) -> UnitStatus {
        self.state.read().status
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().started_at
    }

    fn set_status(&self, status: UnitStatus) {
        let mut state = self.state.write();
        state.status = status;
        state.started_at = match status {
            UnitStatus::Online => Some(Utc::now()),
            UnitStatus::Offline => None,
        };
    }
}
