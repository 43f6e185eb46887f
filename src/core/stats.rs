//! Resource usage of running units.

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, System};
use thiserror::Error;

const MIB: f64 = 1024.0 * 1024.0;

/// Point-in-time resource usage of a unit's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    /// Resident memory in bytes; 0 when offline or unknown.
    pub memory_bytes: u64,
    pub pid: Option<u32>,
    pub is_running: bool,
}

impl ProcessStats {
    /// Stats of a unit with no running process.
    pub fn offline() -> Self {
        Self {
            memory_bytes: 0,
            pid: None,
            is_running: false,
        }
    }

    pub(crate) fn running(pid: Option<u32>, memory_bytes: u64) -> Self {
        Self {
            memory_bytes,
            pid,
            is_running: true,
        }
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_bytes as f64 / MIB
    }

    pub fn memory_gb(&self) -> f64 {
        self.memory_mb() / 1024.0
    }
}

#[derive(Error, Debug)]
pub(crate) enum StatsError {
    #[error("process {pid} not found")]
    NotFound { pid: u32 },
    #[error("memory lookup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Resident memory of `pid` in bytes.
///
/// The OS query is blocking, so it runs on the blocking pool.
pub(crate) async fn resident_memory(pid: u32) -> Result<u64, StatsError> {
    tokio::task::spawn_blocking(move || {
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        if !system.refresh_process_specifics(target, ProcessRefreshKind::everything()) {
            return Err(StatsError::NotFound { pid });
        }
        system
            .process(target)
            .map(|process| process.memory())
            .ok_or(StatsError::NotFound { pid })
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_units() {
        let stats = ProcessStats::running(Some(42), 3 * 1024 * 1024 * 1024);
        assert_eq!(stats.memory_mb(), 3072.0);
        assert_eq!(stats.memory_gb(), 3.0);
        assert!(stats.is_running);
    }

    #[test]
    fn offline_is_empty() {
        let stats = ProcessStats::offline();
        assert_eq!(stats.memory_bytes, 0);
        assert_eq!(stats.pid, None);
        assert!(!stats.is_running);
    }

    #[test]
    fn serializes_flat() {
        let json = serde_json::to_value(ProcessStats::running(Some(7), 10)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "memory_bytes": 10, "pid": 7, "is_running": true })
        );
    }

    #[tokio::test]
    async fn reads_own_memory() {
        let bytes = resident_memory(std::process::id()).await.unwrap();
        assert!(bytes > 0);
    }

    #[tokio::test]
    async fn unknown_pid_is_not_found() {
        let err = resident_memory(u32::MAX - 1).await.unwrap_err();
        assert!(matches!(err, StatsError::NotFound { .. }));
    }
}
