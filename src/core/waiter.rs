//! Exit waiter: one task per running process.
//!
//! Owns the child. Waits for it to end (or kills it when asked), lets the
//! readers drain, then cleans up in a fixed order:
//! table entry and unit offline (one lock) → stdin → subscribers closed with the exit line → `UnitExited` → state `Exited`.

use std::sync::Arc;

use futures::future::join_all;
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, info, warn};

use crate::core::registry::Registry;
use crate::events::{Event, EventKind};
use crate::process::ProcessHandle;
use crate::unit::UnitRef;

pub(crate) async fn watch_exit(
    registry: Arc<Registry>,
    handle: Arc<ProcessHandle>,
    mut child: Child,
    unit: UnitRef,
    readers: [JoinHandle<()>; 2],
) {
    let id = handle.unit();
    let kill = handle.kill_token();

    let status = tokio::select! {
        status = child.wait() => status,
        _ = kill.cancelled() => {
            if let Err(err) = child.start_kill() {
                warn!(unit = %id, pid = ?handle.pid(), error = %err, "kill failed");
            }
            child.wait().await
        }
    };
    let exit_code = match status {
        Ok(status) => {
            info!(unit = %id, name = handle.name(), %status, "unit process exited");
            status.code().unwrap_or(-1)
        }
        Err(err) => {
            warn!(unit = %id, error = %err, "waiting for unit process failed");
            -1
        }
    };

    // Trailing output must reach the ring and subscribers before the exit line.
    if time::timeout(registry.config().output_drain, join_all(readers))
        .await
        .is_err()
    {
        debug!(unit = %id, "console streams still open after exit");
    }

    if !registry.remove_if_current(&handle, unit.as_ref()).await {
        debug!(unit = %id, "table entry already replaced");
    }
    handle.release_stdin().await;
    handle.subscribers().close_all(&exit_banner(exit_code)).await;

    registry.bus().publish(
        Event::new(EventKind::UnitExited)
            .with_unit(id)
            .with_pid(handle.pid())
            .with_exit_code(exit_code),
    );
    handle.finish(exit_code);
}

/// Final console line sent to every subscriber of an exited unit.
pub(crate) fn exit_banner(exit_code: i32) -> String {
    format!("\n=== Server stopped (exit code: {exit_code}) ===\n")
}
