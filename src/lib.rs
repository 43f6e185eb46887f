//! # procvisor
//!
//! **Procvisor** supervises long-running console programs such as game servers.
//!
//! It starts a unit's process in its working directory, keeps the recent console
//! output, forwards console commands to stdin, streams output to live
//! subscribers, and stops processes gracefully with a forced-kill fallback.
//! Storage of units, authentication and the outer API are left to the embedding
//! application.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │ Unit (lobby) │   │ Unit (smp)   │   │ Unit (proxy) │   owned by the caller
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Supervisor                                                       │
//! │  - Registry: UnitId → ProcessHandle (at most one per unit)        │
//! │  - Bus (broadcast lifecycle events)                               │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌─────────────────────────────────────────────────┐
//!  │ ProcessHandle                                   │
//!  │  stdin ◄── send_command / shutdown commands     │
//!  │  LogRing (last N lines)                         │
//!  │  SubscriberRegistry ──► worker ──► transport    │
//!  │  state: Starting → Running → Stopping → Exited  │
//!  └───────▲───────────────▲─────────────────────────┘
//!          │               │
//!   stdout reader    stderr reader       exit waiter (owns the child)
//! ```
//!
//! ### Console line path
//! ```text
//! child stdout/stderr ─► read_until('\n') ─► trim \r ─► strip ANSI
//!                     ─► SubscriberRegistry.record (LogRing + queues)
//!                                              ├─ queue full → evict + close
//!                                              └─ worker: send_text (bounded by send_timeout)
//! ```
//!
//! ## Features
//! | Area              | Description                                              | Key types / traits                          |
//! |-------------------|----------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Start, stop, restart, commands, logs, stats per unit.    | [`Supervisor`]                              |
//! | **Units**         | Caller-owned view of a configured program.               | [`Unit`], [`UnitRecord`]                    |
//! | **Console**       | Live output to subscribers with history replay.          | [`ConsoleTransport`], [`ChannelTransport`]  |
//! | **Events**        | Lifecycle events for logging or metrics.                 | [`Event`], [`EventKind`]                    |
//! | **Errors**        | Typed errors with stable labels.                         | [`SupervisorError`], [`TransportError`]     |
//! | **Configuration** | Timeouts, capacities and shutdown commands.              | [`SupervisorConfig`]                        |
//!
//! ## Example
//! ```no_run
//! use procvisor::{Supervisor, SupervisorConfig, Unit, UnitId, UnitRecord};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = Supervisor::new(SupervisorConfig::default());
//!
//!     let smp = UnitRecord::arc(UnitId(7), "survival", "/srv/survival", "java -Xmx4G -jar paper.jar nogui");
//!     sup.start(smp.clone()).await?;
//!
//!     sup.send_command(&*smp, "say restarting in 5 minutes").await?;
//!     println!("{} up {}", smp.name(), smp.format_uptime());
//!
//!     sup.restart(smp.clone()).await?;
//!     sup.stop(&*smp).await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod output;
mod process;
mod subscribers;
mod unit;

// ---- Public re-exports ----

pub use crate::core::{shutdown_signal, ProcessStats, Supervisor, SupervisorConfig};
pub use error::{SupervisorError, TransportError};
pub use events::{Event, EventKind};
pub use output::{strip_ansi, LogRing, DEFAULT_LOG_CAPACITY};
pub use process::{OutputStream, ProcessHandle, ProcessState};
pub use subscribers::{ChannelTransport, ConsoleTransport, SubscriberId, TransportRef};
pub use unit::{Unit, UnitId, UnitRecord, UnitRef, UnitStatus};
