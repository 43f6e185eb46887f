//! # Supervised units: the collaborator-side view of a configured program.
//!
//! A unit is owned by an external store (database row, config entry, ...).
//! The supervisor only reads its identity, working directory and command line,
//! and writes status transitions back through [`Unit::set_status`].
//!
//! - [`Unit`] is the contract collaborators implement;
//! - [`UnitRecord`] is a thread-safe in-memory implementation.

mod record;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use record::UnitRecord;

/// Stable identifier of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UnitId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Externally visible status of a unit.
///
/// `Online` holds iff the supervisor has a live process for the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    #[default]
    Offline,
    Online,
}

impl UnitStatus {
    /// Returns the lowercase label used by collaborators (`"online"` / `"offline"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Offline => "offline",
            UnitStatus::Online => "online",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contract for a supervised unit.
///
/// Implementations are shared between the caller and the supervisor's
/// background tasks, so status updates go through `&self` (interior mutability).
///
/// ### Rules
/// - `set_status(Online)` records the start timestamp.
/// - `set_status(Offline)` clears it.
/// - Persisting the change is the implementor's concern; the supervisor never
///   waits on it.
pub trait Unit: Send + Sync + 'static {
    /// Stable identifier (key of the supervisor table).
    fn id(&self) -> UnitId;

    /// Human-readable name (for logs).
    fn name(&self) -> &str;

    /// Directory the process is launched in.
    fn working_dir(&self) -> &Path;

    /// Startup command line: executable followed by whitespace-separated arguments.
    fn command_line(&self) -> String;

    /// Current status.
    fn status(&self) -> UnitStatus;

    /// Timestamp of the last transition to `Online`, if currently online.
    fn started_at(&self) -> Option<DateTime<Utc>>;

    /// Writes a status transition back to the owner.
    fn set_status(&self, status: UnitStatus);
}

/// Shared handle to a unit.
pub type UnitRef = Arc<dyn Unit>;
