//! Error types used by the supervisor and console transports.
//!
//! - [`SupervisorError`]: errors returned by supervisor operations.
//! - [`TransportError`]: errors reported by a console transport.
//!
//! Both provide `as_label` for logs/metrics.

use std::io;

use thiserror::Error;

use crate::unit::UnitId;

/// # Errors returned by supervisor operations.
///
/// Categories:
/// - **caller mistakes**: `InvalidCommand` (not retried);
/// - **resource errors**: `StreamSetupFailed`, `LaunchFailed` (no handle left behind, retryable);
/// - **state errors**: `AlreadyRunning`, `NotRunning`;
/// - **console I/O**: `StdinUnavailable`, `WriteFailed`.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// A process for this unit is already registered.
    #[error("unit {unit} is already running")]
    AlreadyRunning {
        /// Unit that was asked to start.
        unit: UnitId,
    },

    /// No process is registered for this unit.
    #[error("unit {unit} is not running")]
    NotRunning {
        /// Unit that was addressed.
        unit: UnitId,
    },

    /// The startup command line has no executable.
    #[error("invalid startup command for unit {unit}: command line is empty")]
    InvalidCommand {
        /// Unit with the bad command line.
        unit: UnitId,
    },

    /// A standard stream pipe could not be acquired.
    #[error("failed to set up {stream} for unit {unit}")]
    StreamSetupFailed {
        /// Unit being launched.
        unit: UnitId,
        /// Which stream (`"stdin"`, `"stdout"`, `"stderr"`).
        stream: &'static str,
    },

    /// The OS refused to create the process.
    #[error("failed to launch `{program}` for unit {unit}: {source}")]
    LaunchFailed {
        /// Unit being launched.
        unit: UnitId,
        /// Executable that was attempted.
        program: String,
        /// Underlying spawn error.
        source: io::Error,
    },

    /// The process input stream is gone (never acquired or already released).
    #[error("stdin of unit {unit} is not available")]
    StdinUnavailable {
        /// Unit that was addressed.
        unit: UnitId,
    },

    /// Writing to the process input stream failed.
    #[error("failed to send command to unit {unit}: {source}")]
    WriteFailed {
        /// Unit that was addressed.
        unit: UnitId,
        /// Underlying write error.
        source: io::Error,
    },
}

impl SupervisorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use procvisor::{SupervisorError, UnitId};
    ///
    /// let err = SupervisorError::NotRunning { unit: UnitId(3) };
    /// assert_eq!(err.as_label(), "unit_not_running");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            SupervisorError::AlreadyRunning { .. } => "unit_already_running",
            SupervisorError::NotRunning { .. } => "unit_not_running",
            SupervisorError::InvalidCommand { .. } => "invalid_command",
            SupervisorError::StreamSetupFailed { .. } => "stream_setup_failed",
            SupervisorError::LaunchFailed { .. } => "launch_failed",
            SupervisorError::StdinUnavailable { .. } => "stdin_unavailable",
            SupervisorError::WriteFailed { .. } => "write_failed",
        }
    }

    /// Unit the error refers to.
    pub fn unit(&self) -> UnitId {
        match self {
            SupervisorError::AlreadyRunning { unit }
            | SupervisorError::NotRunning { unit }
            | SupervisorError::InvalidCommand { unit }
            | SupervisorError::StreamSetupFailed { unit, .. }
            | SupervisorError::LaunchFailed { unit, .. }
            | SupervisorError::StdinUnavailable { unit }
            | SupervisorError::WriteFailed { unit, .. } => *unit,
        }
    }

    /// Indicates whether retrying the same call may succeed.
    ///
    /// Returns `true` for resource errors (`StreamSetupFailed`, `LaunchFailed`).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SupervisorError::StreamSetupFailed { .. } | SupervisorError::LaunchFailed { .. }
        )
    }
}

/// # Errors reported by a console transport.
///
/// Any error evicts the subscriber; the variants only matter for logs.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Peer went away.
    #[error("transport closed")]
    Closed,

    /// Underlying I/O failure.
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),

    /// Anything else, described by the transport.
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Closed => "transport_closed",
            TransportError::Io(_) => "transport_io",
            TransportError::Other(_) => "transport_other",
        }
    }
}
