//! # Supervisor configuration.
//!
//! Provides [`SupervisorConfig`], the centralized settings for the supervisor.
//! Loading it (file, env, flags) is the embedding application's job; the type
//! derives `Deserialize` with per-field defaults so it can sit inside a larger
//! config document. Durations are expressed in milliseconds there.
//!
//! ## Clamping
//! - `log_capacity`, `subscriber_queue` and `bus_capacity` are clamped to at least 1
//!   by the accessors.

use std::time::Duration;

use serde::Deserialize;

use crate::output::DEFAULT_LOG_CAPACITY;

/// Global configuration for the supervisor.
///
/// ## Field semantics
/// - `grace`: how long a graceful stop waits before killing the process
/// - `kill_wait`: how long to wait for the exit after a kill
/// - `restart_delay`: settle time between stop and start on restart
/// - `shutdown_commands`: console commands written on graceful stop, in order
/// - `log_capacity`: console lines kept per running unit
/// - `subscriber_queue`: per-subscriber queue size; overflow evicts the subscriber
/// - `send_timeout`: upper bound for one transport send; exceeding it evicts
/// - `output_drain`: how long the exit waiter lets readers flush after exit
/// - `bus_capacity`: event bus ring buffer size
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Maximum wait for the process to exit after the shutdown commands.
    #[serde(rename = "grace_ms", with = "millis")]
    pub grace: Duration,

    /// Maximum wait for the exit to be observed after a forced kill.
    #[serde(rename = "kill_wait_ms", with = "millis")]
    pub kill_wait: Duration,

    /// Delay between the stop and the start of a restart.
    #[serde(rename = "restart_delay_ms", with = "millis")]
    pub restart_delay: Duration,

    /// Commands written to stdin (each followed by a newline) to request shutdown.
    pub shutdown_commands: Vec<String>,

    /// Number of console lines kept per unit.
    pub log_capacity: usize,

    /// Capacity of each subscriber's queue.
    pub subscriber_queue: usize,

    /// Timeout for a single transport send.
    #[serde(rename = "send_timeout_ms", with = "millis")]
    pub send_timeout: Duration,

    /// Time the exit waiter gives the stream readers to deliver trailing output.
    #[serde(rename = "output_drain_ms", with = "millis")]
    pub output_drain: Duration,

    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
}

impl SupervisorConfig {
    /// Console history size, at least 1.
    #[inline]
    pub fn log_capacity_clamped(&self) -> usize {
        self.log_capacity.max(1)
    }

    /// Subscriber queue size, at least 1.
    #[inline]
    pub fn subscriber_queue_clamped(&self) -> usize {
        self.subscriber_queue.max(1)
    }

    /// Event bus capacity, at least 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for SupervisorConfig {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `kill_wait = 5s`
    /// - `restart_delay = 2s`
    /// - `shutdown_commands = ["stop", "end"]` (vanilla/paper and bungee-style proxies)
    /// - `log_capacity = 1000`
    /// - `subscriber_queue = 1024`
    /// - `send_timeout = 5s`
    /// - `output_drain = 1s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            kill_wait: Duration::from_secs(5),
            restart_delay: Duration::from_secs(2),
            shutdown_commands: vec!["stop".to_string(), "end".to_string()],
            log_capacity: DEFAULT_LOG_CAPACITY,
            subscriber_queue: 1024,
            send_timeout: Duration::from_secs(5),
            output_drain: Duration::from_secs(1),
            bus_capacity: 1024,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
