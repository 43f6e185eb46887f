//! Background readers for a process's stdout and stderr.
//!
//! Each reader turns raw bytes into console lines: split on `\n`, trim a
//! trailing `\r`, decode lossily, strip color sequences. Every line is appended
//! to the unit's [`LogRing`] and queued for its subscribers in one step.
//! A reader ends on EOF or on the first read error; neither is escalated, the
//! exit waiter owns termination.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::output::{strip_ansi, LogRing};
use crate::subscribers::SubscriberRegistry;
use crate::unit::UnitId;

/// Which standard stream a reader follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputStream::Stdout => "stdout",
            OutputStream::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spawns a reader task for one stream.
pub(crate) fn spawn_reader<R>(
    unit: UnitId,
    stream: OutputStream,
    source: R,
    logs: Arc<LogRing>,
    subscribers: Arc<SubscriberRegistry>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(source);
        let mut buf = Vec::with_capacity(256);
        let mut count: u64 = 0;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    subscribers.record(&logs, &decode_line(&buf));
                    count += 1;
                }
                Err(err) => {
                    warn!(unit = %unit, %stream, error = %err, "console read failed");
                    break;
                }
            }
        }
        debug!(unit = %unit, %stream, lines = count, "console stream closed");
    })
}

/// Converts one raw line (with or without terminator) into a clean console line.
pub(crate) fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    strip_ansi(&String::from_utf8_lossy(raw))
}
