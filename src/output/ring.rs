//! # Bounded history of recent console lines.
//!
//! [`LogRing`] keeps at most `capacity` lines in arrival order; appending past
//! capacity evicts from the head.
//!
//! ## Rules
//! - **Bounded**: `len() <= capacity()` at all times.
//! - **Ordered**: lines are never reordered.
//! - **Copy-on-read**: [`LogRing::snapshot`] returns an independent `Vec`.
//! - **Atomic append**: a line is visible fully or not at all (one short lock).

use std::collections::VecDeque;

use parking_lot::Mutex;

/// Default number of lines kept per unit.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Thread-safe FIFO of sanitized lines.
#[derive(Debug)]
pub struct LogRing {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl LogRing {
    /// Creates an empty ring. Capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a line at the tail, evicting the oldest lines beyond capacity.
    pub fn append(&self, line: impl Into<String>) {
        let line = line.into();
        let mut lines = self.lines.lock();
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// Returns an ordered copy of the current contents.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for LogRing {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn keeps_last_capacity_lines_in_order() {
        let ring = LogRing::default();
        for i in 0..2_500 {
            ring.append(format!("line {i}"));
        }
        let snap = ring.snapshot();
        assert_eq!(snap.len(), 1000);
        assert_eq!(snap.first().map(String::as_str), Some("line 1500"));
        assert_eq!(snap.last().map(String::as_str), Some("line 2499"));
        for (offset, line) in snap.iter().enumerate() {
            assert_eq!(line, &format!("line {}", 1500 + offset));
        }
    }

    #[test]
    fn under_capacity_keeps_everything() {
        let ring = LogRing::new(10);
        ring.append("a");
        ring.append("b");
        assert_eq!(ring.snapshot(), vec!["a", "b"]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let ring = LogRing::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.append("first");
        ring.append("second");
        assert_eq!(ring.snapshot(), vec!["second"]);
    }

    #[test]
    fn snapshot_is_independent_of_later_appends() {
        let ring = LogRing::new(3);
        ring.append("a");
        let snap = ring.snapshot();
        ring.append("b");
        assert_eq!(snap, vec!["a"]);
        assert_eq!(ring.len(), 2);
    }

    #[test]
    fn concurrent_writers_never_exceed_capacity() {
        let ring = Arc::new(LogRing::new(100));
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let ring = Arc::clone(&ring);
                std::thread::spawn(move || {
                    for i in 0..500 {
                        ring.append(format!("{w}:{i}"));
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(ring.len(), 100);

        // Per-writer order survives interleaving.
        let snap = ring.snapshot();
        for w in 0..4 {
            let seq: Vec<usize> = snap
                .iter()
                .filter_map(|l| l.strip_prefix(&format!("{w}:")))
                .map(|n| n.parse().unwrap())
                .collect();
            assert!(seq.windows(2).all(|p| p[0] < p[1]));
        }
    }
}
