//! Bounded ring of recently completed output lines for one session.

use std::collections::VecDeque;

/// A capacity-bounded, FIFO-eviction buffer of sanitized output lines.
#[derive(Debug)]
pub struct LineBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl LineBuffer {
    /// Create a buffer holding at most `capacity` lines. `capacity` must be
    /// strictly positive per `SessionConfig::buffer_size`'s invariant.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
        }
    }

    /// Append a line, evicting the oldest if at capacity.
    pub fn push(&mut self, line: String) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Snapshot of every line currently buffered, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    /// Lines at or after `start` in buffer order (used by the sentinel
    /// protocol to scan only what arrived since a command was issued).
    #[must_use]
    pub fn snapshot_from(&self, start: usize) -> Vec<String> {
        self.lines.iter().skip(start).cloned().collect()
    }

    /// The last `n` lines, or the whole buffer if `n` is `None`, joined by
    /// `\n`.
    #[must_use]
    pub fn tail_joined(&self, n: Option<usize>) -> String {
        match n {
            None => self.snapshot().join("\n"),
            Some(n) => {
                let len = self.lines.len();
                let skip = len.saturating_sub(n);
                self.lines.iter().skip(skip).cloned().collect::<Vec<_>>().join("\n")
            }
        }
    }
}
