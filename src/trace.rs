//! Bounded trace of emulated calls for replay and failure forensics.
//!
//! The mock never logs; it records a deterministic event per state-changing
//! call into a fixed-capacity ring. When the ring is full, the oldest events
//! are evicted first. Snapshots land in repro artifacts.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::events::CtlOp;
use crate::file::FileKind;

/// One recorded emulated call. Masks are raw bits so events stay plain data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceEvent {
    Create {
        kind: FileKind,
        fd: u32,
    },
    Ctl {
        op: CtlOp,
        epfd: u32,
        fd: u32,
        mask: u32,
    },
    Wait {
        epfd: u32,
        produced: u32,
        consumed: u32,
    },
    /// Teardown hook fired (at most once per kernel lifetime).
    Teardown,
    /// Synthetic error/hangup emission on an exhausted stream.
    SyntheticErr {
        epfd: u32,
        produced: u32,
    },
    Read {
        fd: u32,
        len: u32,
    },
    Send {
        fd: u32,
        len: u32,
    },
    Accept {
        listener: u32,
        conn: u32,
    },
    Close {
        fd: u32,
    },
    /// A call returned an error; `code` is `SysError::code()`.
    Denied {
        code: u16,
    },
}

/// Fixed-capacity ring of trace events, oldest evicted first.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyscallTrace {
    cap: usize,
    ring: VecDeque<TraceEvent>,
}

impl SyscallTrace {
    /// Create a trace with at least one slot.
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            ring: VecDeque::with_capacity(cap),
        }
    }

    #[inline(always)]
    pub fn cap(&self) -> usize {
        self.cap
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Record an event, evicting the oldest when at capacity.
    #[inline(always)]
    pub fn record(&mut self, ev: TraceEvent) {
        if self.ring.len() == self.cap {
            self.ring.pop_front();
        }
        self.ring.push_back(ev);
    }

    /// Snapshot in chronological order.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.ring.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_at_capacity() {
        let mut t = SyscallTrace::new(2);
        t.record(TraceEvent::Close { fd: 0 });
        t.record(TraceEvent::Close { fd: 1 });
        t.record(TraceEvent::Close { fd: 2 });
        assert_eq!(
            t.events(),
            vec![TraceEvent::Close { fd: 1 }, TraceEvent::Close { fd: 2 }]
        );
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut t = SyscallTrace::new(0);
        assert_eq!(t.cap(), 1);
        t.record(TraceEvent::Teardown);
        assert!(!t.is_empty());
    }
}
