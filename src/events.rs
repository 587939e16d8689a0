//! Readiness flags, reported events, and poll-set control ops.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Readiness/interest flags, value-compatible with Linux epoll masks so
    /// fuzz bytes map onto familiar bit patterns. All flags live in the low
    /// byte: a single consumed input byte can set any combination.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EventMask: u32 {
        /// Readable (`EPOLLIN`).
        const IN = 0x001;
        /// Urgent data (`EPOLLPRI`).
        const PRI = 0x002;
        /// Writable (`EPOLLOUT`).
        const OUT = 0x004;
        /// Error condition (`EPOLLERR`).
        const ERR = 0x008;
        /// Peer hangup (`EPOLLHUP`).
        const HUP = 0x010;
    }
}

impl EventMask {
    /// Flags every registered file implicitly polls for.
    ///
    /// OR-ed into the interest mask at register and modify time, on every
    /// code path; callers may rely on error/hangup always being watched.
    pub const IMPLICIT_INTEREST: EventMask = EventMask::ERR.union(EventMask::HUP);

    /// Interpret one consumed stream byte as a readiness mask, dropping bits
    /// that name no flag.
    #[inline(always)]
    pub fn from_stream_byte(b: u8) -> Self {
        EventMask::from_bits_truncate(u32::from(b))
    }
}

/// One readiness report produced by `epoll_wait`.
///
/// `mask` carries only the bits the consumed byte actually set (or the
/// synthetic `ERR|HUP` after teardown), never the full interest mask.
/// `token` is the caller's registration datum, mirroring `epoll_data`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub mask: EventMask,
    pub token: u64,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            mask: EventMask::empty(),
            token: 0,
        }
    }
}

/// Poll-set control operation, mirroring `EPOLL_CTL_ADD/MOD/DEL`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CtlOp {
    Add,
    Mod,
    Del,
}
