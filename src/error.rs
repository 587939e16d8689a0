//! Error taxonomy for the emulated-call surface.

use std::fmt;

/// Failures surfaced by emulated calls.
///
/// `WouldBlock` is a transient no-data/no-capacity condition, signalled
/// distinctly from hard failures so event loops can tell "try later" from
/// "connection gone". Every other variant maps onto the errno a real kernel
/// would report; none are retried internally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysError {
    /// Handle table is at capacity (`EMFILE`).
    TooManyFiles,
    /// Handle is out of range, unbound, or of an unusable kind (`EBADF`).
    BadHandle,
    /// Operation requires a multiplexer handle (`EINVAL`).
    NotAnEpoll,
    /// Operation requires a socket handle (`ENOTSOCK`).
    NotASocket,
    /// File is already a member of a poll-set (`EEXIST`).
    AlreadyRegistered,
    /// File is not a member of the named poll-set (`ENOENT`).
    NotRegistered,
    /// No data or capacity right now; retry later (`EWOULDBLOCK`).
    WouldBlock,
    /// Malformed argument, e.g. an undersized fixed-width read buffer
    /// (`EINVAL`).
    InvalidArgument,
}

impl SysError {
    /// Stable numeric code used in trace events and failure reports.
    pub fn code(self) -> u16 {
        match self {
            Self::TooManyFiles => 1,
            Self::BadHandle => 2,
            Self::NotAnEpoll => 3,
            Self::NotASocket => 4,
            Self::AlreadyRegistered => 5,
            Self::NotRegistered => 6,
            Self::WouldBlock => 7,
            Self::InvalidArgument => 8,
        }
    }

    #[inline(always)]
    pub fn is_would_block(self) -> bool {
        self == Self::WouldBlock
    }
}

impl fmt::Display for SysError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyFiles => write!(f, "handle table exhausted"),
            Self::BadHandle => write!(f, "invalid handle"),
            Self::NotAnEpoll => write!(f, "handle is not a multiplexer"),
            Self::NotASocket => write!(f, "handle is not a socket"),
            Self::AlreadyRegistered => write!(f, "file already in a poll-set"),
            Self::NotRegistered => write!(f, "file not in this poll-set"),
            Self::WouldBlock => write!(f, "operation would block"),
            Self::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

impl std::error::Error for SysError {}
