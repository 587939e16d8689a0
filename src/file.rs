//! File model: one record per live mock resource.
//!
//! The handle table exclusively owns file memory; poll-set membership is a
//! structural relationship expressed through arena indices, never pointers.

use serde::{Deserialize, Serialize};

use crate::events::EventMask;
use crate::handles::Fd;

/// Kind tag, used for dispatch and tracing. Immutable after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Epoll,
    Timer,
    Event,
    Socket,
}

/// Kind-specific payload. Closed sum; no other kinds exist.
#[derive(Clone, Debug, PartialEq)]
pub enum FileBody {
    Epoll(EpollState),
    Timer,
    Event,
    Socket,
}

/// Poll-set list endpoints owned by a multiplexer file.
///
/// Each epoll instance carries its own list; the model supports several live
/// instances even though one is the common case.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpollState {
    pub head: Option<Fd>,
    pub tail: Option<Fd>,
}

/// Structural membership of a file in exactly one poll-set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PollLink {
    /// The epoll handle whose list this file sits in.
    pub owner: Fd,
    pub prev: Option<Fd>,
    pub next: Option<Fd>,
}

/// One open mock resource.
#[derive(Clone, Debug, PartialEq)]
pub struct File {
    pub body: FileBody,
    /// Interest mask; meaningful only while linked into a poll-set.
    pub interest: EventMask,
    /// Caller-supplied registration datum, reported back in events.
    pub token: u64,
    /// Present iff the file is currently a poll-set member.
    pub link: Option<PollLink>,
}

impl File {
    pub fn new(body: FileBody) -> Self {
        Self {
            body,
            interest: EventMask::empty(),
            token: 0,
            link: None,
        }
    }

    pub fn epoll() -> Self {
        Self::new(FileBody::Epoll(EpollState::default()))
    }

    pub fn timer() -> Self {
        Self::new(FileBody::Timer)
    }

    pub fn event() -> Self {
        Self::new(FileBody::Event)
    }

    pub fn socket() -> Self {
        Self::new(FileBody::Socket)
    }

    #[inline(always)]
    pub fn kind(&self) -> FileKind {
        match self.body {
            FileBody::Epoll(_) => FileKind::Epoll,
            FileBody::Timer => FileKind::Timer,
            FileBody::Event => FileKind::Event,
            FileBody::Socket => FileKind::Socket,
        }
    }

    /// Poll-set endpoints, if this is a multiplexer file.
    #[inline(always)]
    pub fn epoll_state(&self) -> Option<&EpollState> {
        match &self.body {
            FileBody::Epoll(state) => Some(state),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn epoll_state_mut(&mut self) -> Option<&mut EpollState> {
        match &mut self.body {
            FileBody::Epoll(state) => Some(state),
            _ => None,
        }
    }
}
