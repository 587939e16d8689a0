//! The mock kernel: per-iteration context and emulated-call surface.
//!
//! One `MockKernel` is built per fuzz iteration from the input bytes and an
//! injected teardown hook. Every call is synchronous and single-threaded;
//! "would block" is the return value `SysError::WouldBlock`, never an actual
//! block, and every call terminates for every possible input.
//!
//! Invariants:
//! - Only `epoll_wait`, `read`/`recv`, `send`/`sendto`, and `accept` consume
//!   stream bytes; creation, ctl, and close never do.
//! - The teardown hook fires at most once per kernel lifetime, on the first
//!   `epoll_wait` that observes an exhausted stream.
//! - `close` unlinks the file from any poll-set before releasing the handle,
//!   so a released slot is never reachable from a list.

use crate::error::SysError;
use crate::events::{CtlOp, Event, EventMask};
use crate::file::{File, FileKind};
use crate::handles::{Fd, HandleTable};
use crate::pollset;
use crate::stream::ByteCursor;
use crate::trace::{SyscallTrace, TraceEvent};

/// Address family written into placeholder peer addresses.
pub const AF_INET: u16 = 2;

/// Socket type mirrored through `getaddrinfo` hints.
pub const SOCK_STREAM: i32 = 1;

/// Fixed address length reported by `getaddrinfo` (sizeof sockaddr_in).
pub const ADDR_LEN: u32 = 16;

/// Fixed 8-byte pattern returned by timer/event reads: one expiry, value 1.
const FIXED_READ_PATTERN: [u8; 8] = 1u64.to_le_bytes();

/// Events retained in the syscall trace ring.
const TRACE_CAP: usize = 1024;

/// Placeholder socket address: family only, no real peer identity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SockAddr {
    pub family: u16,
    pub data: [u8; 14],
}

impl SockAddr {
    pub fn placeholder() -> Self {
        Self {
            family: AF_INET,
            data: [0; 14],
        }
    }
}

/// Hints accepted by `getaddrinfo`; copied through to the result record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddrInfoHints {
    pub flags: i32,
    pub socktype: i32,
    pub protocol: i32,
}

/// The single kernel-owned address-info record `getaddrinfo` fills in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AddrInfo {
    pub flags: i32,
    pub family: u16,
    pub socktype: i32,
    pub protocol: i32,
    pub addr_len: u32,
    pub addr: SockAddr,
}

/// Teardown capability injected by the driver.
///
/// Invoked from inside `epoll_wait` with the hook temporarily removed from
/// the kernel, so it may re-enter the emulated calls (close, ctl)
/// synchronously.
pub type TeardownHook = Box<dyn FnMut(&mut MockKernel)>;

/// Per-iteration mock kernel context.
pub struct MockKernel {
    cursor: ByteCursor,
    table: HandleTable,
    trace: SyscallTrace,
    teardown: Option<TeardownHook>,
    teardown_fired: bool,
    addrinfo: AddrInfo,
}

impl MockKernel {
    /// Build a fresh kernel over one iteration's input bytes.
    pub fn new(input: impl Into<Vec<u8>>) -> Self {
        Self {
            cursor: ByteCursor::new(input),
            table: HandleTable::new(),
            trace: SyscallTrace::new(TRACE_CAP),
            teardown: None,
            teardown_fired: false,
            addrinfo: AddrInfo::default(),
        }
    }

    /// Install the teardown hook. Fires at most once regardless of how many
    /// exhausted waits follow.
    pub fn set_teardown_hook(&mut self, hook: TeardownHook) {
        self.teardown = Some(hook);
    }

    // ----- observation -----

    /// Stream bytes not yet consumed.
    #[inline(always)]
    pub fn remaining_input(&self) -> usize {
        self.cursor.remaining()
    }

    /// Stream bytes consumed so far.
    #[inline(always)]
    pub fn consumed_input(&self) -> usize {
        self.cursor.consumed()
    }

    /// Live-handle count; the driver's leak oracle.
    #[inline(always)]
    pub fn live_handles(&self) -> u32 {
        self.table.live_handles()
    }

    /// Whether the teardown hook has fired.
    #[inline(always)]
    pub fn teardown_fired(&self) -> bool {
        self.teardown_fired
    }

    /// Kind of a live handle, if any. Test and harness support.
    pub fn kind_of(&self, fd: Fd) -> Option<FileKind> {
        self.table.lookup(fd).map(|f| f.kind())
    }

    /// Chronological snapshot of recorded calls.
    pub fn trace_events(&self) -> Vec<TraceEvent> {
        self.trace.events()
    }

    // ----- creation calls -----

    /// Create a multiplexer instance. Consumes no stream bytes.
    pub fn epoll_create(&mut self) -> Result<Fd, SysError> {
        self.create(File::epoll())
    }

    /// Create a socket. Arguments are accepted for signature fidelity only.
    pub fn socket(&mut self, _domain: i32, _ty: i32, _protocol: i32) -> Result<Fd, SysError> {
        self.create(File::socket())
    }

    /// Create a timer file.
    pub fn timerfd_create(&mut self, _clockid: i32, _flags: i32) -> Result<Fd, SysError> {
        self.create(File::timer())
    }

    /// Create an event file.
    pub fn eventfd(&mut self, _initval: u32, _flags: i32) -> Result<Fd, SysError> {
        self.create(File::event())
    }

    fn create(&mut self, file: File) -> Result<Fd, SysError> {
        let kind = file.kind();
        let fd = self.table.insert(file).map_err(|e| self.deny(e))?;
        self.trace.record(TraceEvent::Create { kind, fd: fd.raw() });
        Ok(fd)
    }

    // ----- poll-set control -----

    /// Add, modify, or remove a poll-set membership.
    pub fn epoll_ctl(
        &mut self,
        epfd: Fd,
        op: CtlOp,
        fd: Fd,
        mask: EventMask,
        token: u64,
    ) -> Result<(), SysError> {
        let res = match op {
            CtlOp::Add => pollset::register(&mut self.table, epfd, fd, mask, token),
            CtlOp::Mod => pollset::modify(&mut self.table, epfd, fd, mask, token),
            CtlOp::Del => pollset::unregister(&mut self.table, epfd, fd),
        };
        res.map_err(|e| self.deny(e))?;
        self.trace.record(TraceEvent::Ctl {
            op,
            epfd: epfd.raw(),
            fd: fd.raw(),
            mask: mask.bits(),
        });
        Ok(())
    }

    // ----- wait -----

    /// Poll for readiness, driven entirely by the stream.
    ///
    /// Stream non-empty: members are visited head to tail; each visited
    /// member is charged exactly one byte `b` and reports ready with mask
    /// `b & interest` when that intersection is non-empty. Iteration stops
    /// early when the stream empties or a ready member finds `events` full.
    ///
    /// Stream empty at entry: fires the teardown protocol (hook at most once
    /// per kernel), then synthesizes `ERR|HUP` events for Socket-kind
    /// members under the same capacity rule, consuming nothing.
    pub fn epoll_wait(&mut self, epfd: Fd, events: &mut [Event]) -> Result<usize, SysError> {
        if !self.cursor.is_empty() {
            let members = pollset::members(&self.table, epfd).map_err(|e| self.deny(e))?;
            let before = self.cursor.consumed();
            let mut produced = 0usize;
            for fd in members {
                let Some(b) = self.cursor.next_byte() else {
                    break;
                };
                let Some(file) = self.table.lookup(fd) else {
                    continue;
                };
                let ready = EventMask::from_stream_byte(b) & file.interest;
                if !ready.is_empty() {
                    if produced == events.len() {
                        // Full: this member was visited and charged, the
                        // rest are neither.
                        break;
                    }
                    events[produced] = Event {
                        mask: ready,
                        token: file.token,
                    };
                    produced += 1;
                }
            }
            let consumed = (self.cursor.consumed() - before) as u32;
            self.trace.record(TraceEvent::Wait {
                epfd: epfd.raw(),
                produced: produced as u32,
                consumed,
            });
            Ok(produced)
        } else {
            // Validate before firing teardown so a bad epfd stays an error.
            pollset::members(&self.table, epfd).map_err(|e| self.deny(e))?;
            self.fire_teardown();
            // Re-snapshot: the hook may have closed or unregistered files.
            let members = pollset::members(&self.table, epfd).map_err(|e| self.deny(e))?;
            let mut produced = 0usize;
            for fd in members {
                let Some(file) = self.table.lookup(fd) else {
                    continue;
                };
                if file.kind() != FileKind::Socket {
                    continue;
                }
                if produced == events.len() {
                    break;
                }
                events[produced] = Event {
                    mask: EventMask::IMPLICIT_INTEREST,
                    token: file.token,
                };
                produced += 1;
            }
            self.trace.record(TraceEvent::SyntheticErr {
                epfd: epfd.raw(),
                produced: produced as u32,
            });
            Ok(produced)
        }
    }

    fn fire_teardown(&mut self) {
        if self.teardown_fired {
            return;
        }
        self.teardown_fired = true;
        self.trace.record(TraceEvent::Teardown);
        // Take the hook out so it can re-enter the emulated calls.
        if let Some(mut hook) = self.teardown.take() {
            hook(self);
            self.teardown = Some(hook);
        }
    }

    // ----- data transfer -----

    /// Read from a handle.
    ///
    /// Sockets: one stream byte advertises the length, clamped to both the
    /// remaining stream and `buf`; zero is valid success, an exhausted
    /// stream is `WouldBlock` with nothing consumed. Timer/event files
    /// return the fixed 8-byte pattern without touching the stream.
    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize, SysError> {
        let kind = self
            .table
            .lookup(fd)
            .map(|f| f.kind())
            .ok_or(SysError::BadHandle)
            .map_err(|e| self.deny(e))?;
        match kind {
            FileKind::Socket => {
                let Some(n) = self.cursor.next_byte() else {
                    return Err(SysError::WouldBlock);
                };
                let copied = self.cursor.take(usize::from(n), buf);
                self.trace.record(TraceEvent::Read {
                    fd: fd.raw(),
                    len: copied as u32,
                });
                Ok(copied)
            }
            FileKind::Timer | FileKind::Event => {
                if buf.len() < FIXED_READ_PATTERN.len() {
                    return Err(self.deny(SysError::InvalidArgument));
                }
                buf[..FIXED_READ_PATTERN.len()].copy_from_slice(&FIXED_READ_PATTERN);
                self.trace.record(TraceEvent::Read {
                    fd: fd.raw(),
                    len: FIXED_READ_PATTERN.len() as u32,
                });
                Ok(FIXED_READ_PATTERN.len())
            }
            FileKind::Epoll => Err(self.deny(SysError::BadHandle)),
        }
    }

    /// Identical to `read`; the flags argument is ignored.
    pub fn recv(&mut self, fd: Fd, buf: &mut [u8], _flags: i32) -> Result<usize, SysError> {
        self.read(fd, buf)
    }

    /// Write to a socket.
    ///
    /// One stream byte `s` scales the request: `written = round(s/255 * len)`.
    /// Zero written and an exhausted stream both surface as `WouldBlock`.
    pub fn send(&mut self, fd: Fd, buf: &[u8]) -> Result<usize, SysError> {
        self.ensure_socket(fd)?;
        let Some(s) = self.cursor.next_byte() else {
            return Err(SysError::WouldBlock);
        };
        // Round-to-nearest; exact halves cannot occur since 255 is odd.
        let written = (usize::from(s) * buf.len() + 127) / 255;
        if written == 0 {
            return Err(SysError::WouldBlock);
        }
        self.trace.record(TraceEvent::Send {
            fd: fd.raw(),
            len: written as u32,
        });
        Ok(written)
    }

    /// Identical to `send`; the destination is ignored.
    pub fn sendto(
        &mut self,
        fd: Fd,
        buf: &[u8],
        _dest: Option<&SockAddr>,
    ) -> Result<usize, SysError> {
        self.send(fd, buf)
    }

    /// Accept one pending connection, non-blocking style.
    ///
    /// The placeholder peer address is always written when `addr` is given,
    /// independent of stream state. A consumed byte of zero produces a new
    /// socket handle; any other byte, or an exhausted stream, reports no
    /// pending connection. Callers loop until `WouldBlock`.
    pub fn accept(&mut self, listener: Fd, addr: Option<&mut SockAddr>) -> Result<Fd, SysError> {
        self.ensure_socket(listener)?;
        if let Some(out) = addr {
            *out = SockAddr::placeholder();
        }
        let Some(b) = self.cursor.next_byte() else {
            return Err(SysError::WouldBlock);
        };
        if b != 0 {
            return Err(SysError::WouldBlock);
        }
        let conn = self.table.insert(File::socket()).map_err(|e| self.deny(e))?;
        self.trace.record(TraceEvent::Accept {
            listener: listener.raw(),
            conn: conn.raw(),
        });
        Ok(conn)
    }

    // ----- close -----

    /// Close a handle of any kind.
    ///
    /// The file is unlinked from its poll-set first (and a multiplexer's
    /// members are all unlinked), so no released slot stays reachable
    /// through list indices.
    pub fn close(&mut self, fd: Fd) -> Result<(), SysError> {
        let kind = self
            .table
            .lookup(fd)
            .map(|f| f.kind())
            .ok_or(SysError::BadHandle)
            .map_err(|e| self.deny(e))?;
        if let Some(link) = self.table.lookup(fd).and_then(|f| f.link) {
            let _ = pollset::unregister(&mut self.table, link.owner, fd);
        }
        if kind == FileKind::Epoll {
            pollset::unlink_all(&mut self.table, fd)?;
        }
        self.table.release(fd)?;
        self.trace.record(TraceEvent::Close { fd: fd.raw() });
        Ok(())
    }

    // ----- call-surface stubs -----

    /// No-op; the handle must be a live timer.
    pub fn timerfd_settime(&mut self, fd: Fd, _flags: i32) -> Result<(), SysError> {
        match self.kind_of(fd) {
            Some(FileKind::Timer) => Ok(()),
            Some(_) => Err(self.deny(SysError::InvalidArgument)),
            None => Err(self.deny(SysError::BadHandle)),
        }
    }

    /// No-op; the handle must be a live socket.
    pub fn bind(&mut self, fd: Fd, _addr: &SockAddr) -> Result<(), SysError> {
        self.ensure_socket(fd)
    }

    /// No-op; the handle must be a live socket.
    pub fn listen(&mut self, fd: Fd, _backlog: i32) -> Result<(), SysError> {
        self.ensure_socket(fd)
    }

    /// No-op; the handle must be a live socket.
    pub fn setsockopt(
        &mut self,
        fd: Fd,
        _level: i32,
        _name: i32,
        _value: i32,
    ) -> Result<(), SysError> {
        self.ensure_socket(fd)
    }

    /// No-op; any live handle is accepted.
    pub fn fcntl(&mut self, fd: Fd, _cmd: i32, _arg: i32) -> Result<(), SysError> {
        if self.table.lookup(fd).is_none() {
            return Err(self.deny(SysError::BadHandle));
        }
        Ok(())
    }

    /// No-op; the handle must be a live socket.
    pub fn shutdown(&mut self, fd: Fd, _how: i32) -> Result<(), SysError> {
        self.ensure_socket(fd)
    }

    /// Fill the kernel-owned address-info record and return it.
    ///
    /// The family and address length are fixed; socket type, protocol, and
    /// flags are copied through from the hints.
    pub fn getaddrinfo(
        &mut self,
        _node: Option<&str>,
        _service: Option<&str>,
        hints: Option<&AddrInfoHints>,
    ) -> &AddrInfo {
        let hints = hints.copied().unwrap_or_default();
        self.addrinfo = AddrInfo {
            flags: hints.flags,
            family: AF_INET,
            socktype: hints.socktype,
            protocol: hints.protocol,
            addr_len: ADDR_LEN,
            addr: SockAddr::placeholder(),
        };
        &self.addrinfo
    }

    /// No-op; the record is kernel-owned.
    pub fn freeaddrinfo(&mut self) {}

    // ----- helpers -----

    fn ensure_socket(&mut self, fd: Fd) -> Result<(), SysError> {
        match self.kind_of(fd) {
            Some(FileKind::Socket) => Ok(()),
            Some(_) => Err(self.deny(SysError::NotASocket)),
            None => Err(self.deny(SysError::BadHandle)),
        }
    }

    /// Record a hard failure. `WouldBlock` is ordinary control flow and is
    /// never traced.
    fn deny(&mut self, e: SysError) -> SysError {
        if !e.is_would_block() {
            self.trace.record(TraceEvent::Denied { code: e.code() });
        }
        e
    }
}
