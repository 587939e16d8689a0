//! Deterministic echo-style event loop driven by the mock kernel.
//!
//! This is the code-under-test stand-in: a listen socket plus an eventfd
//! wakeup registered on one epoll instance, accepting connections, echoing
//! what it reads, and closing connections on error/hangup. The teardown hook
//! closes the listen socket; remaining connections drain through the
//! synthetic error events the kernel emits once the stream is exhausted.
//!
//! Correctness contract: for every input, the loop terminates within the
//! wait budget and closes every handle it created.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::SysError;
use crate::events::{CtlOp, Event, EventMask};
use crate::handles::Fd;
use crate::kernel::{AddrInfoHints, MockKernel, SockAddr, SOCK_STREAM};

/// Output buffer size handed to `epoll_wait`. Larger than the handle table,
/// so a single synthetic-error pass can always drain every connection.
const WAIT_CAPACITY: usize = 1024;

/// Per-read scratch size.
const READ_BUF: usize = 256;

const F_SETFL: i32 = 4;
const O_NONBLOCK: i32 = 0x800;

/// Counters the oracles and tests assert on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub wait_calls: u64,
    pub accepted: u32,
    pub reads: u64,
    pub bytes_read: u64,
    pub sends: u64,
    pub bytes_sent: u64,
    pub closed: u32,
}

/// One finished loop execution, kernel included for oracle inspection.
pub struct EchoRun {
    pub stats: LoopStats,
    pub error: Option<SysError>,
    pub hang: bool,
    pub kernel: MockKernel,
}

/// Run the echo loop over `input` with a hard bound on wait calls.
pub fn run(input: &[u8], max_wait_calls: u64) -> EchoRun {
    let listen_slot: Rc<RefCell<Option<Fd>>> = Rc::default();
    let mut kernel = MockKernel::new(input);
    {
        // Teardown: stop listening. Live connections are drained afterwards
        // by the synthetic error events.
        let slot = listen_slot.clone();
        kernel.set_teardown_hook(Box::new(move |k| {
            if let Some(fd) = slot.borrow_mut().take() {
                let _ = k.close(fd);
            }
        }));
    }

    let mut stats = LoopStats::default();
    let mut hang = false;
    let error = drive(&mut kernel, &listen_slot, &mut stats, max_wait_calls, &mut hang).err();
    EchoRun {
        stats,
        error,
        hang,
        kernel,
    }
}

fn drive(
    kernel: &mut MockKernel,
    listen_slot: &Rc<RefCell<Option<Fd>>>,
    stats: &mut LoopStats,
    max_wait_calls: u64,
    hang: &mut bool,
) -> Result<(), SysError> {
    let epfd = kernel.epoll_create()?;

    let wakeup = kernel.eventfd(0, 0)?;
    kernel.epoll_ctl(epfd, CtlOp::Add, wakeup, EventMask::IN, token(wakeup))?;

    let hints = AddrInfoHints {
        flags: 0,
        socktype: SOCK_STREAM,
        protocol: 0,
    };
    let ai = *kernel.getaddrinfo(Some("localhost"), Some("3001"), Some(&hints));
    let listener = kernel.socket(i32::from(ai.family), ai.socktype, ai.protocol)?;
    kernel.setsockopt(listener, 1, 2, 1)?;
    kernel.bind(listener, &ai.addr)?;
    kernel.listen(listener, 512)?;
    kernel.fcntl(listener, F_SETFL, O_NONBLOCK)?;
    kernel.freeaddrinfo();
    kernel.epoll_ctl(epfd, CtlOp::Add, listener, EventMask::IN, token(listener))?;
    *listen_slot.borrow_mut() = Some(listener);

    let mut conns: Vec<Fd> = Vec::new();
    let mut events = vec![Event::default(); WAIT_CAPACITY];

    loop {
        if kernel.teardown_fired() && conns.is_empty() {
            break;
        }
        if stats.wait_calls >= max_wait_calls {
            *hang = true;
            break;
        }

        let n = kernel.epoll_wait(epfd, &mut events)?;
        stats.wait_calls += 1;

        for idx in 0..n {
            let ev = events[idx];
            let listener_token = (*listen_slot.borrow()).map(token);

            if Some(ev.token) == listener_token {
                accept_all(kernel, epfd, listener, &mut conns, stats)?;
            } else if ev.token == token(wakeup) {
                let mut counter = [0u8; 8];
                kernel.read(wakeup, &mut counter)?;
            } else {
                let conn = Fd::from_u32(ev.token as u32);
                handle_conn(kernel, conn, ev.mask, &mut conns, stats)?;
            }
        }
    }

    kernel.close(wakeup)?;
    kernel.close(epfd)?;
    Ok(())
}

fn accept_all(
    kernel: &mut MockKernel,
    epfd: Fd,
    listener: Fd,
    conns: &mut Vec<Fd>,
    stats: &mut LoopStats,
) -> Result<(), SysError> {
    let mut peer = SockAddr::default();
    loop {
        match kernel.accept(listener, Some(&mut peer)) {
            Ok(conn) => {
                kernel.epoll_ctl(epfd, CtlOp::Add, conn, EventMask::IN, token(conn))?;
                conns.push(conn);
                stats.accepted += 1;
            }
            Err(SysError::WouldBlock) => return Ok(()),
            // Out of handles: stop accepting this round, keep serving.
            Err(SysError::TooManyFiles) => return Ok(()),
            Err(e) => return Err(e),
        }
    }
}

fn handle_conn(
    kernel: &mut MockKernel,
    conn: Fd,
    mask: EventMask,
    conns: &mut Vec<Fd>,
    stats: &mut LoopStats,
) -> Result<(), SysError> {
    if mask.intersects(EventMask::IMPLICIT_INTEREST) {
        kernel.close(conn)?;
        conns.retain(|c| *c != conn);
        stats.closed += 1;
        return Ok(());
    }
    if mask.contains(EventMask::IN) {
        let mut buf = [0u8; READ_BUF];
        match kernel.read(conn, &mut buf) {
            Ok(0) => {
                // Nothing available right now; keep the connection.
                stats.reads += 1;
            }
            Ok(got) => {
                stats.reads += 1;
                stats.bytes_read += got as u64;
                match kernel.send(conn, &buf[..got]) {
                    Ok(sent) => {
                        stats.sends += 1;
                        stats.bytes_sent += sent as u64;
                    }
                    Err(SysError::WouldBlock) => {}
                    Err(e) => return Err(e),
                }
            }
            Err(SysError::WouldBlock) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[inline(always)]
fn token(fd: Fd) -> u64 {
    u64::from(fd.raw())
}
