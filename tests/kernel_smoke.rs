//! End-to-end smoke tests for the mock kernel's emulated-call surface.
//!
//! These walk the canonical scenarios a driver relies on: wait plus
//! teardown on a single socket, accept-then-read byte flow, and handle-table
//! exhaustion.

use std::cell::Cell;
use std::rc::Rc;

use fdsim_rs::{CtlOp, Event, EventMask, Fd, MockKernel, SysError, MAX_HANDLES};

fn wait(k: &mut MockKernel, epfd: Fd, cap: usize) -> Vec<Event> {
    let mut buf = vec![Event::default(); cap];
    let n = k.epoll_wait(epfd, &mut buf).unwrap();
    buf.truncate(n);
    buf
}

#[test]
fn single_socket_wait_then_teardown() {
    // One registered socket with read interest, stream [0x01]: the first
    // wait reports it ready and empties the stream; the second fires the
    // teardown hook and synthesizes an error event for the still-registered
    // socket.
    let fired = Rc::new(Cell::new(0u32));
    let observer = fired.clone();

    let mut k = MockKernel::new([0x01u8]);
    k.set_teardown_hook(Box::new(move |_| observer.set(observer.get() + 1)));

    let ep = k.epoll_create().unwrap();
    let s = k.socket(2, 1, 0).unwrap();
    k.epoll_ctl(ep, CtlOp::Add, s, EventMask::IN, 5).unwrap();

    let evs = wait(&mut k, ep, 8);
    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].mask, EventMask::IN);
    assert_eq!(evs[0].token, 5);
    assert_eq!(k.remaining_input(), 0);
    assert_eq!(fired.get(), 0);

    let evs = wait(&mut k, ep, 8);
    assert_eq!(fired.get(), 1);
    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].mask, EventMask::ERR | EventMask::HUP);

    k.close(s).unwrap();
    k.close(ep).unwrap();
    assert_eq!(k.live_handles(), 0);
}

#[test]
fn accept_then_read_byte_flow() {
    // Stream [0x00, 0x05]: accept consumes 0x00 and creates a connection;
    // the read consumes 0x05 as the advertised length and returns however
    // many bytes remain (none here).
    let mut k = MockKernel::new([0x00u8, 0x05]);
    let listener = k.socket(2, 1, 0).unwrap();

    let conn = k.accept(listener, None).unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(k.read(conn, &mut buf), Ok(0));
    assert_eq!(k.remaining_input(), 0);

    k.close(conn).unwrap();
    k.close(listener).unwrap();
    assert_eq!(k.live_handles(), 0);
}

#[test]
fn creation_fails_cleanly_at_capacity() {
    let mut k = MockKernel::new([]);
    let mut fds = Vec::new();
    for _ in 0..MAX_HANDLES {
        fds.push(k.socket(2, 1, 0).unwrap());
    }
    assert_eq!(k.live_handles(), MAX_HANDLES as u32);

    assert_eq!(k.socket(2, 1, 0), Err(SysError::TooManyFiles));
    assert_eq!(k.eventfd(0, 0), Err(SysError::TooManyFiles));
    assert_eq!(k.timerfd_create(0, 0), Err(SysError::TooManyFiles));
    assert_eq!(k.epoll_create(), Err(SysError::TooManyFiles));
    assert_eq!(k.live_handles(), MAX_HANDLES as u32);

    for fd in fds {
        k.close(fd).unwrap();
    }
    assert_eq!(k.live_handles(), 0);
}

#[test]
fn ctl_surface_matches_poll_semantics() {
    let mut k = MockKernel::new([0x01u8; 4]);
    let ep = k.epoll_create().unwrap();
    let a = k.socket(2, 1, 0).unwrap();
    let b = k.socket(2, 1, 0).unwrap();

    k.epoll_ctl(ep, CtlOp::Add, a, EventMask::IN, 1).unwrap();
    k.epoll_ctl(ep, CtlOp::Add, b, EventMask::IN, 2).unwrap();
    assert_eq!(
        k.epoll_ctl(ep, CtlOp::Add, a, EventMask::OUT, 1),
        Err(SysError::AlreadyRegistered)
    );

    // Mod does not reposition: b is still visited first.
    k.epoll_ctl(ep, CtlOp::Mod, a, EventMask::OUT, 1).unwrap();
    let evs = wait(&mut k, ep, 8);
    assert_eq!(evs.len(), 1);
    assert_eq!(evs[0].token, 2);

    k.epoll_ctl(ep, CtlOp::Del, b, EventMask::empty(), 0).unwrap();
    assert_eq!(
        k.epoll_ctl(ep, CtlOp::Del, b, EventMask::empty(), 0),
        Err(SysError::NotRegistered)
    );

    // Only a remains; 0x01 carries no OUT bit so nothing is reported, but
    // exactly one byte is charged.
    let before = k.remaining_input();
    let evs = wait(&mut k, ep, 8);
    assert!(evs.is_empty());
    assert_eq!(before - k.remaining_input(), 1);

    k.close(a).unwrap();
    k.close(b).unwrap();
    k.close(ep).unwrap();
    assert_eq!(k.live_handles(), 0);
}

#[test]
fn run_results_are_deterministic() {
    // Two independent kernels over the same input, driven through the same
    // call sequence, must produce identical results and traces.
    let input = [0x13u8, 0x01, 0x00, 0x02, 0xAB, 0xCD, 0x80, 0xFF];

    let drive = |input: &[u8]| {
        let mut k = MockKernel::new(input);
        let ep = k.epoll_create().unwrap();
        let s = k.socket(2, 1, 0).unwrap();
        k.epoll_ctl(ep, CtlOp::Add, s, EventMask::IN | EventMask::OUT, 3)
            .unwrap();

        let mut results: Vec<String> = Vec::new();
        results.push(format!("{:?}", wait(&mut k, ep, 4)));
        let mut buf = [0u8; 4];
        results.push(format!("{:?}", k.read(s, &mut buf)));
        results.push(format!("{:?}", buf));
        results.push(format!("{:?}", k.send(s, &[0u8; 10])));
        results.push(format!("{:?}", k.accept(s, None)));
        k.close(s).unwrap();
        k.close(ep).unwrap();
        results.push(format!("{:?}", k.trace_events()));
        results
    };

    assert_eq!(drive(&input), drive(&input));
}
