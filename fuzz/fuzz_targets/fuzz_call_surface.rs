#![no_main]

use fdsim_rs::{CtlOp, Event, EventMask, Fd, MockKernel, SysError};
use libfuzzer_sys::fuzz_target;

// Raw-surface target: interpret the input as an opcode program against the
// emulated calls. No panic is acceptable, and closing every handle we ever
// received must bring the live count back to zero.
fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }
    // First half programs the calls, second half feeds the kernel's stream.
    let (program, stream) = data.split_at(data.len() / 2);
    let mut kernel = MockKernel::new(stream);
    kernel.set_teardown_hook(Box::new(|_| {}));

    let mut owned: Vec<Fd> = Vec::new();
    let mut ops = program.iter().copied();

    while let Some(op) = ops.next() {
        let pick = |sel: u8, owned: &[Fd]| -> Fd {
            if owned.is_empty() {
                Fd::from_u32(u32::from(sel))
            } else {
                owned[usize::from(sel) % owned.len()]
            }
        };
        let sel_a = ops.next().unwrap_or(0);
        let sel_b = ops.next().unwrap_or(0);
        let a = pick(sel_a, &owned);
        let b = pick(sel_b, &owned);

        match op % 12 {
            0 => {
                if let Ok(fd) = kernel.epoll_create() {
                    owned.push(fd);
                }
            }
            1 => {
                if let Ok(fd) = kernel.socket(2, 1, 0) {
                    owned.push(fd);
                }
            }
            2 => {
                if let Ok(fd) = kernel.timerfd_create(0, 0) {
                    owned.push(fd);
                }
            }
            3 => {
                if let Ok(fd) = kernel.eventfd(0, 0) {
                    owned.push(fd);
                }
            }
            4 => {
                let mask = EventMask::from_stream_byte(sel_b);
                let _ = kernel.epoll_ctl(a, CtlOp::Add, b, mask, u64::from(b.raw()));
            }
            5 => {
                let mask = EventMask::from_stream_byte(sel_b);
                let _ = kernel.epoll_ctl(a, CtlOp::Mod, b, mask, u64::from(b.raw()));
            }
            6 => {
                let _ = kernel.epoll_ctl(a, CtlOp::Del, b, EventMask::empty(), 0);
            }
            7 => {
                let mut events = [Event::default(); 16];
                let _ = kernel.epoll_wait(a, &mut events);
            }
            8 => {
                let mut buf = [0u8; 32];
                let _ = kernel.read(a, &mut buf);
            }
            9 => {
                let _ = kernel.send(a, &[0u8; 24]);
            }
            10 => match kernel.accept(a, None) {
                Ok(conn) => owned.push(conn),
                Err(_) => {}
            },
            11 => {
                if kernel.close(a).is_ok() {
                    owned.retain(|fd| *fd != a);
                }
            }
            _ => unreachable!(),
        }
    }

    for fd in owned {
        match kernel.close(fd) {
            Ok(()) | Err(SysError::BadHandle) => {}
            Err(e) => panic!("unexpected close failure: {e}"),
        }
    }
    assert_eq!(
        kernel.live_handles(),
        0,
        "handles leaked by the call surface"
    );
});
