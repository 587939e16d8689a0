//! Properties of `epoll_wait`: determinism, byte conservation, and exact
//! readiness masking against an independent reference model.

use proptest::prelude::*;

use fdsim_rs::{CtlOp, Event, EventMask, MockKernel};

/// Reference prediction for one wait call over a head-first member list.
///
/// Returns (reported (mask, token) pairs, bytes consumed).
fn predict_wait(
    interests_head_first: &[(EventMask, u64)],
    stream: &[u8],
    capacity: usize,
) -> (Vec<(EventMask, u64)>, usize) {
    let mut out = Vec::new();
    let mut consumed = 0usize;
    for &(interest, token) in interests_head_first {
        let Some(&b) = stream.get(consumed) else {
            break;
        };
        consumed += 1;
        let ready = EventMask::from_stream_byte(b) & (interest | EventMask::IMPLICIT_INTEREST);
        if !ready.is_empty() {
            if out.len() == capacity {
                break;
            }
            out.push((ready, token));
        }
    }
    (out, consumed)
}

/// Build a kernel with `masks.len()` sockets registered in order, so the
/// poll-set visits them in reverse registration order (head insertion).
fn build(stream: &[u8], masks: &[EventMask]) -> (MockKernel, fdsim_rs::Fd) {
    let mut k = MockKernel::new(stream);
    let ep = k.epoll_create().unwrap();
    for (i, &mask) in masks.iter().enumerate() {
        let s = k.socket(2, 1, 0).unwrap();
        k.epoll_ctl(ep, CtlOp::Add, s, mask, i as u64).unwrap();
    }
    (k, ep)
}

fn interest_strategy() -> impl Strategy<Value = EventMask> {
    any::<u8>().prop_map(EventMask::from_stream_byte)
}

proptest! {
    #[test]
    fn wait_matches_reference_model(
        stream in proptest::collection::vec(any::<u8>(), 0..32),
        masks in proptest::collection::vec(interest_strategy(), 1..8),
        capacity in 1usize..10,
    ) {
        prop_assume!(!stream.is_empty());
        let (mut k, ep) = build(&stream, &masks);

        // Head-first order is reverse registration order.
        let head_first: Vec<(EventMask, u64)> = masks
            .iter()
            .enumerate()
            .rev()
            .map(|(i, &m)| (m, i as u64))
            .collect();
        let (expected, expected_consumed) = predict_wait(&head_first, &stream, capacity);

        let mut events = vec![Event::default(); capacity];
        let n = k.epoll_wait(ep, &mut events).unwrap();

        // Exact masking: each reported mask is byte & interest, never the
        // full interest mask; byte conservation: one byte per visited
        // member, no more.
        let got: Vec<(EventMask, u64)> = events[..n].iter().map(|e| (e.mask, e.token)).collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(k.consumed_input(), expected_consumed);
    }

    #[test]
    fn wait_is_deterministic(
        stream in proptest::collection::vec(any::<u8>(), 0..48),
        masks in proptest::collection::vec(interest_strategy(), 1..6),
        capacity in 1usize..8,
        calls in 1usize..5,
    ) {
        let run = || {
            let (mut k, ep) = build(&stream, &masks);
            let mut log = Vec::new();
            for _ in 0..calls {
                let mut events = vec![Event::default(); capacity];
                let n = k.epoll_wait(ep, &mut events).unwrap();
                log.push((events[..n].to_vec(), k.consumed_input()));
            }
            (log, k.trace_events())
        };
        prop_assert_eq!(run(), run());
    }

    #[test]
    fn teardown_fires_exactly_once_on_first_exhausted_wait(
        stream in proptest::collection::vec(any::<u8>(), 0..16),
        masks in proptest::collection::vec(interest_strategy(), 1..4),
        calls in 1usize..8,
    ) {
        use std::cell::Cell;
        use std::rc::Rc;

        let fired = Rc::new(Cell::new(0u32));
        let observer = fired.clone();

        let (mut k, ep) = build(&stream, &masks);
        k.set_teardown_hook(Box::new(move |_| observer.set(observer.get() + 1)));

        let mut saw_exhausted_entry = false;
        for _ in 0..calls {
            let entered_empty = k.remaining_input() == 0;
            let mut events = vec![Event::default(); 8];
            k.epoll_wait(ep, &mut events).unwrap();
            if entered_empty && !saw_exhausted_entry {
                saw_exhausted_entry = true;
                // The hook fires on the first exhausted wait, not before.
                prop_assert_eq!(fired.get(), 1);
            }
        }
        prop_assert_eq!(fired.get(), u32::from(saw_exhausted_entry));
        prop_assert_eq!(k.teardown_fired(), saw_exhausted_entry);
    }
}
