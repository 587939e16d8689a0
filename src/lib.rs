//! Deterministic in-process mock of a kernel's I/O-multiplexing and socket
//! surface (epoll, timerfd, eventfd, sockets) for fuzzing event loops.
//!
//! ## Scope
//! Event-loop libraries are hard to fuzz against a real kernel: scheduling,
//! timers, and network peers are nondeterministic. This crate replaces the
//! kernel with a mock whose every decision (which file is ready, how many
//! bytes a read returns, whether a connection arrives) is derived from a
//! single consumable byte stream, so each iteration replays exactly from its
//! input bytes.
//!
//! ## Key invariants
//! - A fixed input yields byte-identical call results across runs.
//! - Every call terminates; "would block" is a return value, never a block.
//! - Bytes are consumed destructively: one per poll-set member visited by a
//!   wait, one per socket read/send/accept decision, none anywhere else.
//! - When the stream empties inside a wait, the teardown hook fires exactly
//!   once and remaining registered sockets report synthetic error/hangup, so
//!   well-behaved loops drain and exit with zero live handles.
//!
//! ## Flow (one fuzz iteration)
//! `input bytes -> MockKernel::new -> test body issues emulated calls ->
//! stream exhausts inside epoll_wait -> teardown hook -> synthetic errors ->
//! loop drains -> driver asserts live_handles() == 0`
//!
//! ## Notable entry points
//! - [`kernel::MockKernel`]: the per-iteration context and call surface.
//! - [`handles::HandleTable`] / [`pollset`]: arena and poll-set engine.
//! - `harness::run_iteration` (feature `sim-harness`): whole-loop fuzz
//!   driver with leak/hang oracles and repro artifacts.

pub mod error;
pub mod events;
pub mod file;
pub mod handles;
pub mod kernel;
pub mod pollset;
pub mod stream;
pub mod trace;

#[cfg(any(test, feature = "sim-harness"))]
pub mod harness;

pub use error::SysError;
pub use events::{CtlOp, Event, EventMask};
pub use handles::{Fd, MAX_HANDLES};
pub use kernel::{AddrInfo, AddrInfoHints, MockKernel, SockAddr, TeardownHook};
pub use stream::ByteCursor;
