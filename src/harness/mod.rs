//! Fuzz-iteration harness: an in-crate event loop over the mock kernel plus
//! the per-iteration driver with leak, hang, and teardown oracles.
//!
//! The echo loop stands where an external event-loop library would: it only
//! talks to the mock through the emulated-call surface and must leave zero
//! live handles on every path. The runner wraps one loop execution, checks
//! the oracles, and packages failures into serde repro artifacts.
//!
//! Only available with the `sim-harness` feature (on by default) or under
//! `cfg(test)`.

pub mod echo_loop;
pub mod runner;

pub use echo_loop::{EchoRun, LoopStats};
pub use runner::{
    build_artifact, decode_input_hex, encode_input_hex, replay_artifact, run_iteration,
    wait_budget, FailureKind, FailureReport, ReproArtifact, RunOutcome,
    ARTIFACT_SCHEMA_VERSION,
};
