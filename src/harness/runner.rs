//! Per-iteration fuzz driver and repro artifacts.
//!
//! `run_iteration` executes the echo loop over one input and checks the
//! oracles the original driver cares about: the loop must not error, must
//! finish inside the wait budget, must observe teardown, and must leave zero
//! live handles. Failures are packaged as self-contained serde artifacts
//! with the input hex-encoded so they survive JSON round-trips.

use serde::{Deserialize, Serialize};

use crate::harness::echo_loop::{self, LoopStats};
use crate::trace::TraceEvent;

/// Artifact schema version for forward-compatible evolution.
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// Upper bound on wait calls for an input of `len` bytes.
///
/// Every pre-teardown wait consumes at least one byte (the poll-set is never
/// empty while the loop runs), so `len` waits exhaust the stream; the
/// remainder covers the teardown wait and the drain pass.
#[inline(always)]
pub fn wait_budget(len: usize) -> u64 {
    len as u64 + 8
}

/// Result of one fuzz iteration.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    Ok(LoopStats),
    Failed(FailureReport),
}

impl RunOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

/// Failure details for one iteration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FailureReport {
    pub kind: FailureKind,
    pub message: String,
    pub wait_calls: u64,
}

/// Oracle classification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The loop returned a hard error from an emulated call.
    LoopError { code: u16 },
    /// The wait budget was exceeded.
    Hang,
    /// The loop exited without the stream ever exhausting.
    TeardownMissed,
    /// Live handles remained after the iteration.
    LeakedHandles { count: u32 },
}

/// Self-contained reproduction artifact for a failed iteration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReproArtifact {
    pub schema_version: u32,
    /// The iteration's input, lowercase hex.
    pub input_hex: String,
    pub failure: FailureReport,
    /// Ring snapshot of the kernel's recorded calls.
    pub trace: Vec<TraceEvent>,
}

impl ReproArtifact {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Run one fuzz iteration over `input` and check every oracle.
pub fn run_iteration(input: &[u8]) -> RunOutcome {
    let run = echo_loop::run(input, wait_budget(input.len()));
    let leaked = run.kernel.live_handles();

    let failure = if let Some(err) = run.error {
        Some((
            FailureKind::LoopError { code: err.code() },
            format!("event loop failed: {err}"),
        ))
    } else if run.hang {
        Some((
            FailureKind::Hang,
            format!("wait budget {} exceeded", wait_budget(input.len())),
        ))
    } else if !run.kernel.teardown_fired() {
        Some((
            FailureKind::TeardownMissed,
            "loop exited before the stream exhausted".to_string(),
        ))
    } else if leaked != 0 {
        Some((
            FailureKind::LeakedHandles { count: leaked },
            format!("{leaked} live handles after iteration"),
        ))
    } else {
        None
    };

    match failure {
        None => RunOutcome::Ok(run.stats),
        Some((kind, message)) => RunOutcome::Failed(FailureReport {
            kind,
            message,
            wait_calls: run.stats.wait_calls,
        }),
    }
}

/// Build an artifact for a failed iteration.
pub fn build_artifact(input: &[u8], failure: FailureReport, trace: Vec<TraceEvent>) -> ReproArtifact {
    ReproArtifact {
        schema_version: ARTIFACT_SCHEMA_VERSION,
        input_hex: encode_input_hex(input),
        failure,
        trace,
    }
}

/// Re-run the iteration an artifact captured.
pub fn replay_artifact(artifact: &ReproArtifact) -> Result<RunOutcome, String> {
    let input = decode_input_hex(&artifact.input_hex)?;
    Ok(run_iteration(&input))
}

pub fn encode_input_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(hex_char(b >> 4));
        out.push(hex_char(b & 0x0f));
    }
    out
}

pub fn decode_input_hex(s: &str) -> Result<Vec<u8>, String> {
    let bytes = s.as_bytes();
    if bytes.len() % 2 != 0 {
        return Err("odd-length hex input".to_string());
    }
    let mut out = Vec::with_capacity(bytes.len() / 2);
    let mut idx = 0;
    while idx < bytes.len() {
        let hi = hex_val(bytes[idx])?;
        let lo = hex_val(bytes[idx + 1])?;
        out.push((hi << 4) | lo);
        idx += 2;
    }
    Ok(out)
}

fn hex_char(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        _ => (b'a' + (nibble - 10)) as char,
    }
}

fn hex_val(byte: u8) -> Result<u8, String> {
    match byte {
        b'0'..=b'9' => Ok(byte - b'0'),
        b'a'..=b'f' => Ok(byte - b'a' + 10),
        b'A'..=b'F' => Ok(byte - b'A' + 10),
        _ => Err(format!("invalid hex byte 0x{byte:02x}")),
    }
}
