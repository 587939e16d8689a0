#![no_main]

use fdsim_rs::harness::{build_artifact, run_iteration, RunOutcome};
use libfuzzer_sys::fuzz_target;

// Whole-system target: the echo loop must terminate, observe teardown, and
// leave zero live handles for every possible input.
fuzz_target!(|data: &[u8]| {
    match run_iteration(data) {
        RunOutcome::Ok(_) => {}
        RunOutcome::Failed(report) => {
            let artifact = build_artifact(data, report.clone(), Vec::new());
            let json = artifact
                .to_json()
                .unwrap_or_else(|_| report.message.clone());
            panic!("event loop oracle failure: {json}");
        }
    }
});
