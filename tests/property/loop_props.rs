//! Whole-loop properties: every input terminates, tears down, and leaks
//! nothing; iteration outcomes replay identically.

use proptest::prelude::*;

use fdsim_rs::harness::{run_iteration, RunOutcome};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn every_input_passes_all_oracles(
        input in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let outcome = run_iteration(&input);
        match outcome {
            RunOutcome::Ok(_) => {}
            RunOutcome::Failed(report) => {
                prop_assert!(false, "oracle failure {:?}: {}", report.kind, report.message);
            }
        }
    }

    #[test]
    fn iteration_outcomes_are_reproducible(
        input in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let first = run_iteration(&input);
        let second = run_iteration(&input);
        match (first, second) {
            (RunOutcome::Ok(a), RunOutcome::Ok(b)) => prop_assert_eq!(a, b),
            (RunOutcome::Failed(a), RunOutcome::Failed(b)) => {
                prop_assert_eq!(a.kind, b.kind);
                prop_assert_eq!(a.wait_calls, b.wait_calls);
            }
            other => prop_assert!(false, "outcomes diverged: {:?}", other),
        }
    }
}
