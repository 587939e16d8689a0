//! Property-based tests for the mock kernel.
//!
//! Run with: `cargo test --test property`

mod loop_props;
mod table_props;
mod wait_props;
