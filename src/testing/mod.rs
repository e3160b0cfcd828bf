//! Concurrency proof harnesses.
//!
//! These drive the coordination layer from many threads at once and report
//! observed violations instead of panicking, so the integration suite can
//! assert on a full run.

pub mod contention;

pub use contention::{
    run_handle_independence_proof, run_share_contention_proof, ContentionProofConfig,
    ContentionProofResult,
};
