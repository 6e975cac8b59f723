//! Cycle-accurate verification of the SoC building blocks.
//!
//! The `simulator` crate provides the clocked harness and the DUT models;
//! this crate adds the golden reference models, hex images, configuration and
//! the scenarios the test runners under `tests/` turn into trials.

pub mod config;
pub mod error;
pub mod golden;
pub mod hex;
pub mod oracle;
pub mod scenario;

pub use config::{BaudParams, HarnessConfig, MemoryParams, SuiteConfig, UartParams};
pub use error::{HarnessError, Mismatch, Result};
pub use hex::{HexImage, ParseMode};
pub use scenario::Bench;

/// Install a `tracing` subscriber for a test runner, filtered by `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Turn a scenario result into a libtest-mimic outcome.
pub fn to_trial_result(result: Result<()>) -> Result<(), libtest_mimic::Failed> {
    result.map_err(|e| format!("{:#}", anyhow::Error::new(e)).into())
}
