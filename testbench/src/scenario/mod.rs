//! Verification scenarios, one function per check.
//!
//! Every scenario builds its own harness, runs the reset pulse and returns
//! the first failure.

pub mod baud;
pub mod insnmem;
pub mod regfile;
pub mod uart;

use camino::Utf8PathBuf;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use simulator::{ClockConfig, Harness, Model, ResetConfig};
use tracing::info;

use crate::config::{HarnessConfig, SuiteConfig};
use crate::error::{HarnessError, Result};

/// Edges any single wait may take unless the environment caps it.
pub const DEFAULT_MAX_EDGES: u64 = 1_000_000;

/// Settings shared by all scenarios of a run.
#[derive(Clone, Debug)]
pub struct Bench {
    pub clock: ClockConfig,
    pub reset: ResetConfig,
    pub seed: u64,
    pub max_edges: u64,
    pub vcd_dir: Option<Utf8PathBuf>,
}

impl Default for Bench {
    fn default() -> Self {
        Self {
            clock: ClockConfig::default(),
            reset: ResetConfig::default(),
            seed: crate::config::DEFAULT_SEED,
            max_edges: DEFAULT_MAX_EDGES,
            vcd_dir: None,
        }
    }
}

impl Bench {
    pub fn new(config: &HarnessConfig, suite: &SuiteConfig) -> Result<Self> {
        Ok(Self {
            clock: suite.clock_config()?,
            reset: suite.reset_config()?,
            seed: config.seed,
            max_edges: config.max_cycles.unwrap_or(DEFAULT_MAX_EDGES),
            vcd_dir: config.vcd_dir(),
        })
    }

    pub fn clk_freq_hz(&self) -> u64 {
        self.clock.freq_hz()
    }

    /// Build a harness around `model` and bring it out of reset.
    pub fn harness(&self, model: Box<dyn Model>, trace_name: &str) -> Result<Harness> {
        self.harness_with(model, trace_name, |_| Ok(()))
    }

    /// Like [`harness`](Self::harness), running `init` on the inputs before the
    /// reset pulse.
    pub fn harness_with(
        &self,
        model: Box<dyn Model>,
        trace_name: &str,
        init: impl FnOnce(&mut Harness) -> Result<()>,
    ) -> Result<Harness> {
        let mut harness = Harness::new(model, self.clock, self.reset)?;
        if let Some(dir) = &self.vcd_dir {
            std::fs::create_dir_all(dir)
                .map_err(|e| HarnessError::io(format!("Failed to create {dir}"), e))?;
            harness.open_vcd(dir.join(format!("{trace_name}.vcd")).as_std_path())?;
        }
        init(&mut harness)?;
        harness.reset()?;
        info!(trace_name, cycle = harness.cycle(), "harness ready");
        Ok(harness)
    }

    /// Stimulus generator for one scenario; `salt` keeps scenarios independent.
    pub fn rng(&self, salt: u64) -> Xoshiro256StarStar {
        Xoshiro256StarStar::seed_from_u64(self.seed ^ salt.rotate_left(32))
    }
}

/// Fail with a mismatch unless `actual == expected`.
pub(crate) fn check(
    harness: &Harness,
    signal: &str,
    expected: u64,
    actual: u64,
    stimulus: impl FnOnce() -> String,
) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    let bits = harness
        .model()
        .bus()
        .id(signal)
        .map(|id| harness.model().bus().signal(id).num_bits)
        .unwrap_or(32);
    Err(crate::error::Mismatch {
        cycle: harness.cycle(),
        signal: signal.to_owned(),
        expected,
        actual,
        bits,
        stimulus: stimulus(),
    }
    .into())
}
