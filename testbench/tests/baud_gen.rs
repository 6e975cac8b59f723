//! Baud generator runner

use anyhow::{Context, Result};
use camino::Utf8Path;
use libtest_mimic::{Arguments, Trial};
use testbench::scenario::baud;
use testbench::{BaudParams, Bench, HarnessConfig, SuiteConfig, init_tracing, to_trial_result};

const TARGET_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../target/soc-tb");
const SUITE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/suite.yaml");

fn main() -> Result<()> {
    init_tracing();
    let args = Arguments::from_args();

    let config = HarnessConfig::from_env_or(Utf8Path::new(TARGET_PATH))?;
    let suite = SuiteConfig::load(Utf8Path::new(SUITE_PATH)).context("Failed to load suite")?;
    let bench = Bench::new(&config, &suite)?;

    let tests = discover_tests(&bench, &suite)?;
    libtest_mimic::run(&args, tests).exit();
}

fn discover_tests(bench: &Bench, suite: &SuiteConfig) -> Result<Vec<Trial>> {
    let clk_freq_hz = suite.clk_freq_hz()?;
    let ticks = suite.baud_gen.ticks;

    let mut trials = Vec::new();
    for &baud_rate in &suite.baud_gen.baud_rates {
        let params = BaudParams {
            clk_freq_hz,
            baud_rate,
        };

        let period_bench = bench.clone();
        trials.push(Trial::test(format!("baud_gen::{baud_rate}::tick_period"), move || {
            to_trial_result(baud::tick_period(&period_bench, params, ticks))
        }));
        let cadence_bench = bench.clone();
        trials.push(Trial::test(format!("baud_gen::{baud_rate}::tick_cadence"), move || {
            to_trial_result(baud::tick_cadence(&cadence_bench, params, ticks))
        }));
    }

    Ok(trials)
}
