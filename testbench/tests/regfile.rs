//! Register file runner
//!
//! Exercises the two-read, one-write register file against the golden model.

use anyhow::{Context, Result};
use camino::Utf8Path;
use libtest_mimic::{Arguments, Trial};
use testbench::config::SEED_VAR;
use testbench::golden::ReadPort;
use testbench::scenario::regfile;
use testbench::{Bench, HarnessConfig, SuiteConfig, init_tracing, to_trial_result};

const TARGET_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../target/soc-tb");
const SUITE_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/suite.yaml");

fn main() -> Result<()> {
    init_tracing();
    let args = Arguments::from_args();

    let config = HarnessConfig::from_env_or(Utf8Path::new(TARGET_PATH))?;
    let suite = SuiteConfig::load(Utf8Path::new(SUITE_PATH)).context("Failed to load suite")?;
    let mut bench = Bench::new(&config, &suite)?;
    // The environment seed wins over the suite's pinned one.
    if std::env::var(SEED_VAR).is_err() {
        if let Some(seed) = suite.regfile.seed {
            bench.seed = seed;
        }
    }

    libtest_mimic::run(&args, discover_tests(&bench)).exit();
}

fn discover_tests(bench: &Bench) -> Vec<Trial> {
    let mut trials = Vec::new();

    let mut add = |name: String, scenario: fn(&Bench) -> testbench::Result<()>| {
        let bench = bench.clone();
        trials.push(Trial::test(name, move || to_trial_result(scenario(&bench))));
    };
    add("regfile::fill_and_sweep".into(), regfile::fill_and_sweep);
    add("regfile::rw_dual".into(), regfile::rw_dual);
    add("regfile::read_during_write".into(), regfile::read_during_write);
    add("regfile::write_enable".into(), regfile::write_enable);
    add("regfile::x0_hardwired".into(), regfile::x0_hardwired);
    add("regfile::reset_clears".into(), regfile::reset_clears);

    for port in ReadPort::ALL {
        let bench_rw = bench.clone();
        trials.push(Trial::test(format!("regfile::rw_single::{port}"), move || {
            to_trial_result(regfile::rw_single(&bench_rw, port))
        }));
        let bench_bv = bench.clone();
        trials.push(Trial::test(
            format!("regfile::boundary_values::{port}"),
            move || to_trial_result(regfile::boundary_values(&bench_bv, port)),
        ));
    }

    trials
}
