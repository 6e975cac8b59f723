use simulator::{BaudGenModel, Harness};
use tracing::info;

use super::{Bench, check};
use crate::config::BaudParams;
use crate::error::Result;
use crate::golden::GoldenBaudGenerator;

const TICK: &str = "tick";

fn start(bench: &Bench, params: BaudParams, scenario: &str) -> Result<(Harness, GoldenBaudGenerator)> {
    let golden = GoldenBaudGenerator::new(params)?;
    let model = BaudGenModel::new(params.clk_freq_hz, params.baud_rate)?;
    let harness = bench.harness(
        Box::new(model),
        &format!("baud_gen_{scenario}_{}", params.baud_rate),
    )?;
    Ok((harness, golden))
}

/// `tick` is high after every `M` edges, `ticks` times in a row.
pub fn tick_period(bench: &Bench, params: BaudParams, ticks: u64) -> Result<()> {
    let (mut harness, golden) = start(bench, params, "tick_period")?;
    info!(baud_rate = params.baud_rate, m = golden.divisor(), "checking tick period");
    expect_period(&mut harness, &golden, ticks)
}

fn expect_period(harness: &mut Harness, golden: &GoldenBaudGenerator, ticks: u64) -> Result<()> {
    let m = golden.divisor();
    for n in 1..=ticks {
        harness.advance(m)?;
        let actual = harness.capture(TICK)?;
        check(harness, TICK, 1, actual, || format!("{n} x {m} edges after reset"))?;
    }
    Ok(())
}

/// `tick` matches the golden cadence at every edge, not only at multiples of `M`.
pub fn tick_cadence(bench: &Bench, params: BaudParams, ticks: u64) -> Result<()> {
    let (mut harness, golden) = start(bench, params, "tick_cadence")?;
    let edges = golden.divisor() * ticks;

    for edge in 1..=edges {
        harness.advance(1)?;
        let actual = harness.capture(TICK)?;
        check(
            &harness,
            TICK,
            golden.tick_at(edge) as u64,
            actual,
            || format!("edge {edge} after reset"),
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenarios_pass_against_the_model() {
        let bench = Bench::default();
        let params = BaudParams {
            clk_freq_hz: bench.clk_freq_hz(),
            baud_rate: 115_200,
        };
        tick_period(&bench, params, 5).unwrap();
        tick_cadence(&bench, params, 3).unwrap();
    }

    #[test]
    fn generator_at_the_wrong_rate_is_caught() {
        let bench = Bench::default();
        let params = BaudParams {
            clk_freq_hz: bench.clk_freq_hz(),
            baud_rate: 115_200,
        };
        let golden = GoldenBaudGenerator::new(params).unwrap();
        let model = BaudGenModel::new(params.clk_freq_hz, 57_600).unwrap();
        let mut harness = bench.harness(Box::new(model), "baud_gen_wrong_rate").unwrap();

        let err = expect_period(&mut harness, &golden, 2).unwrap_err();
        let crate::error::HarnessError::Mismatch(mismatch) = err else {
            panic!("expected a tick mismatch, got {err}");
        };
        assert_eq!(mismatch.signal, TICK);
        assert_eq!(mismatch.actual, 0);
    }

    #[test]
    fn impossible_rate_is_reported() {
        let bench = Bench::default();
        let params = BaudParams {
            clk_freq_hz: 1_000,
            baud_rate: 115_200,
        };
        assert!(tick_period(&bench, params, 1).is_err());
    }
}
