use crate::config::BaudParams;
use crate::error::{HarnessError, Result};

/// Receiver samples per bit.
const SAMPLES_PER_BIT: u64 = 16;

/// Expected tick cadence of the baud-rate generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GoldenBaudGenerator {
    divisor: u64,
}

impl GoldenBaudGenerator {
    /// `M = clk_freq_hz / (16 * baud_rate)`; zero rates and clocks too slow
    /// for the requested rate are rejected.
    pub fn new(params: BaudParams) -> Result<Self> {
        let BaudParams {
            clk_freq_hz,
            baud_rate,
        } = params;
        if baud_rate == 0 {
            return Err(HarnessError::Configuration(
                "baud rate must be non-zero".to_owned(),
            ));
        }
        let divisor = baud_rate
            .checked_mul(SAMPLES_PER_BIT)
            .map_or(0, |rate| clk_freq_hz / rate);
        if divisor == 0 {
            return Err(HarnessError::Configuration(format!(
                "a {clk_freq_hz} Hz clock cannot oversample {baud_rate} baud"
            )));
        }
        Ok(Self { divisor })
    }

    /// Clock edges between two ticks.
    pub fn divisor(&self) -> u64 {
        self.divisor
    }

    /// Whether `tick` is sampled high at the given edge after reset release
    /// (edge 1 is the first).
    pub fn tick_at(&self, edge: u64) -> bool {
        edge > 0 && edge % self.divisor == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_every_divisor_edges() {
        let baud = GoldenBaudGenerator::new(BaudParams {
            clk_freq_hz: 100_000_000,
            baud_rate: 115_200,
        })
        .unwrap();
        assert_eq!(baud.divisor(), 54);
        let ticks: Vec<u64> = (0..=200).filter(|&edge| baud.tick_at(edge)).collect();
        assert_eq!(ticks, vec![54, 108, 162]);
    }

    #[test]
    fn divisor_truncates() {
        for (clk_freq_hz, baud_rate, m) in [
            (100_000_000, 9_600, 651),
            (100_000_000, 19_200, 325),
            (50_000_000, 115_200, 27),
        ] {
            let baud = GoldenBaudGenerator::new(BaudParams {
                clk_freq_hz,
                baud_rate,
            })
            .unwrap();
            assert_eq!(baud.divisor(), m);
        }
    }

    #[test]
    fn slow_clock_is_rejected() {
        let err = GoldenBaudGenerator::new(BaudParams {
            clk_freq_hz: 1_000,
            baud_rate: 115_200,
        })
        .unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
    }

    #[test]
    fn zero_baud_rate_is_rejected() {
        assert!(
            GoldenBaudGenerator::new(BaudParams {
                clk_freq_hz: 100_000_000,
                baud_rate: 0,
            })
            .is_err()
        );
    }
}
