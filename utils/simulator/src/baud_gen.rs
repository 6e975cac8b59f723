use crate::error::{Result, SimError};
use crate::models::Model;
use crate::signal::{Signal, SignalBus, SignalId};

/// Receiver oversampling factor: ticks per bit.
pub const OVERSAMPLING: u64 = 16;

/// Clock cycles between two ticks for the given clock and baud rate.
pub fn divisor(clk_freq_hz: u64, baud_rate: u64) -> Result<u64> {
    if baud_rate == 0 {
        return Err(SimError::InvalidConfig("baud rate must be non-zero".into()));
    }
    match clk_freq_hz / (OVERSAMPLING * baud_rate) {
        0 => Err(SimError::InvalidConfig(format!(
            "clock of {clk_freq_hz} Hz is too slow for {baud_rate} baud"
        ))),
        m => Ok(m),
    }
}

/// Mod-M counter; `tick` is high while the counter holds `M - 1`.
#[derive(Clone, Debug)]
pub struct BaudCounter {
    divisor: u64,
    count: u64,
}

impl BaudCounter {
    pub fn new(divisor: u64) -> Self {
        Self { divisor, count: 0 }
    }

    pub fn divisor(&self) -> u64 {
        self.divisor
    }

    pub fn tick(&self) -> bool {
        self.count == self.divisor - 1
    }

    pub fn advance(&mut self) {
        self.count = if self.tick() { 0 } else { self.count + 1 };
    }

    pub fn clear(&mut self) {
        self.count = 0;
    }
}

const PORTS: &[Signal] = &[
    Signal::input("clock", 1),
    Signal::input("reset_n", 1),
    Signal::output("tick", 1),
];

const RESET_N: SignalId = SignalId::new(1);
const TICK: SignalId = SignalId::new(2);

pub struct BaudGenModel {
    bus: SignalBus,
    counter: BaudCounter,
}

impl BaudGenModel {
    pub fn new(clk_freq_hz: u64, baud_rate: u64) -> Result<Self> {
        Ok(Self {
            bus: SignalBus::new(PORTS),
            counter: BaudCounter::new(divisor(clk_freq_hz, baud_rate)?),
        })
    }

    pub fn divisor(&self) -> u64 {
        self.counter.divisor()
    }
}

impl Model for BaudGenModel {
    fn name(&self) -> &str {
        "baud_gen"
    }

    fn bus(&self) -> &SignalBus {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut SignalBus {
        &mut self.bus
    }

    fn eval(&mut self) {
        self.bus.set(TICK, self.counter.tick() as u64);
    }

    fn step(&mut self) {
        if self.bus.get(RESET_N) == 0 {
            self.counter.clear();
        } else {
            self.counter.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(100_000_000, 9_600, 651)]
    #[case(100_000_000, 19_200, 325)]
    #[case(100_000_000, 115_200, 54)]
    #[case(1_000_000_000, 115_200, 542)]
    fn divisor_matches_clock_and_baud(#[case] clk: u64, #[case] baud: u64, #[case] m: u64) {
        assert_eq!(divisor(clk, baud).unwrap(), m);
    }

    #[test]
    fn divisor_rejects_impossible_rates() {
        assert!(divisor(100_000_000, 0).is_err());
        assert!(divisor(1_000, 115_200).is_err());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(54)]
    fn counter_ticks_once_per_period(#[case] m: u64) {
        let mut counter = BaudCounter::new(m);
        let ticks: Vec<u64> = (1..=4 * m)
            .filter(|_| {
                counter.advance();
                counter.tick()
            })
            .collect();
        assert_eq!(ticks.len() as u64, 4);
    }
}
