use std::fmt::Debug;

use tracing::{trace, warn};

use crate::error::{Mismatch, Result};

/// One observed signal, named like the DUT port it comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Probe {
    pub signal: &'static str,
    pub value: u64,
    pub bits: u32,
}

impl Probe {
    pub fn new(signal: &'static str, value: u64, bits: u32) -> Self {
        Self {
            signal,
            value,
            bits,
        }
    }
}

/// Everything a model exposes at one observation point.
pub trait Observation: PartialEq + Debug {
    fn probes(&self) -> Vec<Probe>;
}

/// The capability set shared by a DUT adapter and its golden model.
pub trait CycleModel {
    type Stimulus: Debug;
    type Observation: Observation;

    /// Apply one cycle of stimulus, including the clock edge that samples it.
    fn apply_stimulus(&mut self, stimulus: &Self::Stimulus) -> Result<()>;

    /// Outputs sampled at the most recent edge.
    fn observe(&self) -> Result<Self::Observation>;
}

/// Runs the same stimulus through a DUT and a golden model and compares
/// their observations after every cycle.
pub struct Oracle<D, G> {
    dut: D,
    golden: G,
    cycle: u64,
}

impl<D, G, S, O> Oracle<D, G>
where
    S: Debug,
    O: Observation,
    D: CycleModel<Stimulus = S, Observation = O>,
    G: CycleModel<Stimulus = S, Observation = O>,
{
    pub fn new(dut: D, golden: G) -> Self {
        Self {
            dut,
            golden,
            cycle: 0,
        }
    }

    /// Cycles stepped so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn dut(&self) -> &D {
        &self.dut
    }

    pub fn golden(&self) -> &G {
        &self.golden
    }

    pub fn step(&mut self, stimulus: &S) -> Result<O> {
        self.dut.apply_stimulus(stimulus)?;
        self.golden.apply_stimulus(stimulus)?;
        self.cycle += 1;

        let actual = self.dut.observe()?;
        let expected = self.golden.observe()?;
        trace!(cycle = self.cycle, ?stimulus, ?actual, "oracle step");
        if actual == expected {
            return Ok(actual);
        }

        let mismatch = compare(self.cycle, stimulus, &expected, &actual);
        warn!(%mismatch, "golden model and DUT disagree");
        Err(mismatch.into())
    }

    pub fn run<'s>(&mut self, stimuli: impl IntoIterator<Item = &'s S>) -> Result<()>
    where
        S: 's,
    {
        for stimulus in stimuli {
            self.step(stimulus)?;
        }
        Ok(())
    }
}

fn compare<S: Debug, O: Observation>(cycle: u64, stimulus: &S, expected: &O, actual: &O) -> Mismatch {
    let expected_probes = expected.probes();
    let actual_probes = actual.probes();
    let differing = expected_probes
        .iter()
        .zip(&actual_probes)
        .find(|(e, a)| e.value != a.value);

    match differing {
        Some((e, a)) => Mismatch {
            cycle,
            signal: e.signal.to_owned(),
            expected: e.value,
            actual: a.value,
            bits: e.bits,
            stimulus: format!("{stimulus:?}"),
        },
        None => Mismatch {
            cycle,
            signal: format!("{expected:?} vs {actual:?}"),
            expected: 0,
            actual: 0,
            bits: 1,
            stimulus: format!("{stimulus:?}"),
        },
    }
}
