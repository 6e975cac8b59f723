use std::collections::HashMap;

use crate::error::{Result, SimError};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SignalType {
    Input,
    Output,
}

/// Port descriptor of a model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signal {
    pub name: &'static str,
    pub num_bits: u32,
    pub ty: SignalType,
}

impl Signal {
    pub const fn input(name: &'static str, num_bits: u32) -> Self {
        Self {
            name,
            num_bits,
            ty: SignalType::Input,
        }
    }

    pub const fn output(name: &'static str, num_bits: u32) -> Self {
        Self {
            name,
            num_bits,
            ty: SignalType::Output,
        }
    }

    pub fn mask(&self) -> u64 {
        if self.num_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << self.num_bits) - 1
        }
    }
}

/// Index of a signal inside a [`SignalBus`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignalId(usize);

impl SignalId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Named, fixed-width values shared between a model and the harness.
///
/// The harness may only [`write`](SignalBus::write) inputs. Models update their
/// outputs through [`set`](SignalBus::set), which skips the direction check.
/// Every value is masked to the width of its signal.
#[derive(Clone, Debug)]
pub struct SignalBus {
    signals: Vec<Signal>,
    values: Vec<u64>,
    index: HashMap<&'static str, usize>,
}

impl SignalBus {
    pub fn new(signals: &[Signal]) -> Self {
        let index = signals
            .iter()
            .enumerate()
            .map(|(idx, signal)| (signal.name, idx))
            .collect();
        Self {
            signals: signals.to_vec(),
            values: vec![0; signals.len()],
            index,
        }
    }

    pub fn io(&self) -> &[Signal] {
        &self.signals
    }

    pub fn id(&self, name: &str) -> Result<SignalId> {
        self.index
            .get(name)
            .copied()
            .map(SignalId)
            .ok_or_else(|| SimError::UnknownSignal(name.to_owned()))
    }

    pub fn signal(&self, id: SignalId) -> &Signal {
        &self.signals[id.0]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Drive an input from the harness side.
    pub fn write(&mut self, name: &str, value: u64) -> Result<()> {
        let id = self.id(name)?;
        if self.signals[id.0].ty != SignalType::Input {
            return Err(SimError::NotAnInput(name.to_owned()));
        }
        self.set(id, value);
        Ok(())
    }

    pub fn read(&self, name: &str) -> Result<u64> {
        self.id(name).map(|id| self.get(id))
    }

    pub fn get(&self, id: SignalId) -> u64 {
        self.values[id.0]
    }

    pub fn set(&mut self, id: SignalId, value: u64) {
        self.values[id.0] = value & self.signals[id.0].mask();
    }

    pub fn values(&self) -> &[u64] {
        &self.values
    }
}
