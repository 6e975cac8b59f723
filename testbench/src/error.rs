use std::fmt;

use simulator::SimError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("hex format error at line {line}: {message}")]
    Format { line: usize, message: String },

    #[error(transparent)]
    Mismatch(Box<Mismatch>),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sim(#[from] SimError),
}

impl HarnessError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

impl From<Mismatch> for HarnessError {
    fn from(mismatch: Mismatch) -> Self {
        Self::Mismatch(Box::new(mismatch))
    }
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Golden model and DUT disagree on one observed signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub cycle: u64,
    pub signal: String,
    pub expected: u64,
    pub actual: u64,
    pub bits: u32,
    pub stimulus: String,
}

impl Mismatch {
    fn hex_digits(&self) -> usize {
        self.bits.div_ceil(4).max(1) as usize
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.hex_digits();
        write!(
            f,
            "mismatch on `{}` at cycle {}: expected 0x{:0width$x}, got 0x{:0width$x} (stimulus: {})",
            self.signal, self.cycle, self.expected, self.actual, self.stimulus
        )
    }
}

impl std::error::Error for Mismatch {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_prints_fixed_width_hex() {
        let err = HarnessError::from(Mismatch {
            cycle: 12,
            signal: "read_data_port1".into(),
            expected: 0x1f,
            actual: 0,
            bits: 32,
            stimulus: "read x3".into(),
        });
        assert_eq!(
            err.to_string(),
            "mismatch on `read_data_port1` at cycle 12: expected 0x0000001f, got 0x00000000 (stimulus: read x3)"
        );
    }
}
