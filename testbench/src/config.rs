use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use simulator::{ClockConfig, ResetConfig};

use crate::error::{HarnessError, Result};

pub const ROOT_VAR: &str = "SOC_TB_ROOT";
pub const PARITY_VAR: &str = "SOC_TB_PARITY";
pub const SEED_VAR: &str = "SOC_TB_SEED";
pub const MAX_CYCLES_VAR: &str = "SOC_TB_MAX_CYCLES";
pub const VCD_VAR: &str = "SOC_TB_VCD";

pub const DEFAULT_SEED: u64 = 42;

/// Values handed to the harness by the test runner environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Directory holding hex images and waveform traces.
    pub root: Utf8PathBuf,
    /// Restricts UART runs to one parity mode.
    pub parity: Option<bool>,
    pub seed: u64,
    pub max_cycles: Option<u64>,
    pub vcd: bool,
}

impl HarnessConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), falling back to `default_root`
    /// when `SOC_TB_ROOT` is unset.
    pub fn from_env_or(default_root: &Utf8Path) -> Result<Self> {
        Self::from_lookup(|key| match std::env::var(key) {
            Ok(value) => Some(value),
            Err(_) if key == ROOT_VAR => Some(default_root.to_string()),
            Err(_) => None,
        })
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let root = lookup(ROOT_VAR)
            .filter(|root| !root.is_empty())
            .ok_or_else(|| {
                HarnessError::Configuration(format!("{ROOT_VAR} is not set"))
            })?;

        let parity = lookup(PARITY_VAR)
            .map(|value| parse_flag(PARITY_VAR, &value))
            .transpose()?;
        let seed = lookup(SEED_VAR)
            .map(|value| parse_number(SEED_VAR, &value))
            .transpose()?
            .unwrap_or(DEFAULT_SEED);
        let max_cycles = lookup(MAX_CYCLES_VAR)
            .map(|value| parse_number(MAX_CYCLES_VAR, &value))
            .transpose()?;
        let vcd = lookup(VCD_VAR)
            .map(|value| parse_flag(VCD_VAR, &value))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            root: root.into(),
            parity,
            seed,
            max_cycles,
            vcd,
        })
    }

    pub fn preload_dir(&self) -> Utf8PathBuf {
        self.root.join("preload")
    }

    pub fn vcd_dir(&self) -> Option<Utf8PathBuf> {
        self.vcd.then(|| self.root.join("vcd"))
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        other => Err(HarnessError::Configuration(format!(
            "{key} must be 0 or 1, got `{other}`"
        ))),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        HarnessError::Configuration(format!("{key} must be an unsigned integer, got `{value}`"))
    })
}

/// Parameter matrix of the test suite.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SuiteConfig {
    pub clock: ClockSection,
    pub reset: ResetSection,
    pub regfile: RegFileSection,
    pub insnmem: InsnMemSection,
    pub uart_rx: UartRxSection,
    pub baud_gen: BaudGenSection,
}

impl SuiteConfig {
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| HarnessError::io(format!("Failed to read suite config {path}"), e))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| HarnessError::Configuration(format!("invalid suite config: {e}")))
    }

    pub fn clock_config(&self) -> Result<ClockConfig> {
        Ok(ClockConfig::new(self.clock.period_ns)?)
    }

    pub fn reset_config(&self) -> Result<ResetConfig> {
        Ok(ResetConfig::new(
            self.reset.pre_edges,
            self.reset.hold_edges,
        )?)
    }

    pub fn clk_freq_hz(&self) -> Result<u64> {
        Ok(self.clock_config()?.freq_hz())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClockSection {
    pub period_ns: u64,
}

impl Default for ClockSection {
    fn default() -> Self {
        Self { period_ns: 10 }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ResetSection {
    pub pre_edges: u64,
    pub hold_edges: u64,
}

impl Default for ResetSection {
    fn default() -> Self {
        let reset = ResetConfig::default();
        Self {
            pre_edges: reset.pre_edges,
            hold_edges: reset.hold_edges,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegFileSection {
    pub seed: Option<u64>,
}

impl Default for RegFileSection {
    fn default() -> Self {
        Self {
            seed: Some(DEFAULT_SEED),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct InsnMemSection {
    pub sizes: Vec<usize>,
}

impl Default for InsnMemSection {
    fn default() -> Self {
        Self {
            sizes: vec![512, 1024, 2048],
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct UartRxSection {
    pub baud_rates: Vec<u64>,
    pub word_widths: Vec<u32>,
    pub parities: Vec<bool>,
    pub stress_frames: usize,
}

impl Default for UartRxSection {
    fn default() -> Self {
        Self {
            baud_rates: vec![115_200],
            word_widths: vec![7, 8],
            parities: vec![false, true],
            stress_frames: 20,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BaudGenSection {
    pub baud_rates: Vec<u64>,
    pub ticks: u64,
}

impl Default for BaudGenSection {
    fn default() -> Self {
        Self {
            baud_rates: vec![9_600, 19_200, 115_200],
            ticks: 5,
        }
    }
}

/// Geometry of one instruction memory instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryParams {
    pub size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UartParams {
    pub clk_freq_hz: u64,
    pub baud_rate: u64,
    pub word_width: u32,
    pub parity: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BaudParams {
    pub clk_freq_hz: u64,
    pub baud_rate: u64,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn root_is_required() {
        let err = HarnessConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, HarnessError::Configuration(_)));
    }

    #[test]
    fn defaults_apply_to_optional_values() {
        let config = HarnessConfig::from_lookup(lookup(&[(ROOT_VAR, "/tmp/tb")])).unwrap();
        assert_eq!(config.root, Utf8PathBuf::from("/tmp/tb"));
        assert_eq!(config.parity, None);
        assert_eq!(config.seed, DEFAULT_SEED);
        assert_eq!(config.max_cycles, None);
        assert_eq!(config.vcd_dir(), None);
    }

    #[test]
    fn parses_every_variable() {
        let config = HarnessConfig::from_lookup(lookup(&[
            (ROOT_VAR, "/tmp/tb"),
            (PARITY_VAR, "1"),
            (SEED_VAR, "7"),
            (MAX_CYCLES_VAR, "5000"),
            (VCD_VAR, "1"),
        ]))
        .unwrap();
        assert_eq!(config.parity, Some(true));
        assert_eq!(config.seed, 7);
        assert_eq!(config.max_cycles, Some(5000));
        assert_eq!(config.vcd_dir(), Some(Utf8PathBuf::from("/tmp/tb/vcd")));
        assert_eq!(config.preload_dir(), Utf8PathBuf::from("/tmp/tb/preload"));
    }

    #[test]
    fn rejects_malformed_values() {
        for (key, value) in [(PARITY_VAR, "yes"), (SEED_VAR, "-1"), (MAX_CYCLES_VAR, "many")] {
            let err = HarnessConfig::from_lookup(lookup(&[(ROOT_VAR, "/tmp"), (key, value)]))
                .unwrap_err();
            assert!(matches!(err, HarnessError::Configuration(_)), "{key}");
        }
    }

    #[test]
    fn suite_sections_fall_back_to_defaults() {
        let suite = SuiteConfig::parse("insnmem:\n  sizes: [64]\nclock:\n  period_ns: 20\n").unwrap();
        assert_eq!(suite.insnmem.sizes, vec![64]);
        assert_eq!(suite.clk_freq_hz().unwrap(), 50_000_000);
        assert_eq!(suite.uart_rx, UartRxSection::default());
        assert_eq!(suite.reset_config().unwrap(), ResetConfig::default());
    }

    #[test]
    fn reset_without_hold_edges_is_rejected() {
        let suite = SuiteConfig::parse("reset:\n  pre_edges: 1\n  hold_edges: 0\n").unwrap();
        assert!(matches!(
            suite.reset_config(),
            Err(HarnessError::Sim(simulator::SimError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn suite_rejects_unknown_keys() {
        assert!(SuiteConfig::parse("uart_rx:\n  baud: 9600\n").is_err());
    }
}
