use crate::baud_gen::BaudGenModel;
use crate::error::Result;
use crate::insnmem::InsnMemModel;
use crate::register_file::RegFileModel;
use crate::signal::SignalBus;
use crate::uart_rx::{UartRxConfig, UartRxModel};

/// Cycle model of a synchronous block, seen through its signal bus.
///
/// The harness writes inputs on the bus, calls [`eval`](Model::eval) to settle
/// combinational outputs and [`step`](Model::step) once per rising clock edge.
pub trait Model {
    fn name(&self) -> &str;

    fn bus(&self) -> &SignalBus;

    fn bus_mut(&mut self) -> &mut SignalBus;

    /// Recompute combinational outputs from the current inputs and state.
    fn eval(&mut self) {}

    /// Apply the synchronous update of one rising edge.
    fn step(&mut self);
}

/// Names of the built-in models.
pub const MODELS: &[&str] = &["regfile", "insnmem", "uart_rx", "baud_gen"];

/// Construction parameters of a built-in model.
#[derive(Clone, Debug)]
pub enum ModelConfig {
    RegFile,
    InsnMem { size: usize, image: Vec<u8> },
    UartRx(UartRxConfig),
    BaudGen { clk_freq_hz: u64, baud_rate: u64 },
}

impl ModelConfig {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RegFile => "regfile",
            Self::InsnMem { .. } => "insnmem",
            Self::UartRx(_) => "uart_rx",
            Self::BaudGen { .. } => "baud_gen",
        }
    }
}

pub fn create_model(config: ModelConfig) -> Result<Box<dyn Model>> {
    Ok(match config {
        ModelConfig::RegFile => Box::new(RegFileModel::new()),
        ModelConfig::InsnMem { size, image } => Box::new(InsnMemModel::new(size, &image)?),
        ModelConfig::UartRx(config) => Box::new(UartRxModel::new(config)?),
        ModelConfig::BaudGen {
            clk_freq_hz,
            baud_rate,
        } => Box::new(BaudGenModel::new(clk_freq_hz, baud_rate)?),
    })
}
