mod baud_gen;
mod core;
mod error;
mod insnmem;
mod kernel;
mod models;
mod register_file;
mod signal;
mod uart;
mod uart_rx;
mod vcd;

// Re-export public API
pub use baud_gen::{BaudCounter, BaudGenModel, OVERSAMPLING, divisor};
pub use core::{ClockConfig, Harness, HarnessState, ResetConfig};
pub use error::{Result, SimError};
pub use insnmem::InsnMemModel;
pub use kernel::{Kernel, Process, ProcessContext, ProcessHandle, SimTime, Wait};
pub use models::{MODELS, Model, ModelConfig, create_model};
pub use register_file::{RegFileModel, RegisterFile};
pub use signal::{Signal, SignalBus, SignalId, SignalType};
pub use uart::{DecodedFrame, UartDecoder};
pub use uart_rx::{UartRxConfig, UartRxModel};
pub use vcd::VcdTrace;
