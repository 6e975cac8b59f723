//! Software reference models the DUT outputs are checked against.

mod baud;
mod memory;
mod register_file;
mod uart;

pub use baud::GoldenBaudGenerator;
pub use memory::{Fetch, GoldenAddressableMemory};
pub use register_file::{GoldenRegisterFile, ReadPort};
pub use uart::{GoldenUartCodec, LineMonitor, UartFrame, UartTxDriver, encode_frame, parity_bit};
