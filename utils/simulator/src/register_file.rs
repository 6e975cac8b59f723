use crate::models::Model;
use crate::signal::{Signal, SignalBus, SignalId};

/// Register file state
#[derive(Debug, Clone)]
pub struct RegisterFile {
    regs: [u32; 32],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self { regs: [0; 32] }
    }

    pub fn get(&self, idx: u8) -> u32 {
        if idx < 32 { self.regs[idx as usize] } else { 0 }
    }

    pub fn set(&mut self, idx: u8, value: u32) {
        if idx < 32 && idx != 0 {
            // x0 is always 0
            self.regs[idx as usize] = value;
        }
    }

    pub fn clear(&mut self) {
        self.regs = [0; 32];
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

const PORTS: &[Signal] = &[
    Signal::input("clock", 1),
    Signal::input("reset_n", 1),
    Signal::input("write_addr", 5),
    Signal::input("write_data", 32),
    Signal::input("write_enable", 1),
    Signal::input("read_addr_port1", 5),
    Signal::input("read_addr_port2", 5),
    Signal::output("read_data_port1", 32),
    Signal::output("read_data_port2", 32),
];

const RESET_N: SignalId = SignalId::new(1);
const WRITE_ADDR: SignalId = SignalId::new(2);
const WRITE_DATA: SignalId = SignalId::new(3);
const WRITE_ENABLE: SignalId = SignalId::new(4);
const READ_ADDR_PORT1: SignalId = SignalId::new(5);
const READ_ADDR_PORT2: SignalId = SignalId::new(6);
const READ_DATA_PORT1: SignalId = SignalId::new(7);
const READ_DATA_PORT2: SignalId = SignalId::new(8);

/// Two registered read ports, one write port, synchronous active-low reset.
///
/// Both read ports latch the register contents before the write of the same
/// edge lands.
pub struct RegFileModel {
    bus: SignalBus,
    regs: RegisterFile,
}

impl RegFileModel {
    pub fn new() -> Self {
        Self {
            bus: SignalBus::new(PORTS),
            regs: RegisterFile::new(),
        }
    }
}

impl Default for RegFileModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for RegFileModel {
    fn name(&self) -> &str {
        "regfile"
    }

    fn bus(&self) -> &SignalBus {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut SignalBus {
        &mut self.bus
    }

    fn step(&mut self) {
        if self.bus.get(RESET_N) == 0 {
            self.regs.clear();
            self.bus.set(READ_DATA_PORT1, 0);
            self.bus.set(READ_DATA_PORT2, 0);
            return;
        }

        let rd1 = self.regs.get(self.bus.get(READ_ADDR_PORT1) as u8);
        let rd2 = self.regs.get(self.bus.get(READ_ADDR_PORT2) as u8);

        if self.bus.get(WRITE_ENABLE) != 0 {
            self.regs.set(
                self.bus.get(WRITE_ADDR) as u8,
                self.bus.get(WRITE_DATA) as u32,
            );
        }

        self.bus.set(READ_DATA_PORT1, rd1 as u64);
        self.bus.set(READ_DATA_PORT2, rd2 as u64);
    }
}
