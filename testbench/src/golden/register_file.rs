use std::fmt;

const ADDR_MASK: u8 = 0x1f;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReadPort {
    One,
    Two,
}

impl ReadPort {
    pub const ALL: [ReadPort; 2] = [ReadPort::One, ReadPort::Two];

    pub fn addr_signal(self) -> &'static str {
        match self {
            ReadPort::One => "read_addr_port1",
            ReadPort::Two => "read_addr_port2",
        }
    }

    pub fn data_signal(self) -> &'static str {
        match self {
            ReadPort::One => "read_data_port1",
            ReadPort::Two => "read_data_port2",
        }
    }
}

impl fmt::Display for ReadPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadPort::One => write!(f, "port1"),
            ReadPort::Two => write!(f, "port2"),
        }
    }
}

/// 32 x 32-bit register file with a hardwired zero register.
///
/// Writes are scheduled and only land on [`tick`](Self::tick), so reads in the
/// same cycle observe the old value.
#[derive(Clone, Debug, Default)]
pub struct GoldenRegisterFile {
    regs: [u32; 32],
    pending: Option<(u8, u32)>,
}

impl GoldenRegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, addr: u8, data: u32, enable: bool) {
        let addr = addr & ADDR_MASK;
        self.pending = (enable && addr != 0).then_some((addr, data));
    }

    pub fn read(&self, addr: u8, _port: ReadPort) -> u32 {
        self.regs[(addr & ADDR_MASK) as usize]
    }

    pub fn tick(&mut self) {
        if let Some((addr, data)) = self.pending.take() {
            self.regs[addr as usize] = data;
        }
    }

    pub fn reset(&mut self) {
        self.regs = [0; 32];
        self.pending = None;
    }

    pub fn state(&self) -> [u32; 32] {
        self.regs
    }
}
