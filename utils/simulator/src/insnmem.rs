use crate::error::{Result, SimError};
use crate::models::Model;
use crate::signal::{Signal, SignalBus, SignalId};

const PORTS: &[Signal] = &[
    Signal::input("clock", 1),
    Signal::input("reset_n", 1),
    Signal::input("program_counter", 32),
    Signal::output("instruction_word", 32),
    Signal::output("alignment_exception", 1),
];

const RESET_N: SignalId = SignalId::new(1);
const PROGRAM_COUNTER: SignalId = SignalId::new(2);
const INSTRUCTION_WORD: SignalId = SignalId::new(3);
const ALIGNMENT_EXCEPTION: SignalId = SignalId::new(4);

/// Byte-addressed instruction store with a registered fetch port.
///
/// `instruction_word` is the little-endian word at the address presented on
/// the previous edge. `alignment_exception` follows `program_counter`
/// combinationally. Bytes past `size` read as zero.
pub struct InsnMemModel {
    bus: SignalBus,
    mem: Vec<u8>,
}

impl InsnMemModel {
    pub fn new(size: usize, image: &[u8]) -> Result<Self> {
        if size == 0 || size % 4 != 0 {
            return Err(SimError::InvalidConfig(format!(
                "instruction memory size must be a non-zero multiple of 4, got {size}"
            )));
        }
        if image.len() > size {
            return Err(SimError::InvalidConfig(format!(
                "preload image of {} bytes does not fit in {size} bytes",
                image.len()
            )));
        }

        let mut mem = vec![0; size];
        mem[..image.len()].copy_from_slice(image);

        Ok(Self {
            bus: SignalBus::new(PORTS),
            mem,
        })
    }

    pub fn size(&self) -> usize {
        self.mem.len()
    }

    fn read_byte(&self, addr: u64) -> u8 {
        usize::try_from(addr)
            .ok()
            .and_then(|addr| self.mem.get(addr))
            .copied()
            .unwrap_or(0)
    }

    fn read_word(&self, addr: u64) -> u32 {
        u32::from_le_bytes([
            self.read_byte(addr),
            self.read_byte(addr + 1),
            self.read_byte(addr + 2),
            self.read_byte(addr + 3),
        ])
    }
}

impl Model for InsnMemModel {
    fn name(&self) -> &str {
        "insnmem"
    }

    fn bus(&self) -> &SignalBus {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut SignalBus {
        &mut self.bus
    }

    fn eval(&mut self) {
        let pc = self.bus.get(PROGRAM_COUNTER);
        self.bus.set(ALIGNMENT_EXCEPTION, (pc % 4 != 0) as u64);
    }

    fn step(&mut self) {
        if self.bus.get(RESET_N) == 0 {
            self.bus.set(INSTRUCTION_WORD, 0);
            return;
        }
        let word = self.read_word(self.bus.get(PROGRAM_COUNTER));
        self.bus.set(INSTRUCTION_WORD, word as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IMAGE: [u8; 8] = [0x12, 0x34, 0x56, 0x78, 0x93, 0x00, 0x20, 0x00];

    fn fetch(model: &mut InsnMemModel, pc: u64) -> (u64, u64) {
        model.bus_mut().write("program_counter", pc).unwrap();
        model.eval();
        model.step();
        (
            model.bus().read("instruction_word").unwrap(),
            model.bus().read("alignment_exception").unwrap(),
        )
    }

    #[test]
    fn words_are_little_endian() {
        let mut model = InsnMemModel::new(16, &IMAGE).unwrap();
        model.bus_mut().write("reset_n", 1).unwrap();
        assert_eq!(fetch(&mut model, 0), (0x7856_3412, 0));
        assert_eq!(fetch(&mut model, 4), (0x0020_0093, 0));
    }

    #[test]
    fn unaligned_fetch_raises_exception_and_reads_bytes() {
        let mut model = InsnMemModel::new(16, &IMAGE).unwrap();
        model.bus_mut().write("reset_n", 1).unwrap();
        assert_eq!(fetch(&mut model, 1), (0x9378_5634, 1));
    }

    #[test]
    fn reads_past_the_end_are_zero() {
        let mut model = InsnMemModel::new(8, &IMAGE).unwrap();
        model.bus_mut().write("reset_n", 1).unwrap();
        assert_eq!(fetch(&mut model, 6), (0x0000_0020, 1));
        assert_eq!(fetch(&mut model, 0xffff_fffc), (0, 0));
    }

    #[test]
    fn rejects_bad_geometry() {
        assert!(InsnMemModel::new(0, &[]).is_err());
        assert!(InsnMemModel::new(6, &[]).is_err());
        assert!(InsnMemModel::new(4, &IMAGE).is_err());
    }
}
