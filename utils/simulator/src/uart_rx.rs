use tracing::trace;

use crate::baud_gen::{BaudCounter, OVERSAMPLING, divisor};
use crate::error::{Result, SimError};
use crate::models::Model;
use crate::signal::{Signal, SignalBus, SignalId};

#[derive(Clone, Debug)]
pub struct UartRxConfig {
    pub clk_freq_hz: u64,
    pub baud_rate: u64,
    pub word_width: u32,
}

impl Default for UartRxConfig {
    fn default() -> Self {
        Self {
            clk_freq_hz: 100_000_000,
            baud_rate: 115_200,
            word_width: 8,
        }
    }
}

const RESET_N: SignalId = SignalId::new(1);
const SERIAL_IN: SignalId = SignalId::new(2);
const PARITY_CONFIG: SignalId = SignalId::new(3);
const READ_READY: SignalId = SignalId::new(4);
const READ_DATA: SignalId = SignalId::new(5);
const READ_VALID: SignalId = SignalId::new(6);
const PARITY_ERROR: SignalId = SignalId::new(7);
const FRAME_ERROR: SignalId = SignalId::new(8);

fn ports(word_width: u32) -> [Signal; 9] {
    [
        Signal::input("clock", 1),
        Signal::input("reset_n", 1),
        Signal::input("serial_in", 1),
        Signal::input("parity_config", 1),
        Signal::input("read_ready", 1),
        Signal::output("read_data", word_width),
        Signal::output("read_valid", 1),
        Signal::output("parity_error", 1),
        Signal::output("frame_error", 1),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RxState {
    Idle,
    Start,
    Data,
    Parity,
    Stop,
}

/// Completed frame handed from the deserializer to the output buffer.
#[derive(Clone, Copy, Debug)]
struct RxWord {
    data: u32,
    parity_error: bool,
    frame_error: bool,
}

/// Oversampling deserializer: finds the middle of the start bit after 8 ticks,
/// then samples every 16 ticks.
#[derive(Clone, Debug)]
struct Deserializer {
    state: RxState,
    ticks: u64,
    bits: u32,
    shift: u32,
    parity_error: bool,
    word_width: u32,
}

impl Deserializer {
    fn new(word_width: u32) -> Self {
        Self {
            state: RxState::Idle,
            ticks: 0,
            bits: 0,
            shift: 0,
            parity_error: false,
            word_width,
        }
    }

    fn clear(&mut self) {
        *self = Self::new(self.word_width);
    }

    fn step(&mut self, rx: u8, tick: bool, parity_enabled: bool) -> Option<RxWord> {
        let mid_bit = OVERSAMPLING - 1;
        match self.state {
            RxState::Idle => {
                if rx == 0 {
                    self.state = RxState::Start;
                    self.ticks = 0;
                }
            }
            RxState::Start if tick => {
                if self.ticks == OVERSAMPLING / 2 - 1 {
                    self.state = RxState::Data;
                    self.ticks = 0;
                    self.bits = 0;
                    self.shift = 0;
                    self.parity_error = false;
                } else {
                    self.ticks += 1;
                }
            }
            RxState::Data if tick => {
                if self.ticks == mid_bit {
                    self.ticks = 0;
                    self.shift = (self.shift >> 1) | ((rx as u32) << (self.word_width - 1));
                    if self.bits == self.word_width - 1 {
                        self.state = if parity_enabled {
                            RxState::Parity
                        } else {
                            RxState::Stop
                        };
                    } else {
                        self.bits += 1;
                    }
                } else {
                    self.ticks += 1;
                }
            }
            RxState::Parity if tick => {
                if self.ticks == mid_bit {
                    self.ticks = 0;
                    let expected = (!(self.shift.count_ones() % 2) & 1) as u8;
                    self.parity_error = rx != expected;
                    self.state = RxState::Stop;
                } else {
                    self.ticks += 1;
                }
            }
            RxState::Stop if tick => {
                if self.ticks == mid_bit {
                    self.state = RxState::Idle;
                    return Some(RxWord {
                        data: self.shift,
                        parity_error: self.parity_error,
                        frame_error: rx == 0,
                    });
                }
                self.ticks += 1;
            }
            _ => {}
        }
        None
    }
}

/// Holds one decoded word until the consumer takes it.
///
/// A word arriving while the buffer is still full is dropped and counted as an
/// overrun; the buffered word is never overwritten.
#[derive(Clone, Debug, Default)]
struct FlagBuffer {
    word: Option<RxWord>,
    overruns: u64,
}

impl FlagBuffer {
    fn step(&mut self, done: Option<RxWord>, read_ready: bool) {
        if read_ready {
            self.word = None;
        }
        if let Some(word) = done {
            if self.word.is_some() {
                self.overruns += 1;
            } else {
                self.word = Some(word);
            }
        }
    }
}

/// UART receiver: two-flop input synchronizer, baud tick generator,
/// deserializer and a one-word valid/ready output buffer.
pub struct UartRxModel {
    bus: SignalBus,
    baud: BaudCounter,
    sync: [u8; 2],
    deserializer: Deserializer,
    buffer: FlagBuffer,
}

impl UartRxModel {
    pub fn new(config: UartRxConfig) -> Result<Self> {
        if !(1..=32).contains(&config.word_width) {
            return Err(SimError::InvalidConfig(format!(
                "UART word width must be within 1..=32, got {}",
                config.word_width
            )));
        }
        Ok(Self {
            bus: SignalBus::new(&ports(config.word_width)),
            baud: BaudCounter::new(divisor(config.clk_freq_hz, config.baud_rate)?),
            sync: [1, 1],
            deserializer: Deserializer::new(config.word_width),
            buffer: FlagBuffer::default(),
        })
    }

    /// Clock cycles per baud tick.
    pub fn divisor(&self) -> u64 {
        self.baud.divisor()
    }

    /// Words dropped because the buffer was still full.
    pub fn overruns(&self) -> u64 {
        self.buffer.overruns
    }

    fn drive_outputs(&mut self) {
        let word = self.buffer.word;
        self.bus.set(READ_VALID, word.is_some() as u64);
        if let Some(word) = word {
            self.bus.set(READ_DATA, word.data as u64);
            self.bus.set(PARITY_ERROR, word.parity_error as u64);
            self.bus.set(FRAME_ERROR, word.frame_error as u64);
        }
    }
}

impl Model for UartRxModel {
    fn name(&self) -> &str {
        "uart_rx"
    }

    fn bus(&self) -> &SignalBus {
        &self.bus
    }

    fn bus_mut(&mut self) -> &mut SignalBus {
        &mut self.bus
    }

    fn step(&mut self) {
        if self.bus.get(RESET_N) == 0 {
            self.baud.clear();
            self.sync = [1, 1];
            self.deserializer.clear();
            self.buffer = FlagBuffer::default();
            self.bus.set(READ_DATA, 0);
            self.bus.set(PARITY_ERROR, 0);
            self.bus.set(FRAME_ERROR, 0);
            self.drive_outputs();
            return;
        }

        let rx = self.sync[1];
        let tick = self.baud.tick();
        let parity_enabled = self.bus.get(PARITY_CONFIG) != 0;
        let done = self.deserializer.step(rx, tick, parity_enabled);
        if let Some(word) = done {
            trace!(data = word.data, ?word, "uart_rx frame complete");
        }

        let read_ready = self.bus.get(READ_READY) != 0 && self.buffer.word.is_some();
        self.buffer.step(done, read_ready);

        self.sync = [self.bus.get(SERIAL_IN) as u8, self.sync[0]];
        self.baud.advance();
        self.drive_outputs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clock the model with one serial level per baud bit.
    fn feed_bits(model: &mut UartRxModel, bits: &[u8]) {
        let cycles_per_bit = model.divisor() * OVERSAMPLING;
        for &bit in bits {
            model.bus_mut().write("serial_in", bit as u64).unwrap();
            for _ in 0..cycles_per_bit {
                model.step();
            }
        }
    }

    fn frame(data: u32, width: u32, parity: Option<u8>) -> Vec<u8> {
        let mut bits = vec![0];
        bits.extend((0..width).map(|i| ((data >> i) & 1) as u8));
        bits.extend(parity);
        bits.push(1);
        bits.push(1);
        bits
    }

    fn model(word_width: u32) -> UartRxModel {
        let mut model = UartRxModel::new(UartRxConfig {
            clk_freq_hz: 16 * 4 * 1000,
            baud_rate: 1000,
            word_width,
        })
        .unwrap();
        let bus = model.bus_mut();
        bus.write("reset_n", 1).unwrap();
        bus.write("serial_in", 1).unwrap();
        model
    }

    fn read(model: &UartRxModel, name: &str) -> u64 {
        model.bus().read(name).unwrap()
    }

    #[test]
    fn receives_word_and_holds_it_until_ready() {
        let mut model = model(8);
        assert_eq!(model.divisor(), 4);
        feed_bits(&mut model, &frame(0x5a, 8, None));
        assert_eq!(read(&model, "read_valid"), 1);
        assert_eq!(read(&model, "read_data"), 0x5a);
        assert_eq!(read(&model, "frame_error"), 0);

        model.bus_mut().write("read_ready", 1).unwrap();
        model.step();
        assert_eq!(read(&model, "read_valid"), 0);
    }

    #[test]
    fn checks_inverted_parity() {
        let mut model = model(7);
        model.bus_mut().write("parity_config", 1).unwrap();
        model.bus_mut().write("read_ready", 1).unwrap();
        // 0x55 has four ones, so the parity bit is 1.
        feed_bits(&mut model, &frame(0x55, 7, Some(1)));
        assert_eq!(model.buffer.overruns, 0);

        model.bus_mut().write("read_ready", 0).unwrap();
        feed_bits(&mut model, &frame(0x55, 7, Some(0)));
        assert_eq!(read(&model, "read_data"), 0x55);
        assert_eq!(read(&model, "parity_error"), 1);
    }

    #[test]
    fn full_buffer_drops_new_words() {
        let mut model = model(8);
        feed_bits(&mut model, &frame(0x11, 8, None));
        feed_bits(&mut model, &frame(0x22, 8, None));
        assert_eq!(read(&model, "read_data"), 0x11);
        assert_eq!(model.overruns(), 1);
    }
}
