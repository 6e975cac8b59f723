use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use simulator::{DecodedFrame, Process, ProcessContext, SimTime, UartDecoder, Wait};
use tracing::{debug, trace};

use crate::config::UartParams;
use crate::error::{HarnessError, Result};

const SERIAL_IN: &str = "serial_in";

/// `NOT(popcount(data) mod 2)`, masked to one bit.
pub fn parity_bit(data: u32) -> u8 {
    (!(data.count_ones() % 2) & 1) as u8
}

/// Line levels of one frame: start, data LSB first, optional parity, stop.
pub fn encode_frame(data: u32, word_width: u32, parity: bool) -> Vec<u8> {
    let data = mask(data, word_width);
    let mut levels = Vec::with_capacity(word_width as usize + 3);
    levels.push(0);
    levels.extend((0..word_width).map(|bit| ((data >> bit) & 1) as u8));
    if parity {
        levels.push(parity_bit(data));
    }
    levels.push(1);
    levels
}

fn mask(data: u32, word_width: u32) -> u32 {
    if word_width >= 32 {
        data
    } else {
        data & ((1 << word_width) - 1)
    }
}

/// One frame ready to be put on the line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UartFrame {
    pub data: u32,
    pub levels: Vec<u8>,
    pub bit_period: SimTime,
}

impl UartFrame {
    pub fn duration(&self) -> SimTime {
        self.levels.len() as SimTime * self.bit_period
    }

    /// Index of the parity level, if the frame carries one.
    pub fn parity_index(&self, word_width: u32) -> Option<usize> {
        let idx = 1 + word_width as usize;
        (idx + 1 < self.levels.len()).then_some(idx)
    }

    pub fn stop_index(&self) -> usize {
        self.levels.len() - 1
    }
}

/// Transmit side of UART framing used to stimulate the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GoldenUartCodec {
    word_width: u32,
    parity: bool,
    bit_period: SimTime,
}

impl GoldenUartCodec {
    pub fn new(word_width: u32, parity: bool, bit_period: SimTime) -> Result<Self> {
        if !(1..=32).contains(&word_width) {
            return Err(HarnessError::Configuration(format!(
                "UART word width must be within 1..=32, got {word_width}"
            )));
        }
        if bit_period == 0 {
            return Err(HarnessError::Configuration("UART bit period must be non-zero".into()));
        }
        Ok(Self {
            word_width,
            parity,
            bit_period,
        })
    }

    pub fn from_params(params: &UartParams) -> Result<Self> {
        if params.baud_rate == 0 {
            return Err(HarnessError::Configuration("baud rate must be non-zero".into()));
        }
        Self::new(
            params.word_width,
            params.parity,
            1_000_000_000 / params.baud_rate,
        )
    }

    pub fn word_width(&self) -> u32 {
        self.word_width
    }

    pub fn parity(&self) -> bool {
        self.parity
    }

    pub fn bit_period(&self) -> SimTime {
        self.bit_period
    }

    pub fn mask(&self, data: u32) -> u32 {
        mask(data, self.word_width)
    }

    pub fn parity_bit(&self, data: u32) -> u8 {
        parity_bit(self.mask(data))
    }

    pub fn frame(&self, data: u32) -> UartFrame {
        UartFrame {
            data: self.mask(data),
            levels: encode_frame(data, self.word_width, self.parity),
            bit_period: self.bit_period,
        }
    }

    pub fn frame_duration(&self) -> SimTime {
        (self.word_width as SimTime + 2 + self.parity as SimTime) * self.bit_period
    }

    pub fn send_byte(&self, data: u32) -> UartTxDriver {
        UartTxDriver::new(self.frame(data))
    }
}

/// Drives one frame onto `serial_in`, holding each level for a bit period.
pub struct UartTxDriver {
    data: u32,
    levels: VecDeque<u8>,
    bit_period: SimTime,
    started: bool,
}

impl UartTxDriver {
    pub fn new(frame: UartFrame) -> Self {
        Self {
            data: frame.data,
            levels: frame.levels.into(),
            bit_period: frame.bit_period,
            started: false,
        }
    }
}

impl Process for UartTxDriver {
    fn name(&self) -> &str {
        "uart_tx"
    }

    fn resume(&mut self, cx: &mut ProcessContext<'_>) -> simulator::Result<Wait> {
        let Some(level) = self.levels.pop_front() else {
            trace!(data = self.data, now = cx.now(), "frame sent");
            return Ok(Wait::Done);
        };
        if !std::mem::replace(&mut self.started, true) {
            debug!("sending byte {:#04x}", self.data);
        }
        cx.drive(SERIAL_IN, level as u64)?;
        Ok(Wait::Time(self.bit_period))
    }
}

/// Watches `serial_in` at every edge and records the frames it carries.
pub struct LineMonitor {
    decoder: UartDecoder,
    frames: Rc<RefCell<Vec<DecodedFrame>>>,
}

impl LineMonitor {
    pub fn new(codec: &GoldenUartCodec, clock_period: SimTime) -> (Self, Rc<RefCell<Vec<DecodedFrame>>>) {
        let frames = Rc::new(RefCell::new(Vec::new()));
        let bit_cycles = codec.bit_period() / clock_period.max(1);
        let monitor = Self {
            decoder: UartDecoder::new(bit_cycles, codec.word_width(), codec.parity()),
            frames: Rc::clone(&frames),
        };
        (monitor, frames)
    }
}

impl Process for LineMonitor {
    fn name(&self) -> &str {
        "uart_line_monitor"
    }

    fn resume(&mut self, cx: &mut ProcessContext<'_>) -> simulator::Result<Wait> {
        if cx.cycle() > 0 {
            let line = cx.sampled(SERIAL_IN)? as u8;
            if let Some(frame) = self.decoder.process(line) {
                trace!(?frame, "line monitor decoded frame");
                self.frames.borrow_mut().push(frame);
            }
        }
        Ok(Wait::Edges(1))
    }
}
