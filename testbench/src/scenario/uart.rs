use std::cell::RefCell;
use std::rc::Rc;

use rand::Rng;
use rand_xoshiro::Xoshiro256StarStar;
use simulator::{DecodedFrame, Harness, ProcessHandle, UartRxConfig, UartRxModel, divisor};
use tracing::info;

use super::{Bench, check};
use crate::config::UartParams;
use crate::error::Result;
use crate::golden::{GoldenUartCodec, LineMonitor, UartFrame, UartTxDriver};

const READ_DATA: &str = "read_data";
const READ_VALID: &str = "read_valid";
const READ_READY: &str = "read_ready";
const PARITY_ERROR: &str = "parity_error";
const FRAME_ERROR: &str = "frame_error";

/// Receiver harness with a transmit codec and a monitor on the serial line.
struct UartTb {
    harness: Harness,
    codec: GoldenUartCodec,
    rng: Xoshiro256StarStar,
    line: Rc<RefCell<Vec<DecodedFrame>>>,
    /// Clock cycles per baud tick.
    m: u64,
    bit_edges: u64,
    frame_edges: u64,
    max_edges: u64,
}

impl UartTb {
    fn start(bench: &Bench, params: UartParams, scenario: &str) -> Result<Self> {
        let codec = GoldenUartCodec::from_params(&params)?;
        let m = divisor(params.clk_freq_hz, params.baud_rate)?;
        let model = UartRxModel::new(UartRxConfig {
            clk_freq_hz: params.clk_freq_hz,
            baud_rate: params.baud_rate,
            word_width: params.word_width,
        })?;

        let trace_name = format!(
            "uart_rx_{scenario}_{}_w{}_p{}",
            params.baud_rate, params.word_width, params.parity as u8
        );
        let mut harness = bench.harness_with(Box::new(model), &trace_name, |h| {
            h.drive("serial_in", 1)?;
            h.drive("parity_config", params.parity as u64)?;
            h.drive(READ_READY, 0)?;
            Ok(())
        })?;

        let (monitor, line) = LineMonitor::new(&codec, bench.clock.period_ns);
        harness.spawn(Box::new(monitor));

        let period = bench.clock.period_ns;
        Ok(Self {
            bit_edges: codec.bit_period().div_ceil(period),
            frame_edges: codec.frame_duration().div_ceil(period),
            harness,
            codec,
            rng: bench.rng(params.baud_rate ^ ((params.word_width as u64) << 32)),
            line,
            m,
            max_edges: bench.max_edges,
        })
    }

    fn random_word(&mut self) -> u32 {
        self.codec.mask(self.rng.r#gen())
    }

    /// Idle for a random number of edges in `lo..=hi`.
    fn random_gap(&mut self, lo: u64, hi: u64) -> Result<()> {
        let edges = self.rng.gen_range(lo.min(hi)..=hi);
        self.harness.advance(edges)?;
        Ok(())
    }

    fn send(&mut self, frame: UartFrame) -> ProcessHandle {
        self.harness.spawn(Box::new(UartTxDriver::new(frame)))
    }

    /// Wait for `read_valid` and check the received word and status flags.
    fn expect_word(&mut self, data: u32, parity_error: u64, frame_error: u64) -> Result<()> {
        let limit = (self.frame_edges + 2 * self.bit_edges).min(self.max_edges);
        self.harness.wait_until(READ_VALID, 1, limit)?;

        let stimulus = || format!("send {data:#04x}");
        let actual = self.harness.capture(READ_DATA)?;
        check(&self.harness, READ_DATA, data as u64, actual, stimulus)?;
        let flag = self.harness.capture(PARITY_ERROR)?;
        check(&self.harness, PARITY_ERROR, parity_error, flag, stimulus)?;
        let flag = self.harness.capture(FRAME_ERROR)?;
        check(&self.harness, FRAME_ERROR, frame_error, flag, stimulus)?;
        info!("byte received: {actual:#04x}");
        Ok(())
    }

    /// Run until the driver has put its whole frame on the line.
    fn finish(&mut self, tx: ProcessHandle) -> Result<()> {
        let limit = (self.frame_edges + 2 * self.bit_edges).min(self.max_edges);
        self.harness.join(tx, limit)?;
        Ok(())
    }

    /// The line monitor saw exactly `sent`, with the expected parity bits.
    fn expect_line(&self, sent: &[u32]) -> Result<()> {
        let line = self.line.borrow();
        let count = line.len() as u64;
        check(&self.harness, "serial_in", sent.len() as u64, count, || {
            "frames seen on the line".to_owned()
        })?;
        for (frame, &data) in line.iter().zip(sent) {
            check(&self.harness, "serial_in", data as u64, frame.data as u64, || {
                format!("line frame for {data:#04x}")
            })?;
            if self.codec.parity() {
                let expected = self.codec.parity_bit(data) as u64;
                let actual = frame.parity.unwrap_or(2) as u64;
                check(&self.harness, "serial_in", expected, actual, || {
                    format!("parity bit for {data:#04x}")
                })?;
            }
        }
        Ok(())
    }
}

/// One random word with the consumer always ready.
pub fn one_byte(bench: &Bench, params: UartParams) -> Result<()> {
    let mut tb = UartTb::start(bench, params, "one_byte")?;
    let m = tb.m;
    tb.random_gap(2, m)?;

    tb.harness.drive(READ_READY, 1)?;
    let data = tb.random_word();
    let tx = tb.send(tb.codec.frame(data));
    tb.expect_word(data, 0, 0)?;
    tb.finish(tx)?;
    tb.expect_line(&[data])
}

/// Back-to-back words separated by random idle gaps.
pub fn stress(bench: &Bench, params: UartParams, frames: usize) -> Result<()> {
    let mut tb = UartTb::start(bench, params, "stress")?;
    tb.harness.drive(READ_READY, 1)?;

    let mut sent = Vec::with_capacity(frames);
    for _ in 0..frames {
        let m = tb.m;
        tb.random_gap(0, 3 * m)?;
        let data = tb.random_word();
        let tx = tb.send(tb.codec.frame(data));
        tb.expect_word(data, 0, 0)?;
        tb.finish(tx)?;
        sent.push(data);
    }
    info!(frames, "stress test finished");
    tb.expect_line(&sent)
}

/// With `read_ready` low the decoded word is held until consumed.
pub fn not_ready(bench: &Bench, params: UartParams) -> Result<()> {
    let mut tb = UartTb::start(bench, params, "not_ready")?;
    let m = tb.m;
    tb.random_gap(2, m)?;

    let data = tb.random_word();
    let tx = tb.send(tb.codec.frame(data));
    tb.expect_word(data, 0, 0)?;

    for edge in 1..=5 {
        tb.harness.advance(1)?;
        let valid = tb.harness.capture(READ_VALID)?;
        check(&tb.harness, READ_VALID, 1, valid, || {
            format!("hold {edge} edges with read_ready low")
        })?;
        let actual = tb.harness.capture(READ_DATA)?;
        check(&tb.harness, READ_DATA, data as u64, actual, || {
            format!("hold {edge} edges with read_ready low")
        })?;
    }
    tb.finish(tx)?;

    // Consumed on the first edge with ready high, visible one edge later.
    tb.harness.drive(READ_READY, 1)?;
    tb.harness.advance(2)?;
    let valid = tb.harness.capture(READ_VALID)?;
    check(&tb.harness, READ_VALID, 0, valid, || "raise read_ready".to_owned())
}

/// All-zeros and all-ones words.
pub fn boundary_values(bench: &Bench, params: UartParams) -> Result<()> {
    let mut tb = UartTb::start(bench, params, "boundary_values")?;
    tb.harness.drive(READ_READY, 1)?;

    let words = [0, tb.codec.mask(u32::MAX)];
    for data in words {
        let tx = tb.send(tb.codec.frame(data));
        tb.expect_word(data, 0, 0)?;
        tb.finish(tx)?;
    }
    tb.expect_line(&words)
}

/// A frame with the wrong parity bit raises `parity_error`.
pub fn parity_error(bench: &Bench, params: UartParams) -> Result<()> {
    let mut tb = UartTb::start(bench, params, "parity_error")?;
    tb.harness.drive(READ_READY, 1)?;

    let data = tb.random_word();
    let mut frame = tb.codec.frame(data);
    if let Some(idx) = frame.parity_index(tb.codec.word_width()) {
        frame.levels[idx] ^= 1;
        let tx = tb.send(frame);
        tb.expect_word(data, 1, 0)?;
        tb.finish(tx)?;
    }

    // The next clean frame clears the flag.
    let data = tb.random_word();
    let tx = tb.send(tb.codec.frame(data));
    tb.expect_word(data, 0, 0)?;
    tb.finish(tx)
}

/// A frame whose stop bit is low raises `frame_error`.
pub fn frame_error(bench: &Bench, params: UartParams) -> Result<()> {
    let mut tb = UartTb::start(bench, params, "frame_error")?;

    let data = tb.random_word();
    let mut frame = tb.codec.frame(data);
    let stop = frame.stop_index();
    frame.levels[stop] = 0;
    frame.levels.push(1);

    let tx = tb.send(frame);
    tb.expect_word(data, 0, 1)?;
    tb.finish(tx)
}

/// A word that completes while the previous one is still unread is dropped.
pub fn overrun(bench: &Bench, params: UartParams) -> Result<()> {
    let mut tb = UartTb::start(bench, params, "overrun")?;

    let first = tb.random_word();
    let tx = tb.send(tb.codec.frame(first));
    tb.expect_word(first, 0, 0)?;
    tb.finish(tx)?;

    let second = !first & tb.codec.mask(u32::MAX);
    let tx = tb.send(tb.codec.frame(second));
    tb.finish(tx)?;
    tb.harness.advance(tb.bit_edges)?;

    let stimulus = || format!("send {second:#04x} while {first:#04x} is unread");
    let valid = tb.harness.capture(READ_VALID)?;
    check(&tb.harness, READ_VALID, 1, valid, stimulus)?;
    let actual = tb.harness.capture(READ_DATA)?;
    check(&tb.harness, READ_DATA, first as u64, actual, stimulus)?;
    tb.expect_line(&[first, second])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(word_width: u32, parity: bool) -> UartParams {
        UartParams {
            clk_freq_hz: Bench::default().clk_freq_hz(),
            baud_rate: 115_200,
            word_width,
            parity,
        }
    }

    #[test]
    fn scenarios_pass_against_the_model() {
        let bench = Bench::default();
        for (width, parity) in [(8, false), (7, true)] {
            let params = params(width, parity);
            one_byte(&bench, params).unwrap();
            stress(&bench, params, 3).unwrap();
            not_ready(&bench, params).unwrap();
            boundary_values(&bench, params).unwrap();
            frame_error(&bench, params).unwrap();
            overrun(&bench, params).unwrap();
        }
        parity_error(&bench, params(8, true)).unwrap();
    }

    #[test]
    fn second_word_is_dropped_while_first_is_unread() {
        let bench = Bench::default();
        for parity in [false, true] {
            overrun(&bench, params(8, parity)).unwrap();
        }
    }

    #[test]
    fn driver_finishes_a_full_frame() {
        let bench = Bench::default();
        let mut tb = UartTb::start(&bench, params(8, true), "full_frame").unwrap();
        let tx = tb.send(tb.codec.frame(0xa5));
        tb.finish(tx).unwrap();
        assert!(tb.harness.now() >= tb.codec.frame_duration());
    }
}
