/// Frame recovered from a serial line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedFrame {
    pub data: u32,
    pub parity: Option<u8>,
    pub stop: u8,
}

/// UART frame decoder using transition-based decoding
///
/// Decodes UART serial transmissions from a single-bit line sampled once per
/// clock cycle. Protocol: 1 start bit (0), `word_width` data bits (LSB first),
/// an optional parity bit, 1 stop bit (1). Idle state: line is high (1).
///
/// The decoder re-synchronises on every falling edge seen while idle and samples
/// each bit in the middle of its period.
#[derive(Clone, Debug)]
pub struct UartDecoder {
    prev_line: u8,
    bit_samples: Vec<u8>,    // Sampled bit values, data then parity
    cycles_since_start: u64, // Cycles since start bit detected
    in_frame: bool,
    bit_period: u64, // Bit period in cycles
    word_width: u32,
    parity: bool,
}

impl UartDecoder {
    pub fn new(bit_period: u64, word_width: u32, parity: bool) -> Self {
        Self {
            prev_line: 1, // Idle is high
            bit_samples: Vec::new(),
            cycles_since_start: 0,
            in_frame: false,
            bit_period: bit_period.max(1),
            word_width,
            parity,
        }
    }

    fn payload_bits(&self) -> u64 {
        self.word_width as u64 + self.parity as u64
    }

    /// Process one clock cycle of the line.
    /// Returns `Some(frame)` when a complete frame has been received.
    pub fn process(&mut self, line: u8) -> Option<DecodedFrame> {
        let line_bit = line & 1;
        let prev = std::mem::replace(&mut self.prev_line, line_bit);

        // Detect start bit (falling edge from 1 to 0)
        if !self.in_frame {
            if prev == 1 && line_bit == 0 {
                self.in_frame = true;
                self.cycles_since_start = 0;
                self.bit_samples.clear();
            }
            return None;
        }

        self.cycles_since_start += 1;

        // Bit k (0-based after the start bit) is sampled at (k + 1.5) bit periods
        let next_bit = self.bit_samples.len() as u64;
        let sample_time = |bit: u64| self.bit_period * (bit + 1) + self.bit_period / 2;

        if next_bit < self.payload_bits() {
            if self.cycles_since_start == sample_time(next_bit) {
                self.bit_samples.push(line_bit);
            }
            return None;
        }

        // Finalize at the middle of the stop bit so we are ready to catch
        // the next falling edge immediately after stop.
        if self.cycles_since_start >= sample_time(self.payload_bits()) {
            let frame = self.decode_bits(line_bit);
            self.in_frame = false;
            self.bit_samples.clear();
            self.cycles_since_start = 0;
            return Some(frame);
        }

        None
    }

    fn decode_bits(&self, stop: u8) -> DecodedFrame {
        let (data_bits, parity_bits) = self.bit_samples.split_at(self.word_width as usize);
        let data = data_bits
            .iter()
            .enumerate()
            .fold(0u32, |acc, (i, &bit)| acc | ((bit as u32) << i));
        DecodedFrame {
            data,
            parity: parity_bits.first().copied(),
            stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_for(frame_bits: &[u8], bit_period: u64, idle: u64) -> Vec<u8> {
        let mut line = vec![1; idle as usize];
        for &bit in frame_bits {
            line.extend(std::iter::repeat_n(bit, bit_period as usize));
        }
        line.extend(std::iter::repeat_n(1, bit_period as usize));
        line
    }

    fn decode(decoder: &mut UartDecoder, line: &[u8]) -> Vec<DecodedFrame> {
        line.iter().filter_map(|&bit| decoder.process(bit)).collect()
    }

    #[test]
    fn decodes_eight_bit_frame() {
        // 0xa5 LSB first: 1 0 1 0 0 1 0 1
        let bits = [0, 1, 0, 1, 0, 0, 1, 0, 1, 1];
        let mut decoder = UartDecoder::new(16, 8, false);
        let frames = decode(&mut decoder, &line_for(&bits, 16, 5));
        assert_eq!(
            frames,
            vec![DecodedFrame {
                data: 0xa5,
                parity: None,
                stop: 1
            }]
        );
    }

    #[test]
    fn decodes_parity_bit_and_back_to_back_frames() {
        let first = [0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
        let second = [0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1];
        let mut line = line_for(&first, 10, 3);
        line.extend(line_for(&second, 10, 0));
        let mut decoder = UartDecoder::new(10, 8, true);
        let frames = decode(&mut decoder, &line);
        assert_eq!(frames.len(), 2);
        assert_eq!((frames[0].data, frames[0].parity), (0xff, Some(1)));
        assert_eq!((frames[1].data, frames[1].parity), (0x00, Some(1)));
    }
}
