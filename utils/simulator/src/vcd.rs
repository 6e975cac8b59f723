use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use vcd::{IdCode, TimescaleUnit, Value, Writer};

use crate::error::Result;
use crate::kernel::SimTime;
use crate::signal::SignalBus;

/// Waveform dump of every signal on a bus, written at each clock transition.
pub struct VcdTrace {
    writer: Writer<BufWriter<File>>,
    wires: Vec<(IdCode, u32)>,
    last: Vec<Option<u64>>,
    time: Option<SimTime>,
}

impl VcdTrace {
    pub fn create(path: &Path, scope: &str, bus: &SignalBus) -> Result<Self> {
        let file = File::create(path)?;
        let mut writer = Writer::new(BufWriter::new(file));

        writer.timescale(1, TimescaleUnit::NS)?;
        writer.add_module(scope)?;
        let wires = bus
            .io()
            .iter()
            .map(|signal| {
                writer
                    .add_wire(signal.num_bits, signal.name)
                    .map(|id| (id, signal.num_bits))
            })
            .collect::<std::io::Result<Vec<_>>>()?;
        writer.upscope()?;
        writer.enddefinitions()?;

        Ok(Self {
            writer,
            last: vec![None; wires.len()],
            wires,
            time: None,
        })
    }

    /// Record the signals that changed since the previous call.
    pub fn record(&mut self, time: SimTime, bus: &SignalBus) -> Result<()> {
        for ((&(id, width), last), &value) in self
            .wires
            .iter()
            .zip(self.last.iter_mut())
            .zip(bus.values())
        {
            if *last == Some(value) {
                continue;
            }
            if self.time != Some(time) {
                self.writer.timestamp(time)?;
                self.time = Some(time);
            }
            if width == 1 {
                let bit = if value & 1 == 1 { Value::V1 } else { Value::V0 };
                self.writer.change_scalar(id, bit)?;
            } else {
                self.writer.change_vector(id, to_bits(value, width))?;
            }
            *last = Some(value);
        }
        Ok(())
    }
}

// MSB first
fn to_bits(value: u64, width: u32) -> Vec<Value> {
    (0..width)
        .rev()
        .map(|i| {
            if (value >> i) & 1 == 1 {
                Value::V1
            } else {
                Value::V0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Signal;

    #[test]
    fn writes_header_and_changes_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.vcd");
        let mut bus = SignalBus::new(&[Signal::input("clock", 1), Signal::output("data", 4)]);

        let mut trace = VcdTrace::create(&path, "dut", &bus).unwrap();
        trace.record(5, &bus).unwrap();
        trace.record(10, &bus).unwrap();
        let data = bus.id("data").unwrap();
        bus.set(data, 0b1010);
        trace.record(15, &bus).unwrap();
        drop(trace);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("$scope module dut $end"));
        assert!(text.contains("#5"));
        assert!(!text.contains("#10"));
        assert!(text.contains("#15"));
        assert!(text.contains("b1010"));
    }
}
