use rand::Rng;
use simulator::{Harness, RegFileModel};
use tracing::{debug, info};

use super::{Bench, check};
use crate::error::Result;
use crate::golden::{GoldenRegisterFile, ReadPort};
use crate::oracle::{CycleModel, Observation, Oracle, Probe};

pub const BOUNDARY_VALUES: [u32; 6] = [
    0x0000_0000,
    0xffff_ffff,
    0x8000_0000,
    0x7fff_ffff,
    0x5555_5555,
    0xaaaa_aaaa,
];

/// One cycle of register file inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegFileStimulus {
    pub write_addr: u8,
    pub write_data: u32,
    pub write_enable: bool,
    pub read_addr: [u8; 2],
}

impl RegFileStimulus {
    pub fn write(addr: u8, data: u32) -> Self {
        Self {
            write_addr: addr,
            write_data: data,
            write_enable: true,
            ..Self::default()
        }
    }

    pub fn read(port1: u8, port2: u8) -> Self {
        Self {
            read_addr: [port1, port2],
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegFileObservation {
    pub read_data: [u32; 2],
}

impl Observation for RegFileObservation {
    fn probes(&self) -> Vec<Probe> {
        vec![
            Probe::new(ReadPort::One.data_signal(), self.read_data[0] as u64, 32),
            Probe::new(ReadPort::Two.data_signal(), self.read_data[1] as u64, 32),
        ]
    }
}

/// The simulated register file behind a harness.
pub struct RegFileDut<'h> {
    harness: &'h mut Harness,
}

impl<'h> RegFileDut<'h> {
    pub fn new(harness: &'h mut Harness) -> Self {
        Self { harness }
    }
}

impl CycleModel for RegFileDut<'_> {
    type Stimulus = RegFileStimulus;
    type Observation = RegFileObservation;

    fn apply_stimulus(&mut self, stimulus: &RegFileStimulus) -> Result<()> {
        let h = &mut *self.harness;
        h.drive("write_addr", stimulus.write_addr as u64)?;
        h.drive("write_data", stimulus.write_data as u64)?;
        h.drive("write_enable", stimulus.write_enable as u64)?;
        h.drive("read_addr_port1", stimulus.read_addr[0] as u64)?;
        h.drive("read_addr_port2", stimulus.read_addr[1] as u64)?;
        h.advance(1)?;
        Ok(())
    }

    fn observe(&self) -> Result<RegFileObservation> {
        let capture = |port: ReadPort| self.harness.capture(port.data_signal());
        Ok(RegFileObservation {
            read_data: [capture(ReadPort::One)? as u32, capture(ReadPort::Two)? as u32],
        })
    }
}

/// Golden register file with the DUT's registered read ports.
#[derive(Default)]
pub struct RegFileReference {
    regs: GoldenRegisterFile,
    latched: [u32; 2],
    sampled: [u32; 2],
}

impl RegFileReference {
    pub fn regs(&self) -> &GoldenRegisterFile {
        &self.regs
    }
}

impl CycleModel for RegFileReference {
    type Stimulus = RegFileStimulus;
    type Observation = RegFileObservation;

    fn apply_stimulus(&mut self, stimulus: &RegFileStimulus) -> Result<()> {
        self.sampled = self.latched;
        self.latched = [
            self.regs.read(stimulus.read_addr[0], ReadPort::One),
            self.regs.read(stimulus.read_addr[1], ReadPort::Two),
        ];
        self.regs.write(
            stimulus.write_addr,
            stimulus.write_data,
            stimulus.write_enable,
        );
        self.regs.tick();
        Ok(())
    }

    fn observe(&self) -> Result<RegFileObservation> {
        Ok(RegFileObservation {
            read_data: self.sampled,
        })
    }
}

/// Register file harness paired with a golden model that tracks every write.
struct RegFileDriver {
    harness: Harness,
    golden: GoldenRegisterFile,
}

impl RegFileDriver {
    fn start(bench: &Bench, trace_name: &str) -> Result<Self> {
        let mut harness = bench.harness(Box::new(RegFileModel::new()), trace_name)?;
        for signal in [
            "read_addr_port1",
            "read_addr_port2",
            "write_addr",
            "write_data",
            "write_enable",
        ] {
            harness.drive(signal, 0)?;
        }
        harness.advance(1)?;
        Ok(Self {
            harness,
            golden: GoldenRegisterFile::new(),
        })
    }

    fn write(&mut self, addr: u8, data: u32, enable: bool) -> Result<()> {
        self.harness.drive("write_addr", addr as u64)?;
        self.harness.drive("write_data", data as u64)?;
        self.harness.drive("write_enable", enable as u64)?;
        self.harness.advance(1)?;
        self.harness.drive("write_enable", 0)?;
        self.golden.write(addr, data, enable);
        self.golden.tick();
        debug!("wrote {data:#010x} to x{addr}");
        Ok(())
    }

    /// Fill x1..x31 with random words.
    fn fill_random(&mut self, rng: &mut impl Rng) -> Result<()> {
        for addr in 1..32 {
            self.write(addr, rng.r#gen(), true)?;
        }
        Ok(())
    }

    fn launch(&mut self, port: ReadPort, addr: u8) -> Result<()> {
        self.harness.drive(port.addr_signal(), addr as u64)?;
        self.harness.advance(1)?;
        Ok(())
    }

    fn launch_dual(&mut self, addr: (u8, u8)) -> Result<()> {
        self.harness.drive(ReadPort::One.addr_signal(), addr.0 as u64)?;
        self.harness.drive(ReadPort::Two.addr_signal(), addr.1 as u64)?;
        self.harness.advance(1)?;
        Ok(())
    }

    fn capture(&self, port: ReadPort) -> Result<u32> {
        Ok(self.harness.capture(port.data_signal())? as u32)
    }

    fn expect(&self, port: ReadPort, expected: u32, what: impl FnOnce() -> String) -> Result<()> {
        let actual = self.capture(port)?;
        check(
            &self.harness,
            port.data_signal(),
            expected as u64,
            actual as u64,
            what,
        )
    }
}

/// Write x1..x31 with seeded random words, then read every register on both
/// ports. The golden model is checked at every cycle; every read must also
/// return the last word written to that register, and x0 must read zero.
pub fn fill_and_sweep(bench: &Bench) -> Result<()> {
    let mut harness = bench.harness(Box::new(RegFileModel::new()), "regfile_fill_and_sweep")?;
    let mut rng = bench.rng(0);

    let mut last_write = [0u32; 32];
    let mut stimuli = Vec::new();
    for addr in 1..32u8 {
        let data = rng.r#gen();
        last_write[addr as usize] = data;
        stimuli.push(RegFileStimulus::write(addr, data));
    }
    stimuli.push(RegFileStimulus::write(0, rng.r#gen()));
    stimuli.extend((0..32).map(|addr| RegFileStimulus::read(addr, 31 - addr)));
    stimuli.extend((0..32).map(|addr| RegFileStimulus::read(addr, addr)));
    stimuli.push(RegFileStimulus::default());

    let mut oracle = Oracle::new(RegFileDut::new(&mut harness), RegFileReference::default());
    let mut prev: Option<RegFileStimulus> = None;
    for stimulus in &stimuli {
        let observed = oracle.step(stimulus)?;
        // Reads show up one cycle after their address was presented.
        if let Some(prev) = prev {
            for (idx, port) in ReadPort::ALL.into_iter().enumerate() {
                let addr = prev.read_addr[idx];
                check(
                    &*oracle.dut().harness,
                    port.data_signal(),
                    last_write[addr as usize] as u64,
                    observed.read_data[idx] as u64,
                    || format!("read x{addr} on {port}"),
                )?;
            }
        }
        prev = Some(*stimulus);
    }

    info!(cycles = oracle.cycle(), "register sweep matched golden model");
    Ok(())
}

/// Sweep one read port over every register, one address per cycle.
pub fn rw_single(bench: &Bench, port: ReadPort) -> Result<()> {
    let mut tb = RegFileDriver::start(bench, &format!("regfile_rw_single_{port}"))?;
    let mut rng = bench.rng(1);
    tb.fill_random(&mut rng)?;

    let mut expected = tb.golden.read(0, port);
    tb.launch(port, 0)?;
    for addr in 1..32 {
        tb.launch(port, addr)?;
        tb.expect(port, expected, || format!("read x{} on {port}", addr - 1))?;
        expected = tb.golden.read(addr, port);
    }
    Ok(())
}

/// Random address pairs on both ports at once.
pub fn rw_dual(bench: &Bench) -> Result<()> {
    let mut tb = RegFileDriver::start(bench, "regfile_rw_dual")?;
    let mut rng = bench.rng(2);
    tb.fill_random(&mut rng)?;

    let pattern: Vec<(u8, u8)> = (0..10)
        .map(|_| (rng.gen_range(0..32), rng.gen_range(0..32)))
        .collect();

    let mut prev = pattern[0];
    tb.launch_dual(prev)?;
    for &pair in &pattern[1..] {
        tb.launch_dual(pair)?;
        let stimulus = || format!("read x{} / x{}", prev.0, prev.1);
        tb.expect(ReadPort::One, tb.golden.read(prev.0, ReadPort::One), stimulus)?;
        tb.expect(ReadPort::Two, tb.golden.read(prev.1, ReadPort::Two), stimulus)?;
        prev = pair;
    }
    Ok(())
}

/// A read launched in the same cycle as a write returns the old value.
pub fn read_during_write(bench: &Bench) -> Result<()> {
    let mut tb = RegFileDriver::start(bench, "regfile_read_during_write")?;
    let mut rng = bench.rng(3);
    let addr = rng.gen_range(1..32);
    let values: (u32, u32) = (rng.r#gen(), rng.r#gen());

    tb.write(addr, values.0, true)?;
    tb.harness.drive(ReadPort::One.addr_signal(), addr as u64)?;
    tb.write(addr, values.1, true)?;

    tb.harness.advance(1)?;
    tb.expect(ReadPort::One, values.0, || {
        format!("read x{addr} while writing {:#010x}", values.1)
    })?;

    tb.harness.advance(1)?;
    tb.expect(ReadPort::One, values.1, || format!("read x{addr} after the write"))
}

/// A write with enable low leaves the register untouched.
pub fn write_enable(bench: &Bench) -> Result<()> {
    let mut tb = RegFileDriver::start(bench, "regfile_write_enable")?;
    tb.write(10, 0x1234_5678, true)?;
    tb.write(10, 0xdead_beef, false)?;

    tb.launch(ReadPort::One, 10)?;
    tb.harness.advance(1)?;
    tb.expect(ReadPort::One, 0x1234_5678, || {
        "read x10 after a disabled write".to_owned()
    })
}

/// Writes to x0 are discarded.
pub fn x0_hardwired(bench: &Bench) -> Result<()> {
    let mut tb = RegFileDriver::start(bench, "regfile_x0_hardwired")?;
    tb.write(0, 0xdead_beef, true)?;

    tb.launch_dual((0, 0))?;
    tb.harness.advance(1)?;
    for port in ReadPort::ALL {
        tb.expect(port, 0, || format!("read x0 on {port}"))?;
    }
    Ok(())
}

pub fn boundary_values(bench: &Bench, port: ReadPort) -> Result<()> {
    let mut tb = RegFileDriver::start(bench, &format!("regfile_boundary_values_{port}"))?;
    for (addr, value) in (1u8..).zip(BOUNDARY_VALUES) {
        tb.write(addr, value, true)?;
        tb.launch(port, addr)?;
        tb.harness.advance(1)?;
        tb.expect(port, value, || format!("read back {value:#010x} from x{addr}"))?;
    }
    Ok(())
}

/// A second reset pulse clears every register.
pub fn reset_clears(bench: &Bench) -> Result<()> {
    let mut tb = RegFileDriver::start(bench, "regfile_reset_clears")?;
    tb.harness.advance(1)?;
    for addr in 1..5 {
        tb.write(addr, 0xdead_beef, true)?;
    }

    tb.harness.reset()?;
    tb.golden.reset();

    for addr in 0..32 {
        tb.launch(ReadPort::One, addr)?;
        tb.harness.advance(1)?;
        tb.expect(ReadPort::One, tb.golden.read(addr, ReadPort::One), || {
            format!("read x{addr} after reset")
        })?;
    }
    Ok(())
}
