use rand::Rng;
use simulator::{Harness, InsnMemModel};
use tracing::debug;

use super::{Bench, check};
use crate::config::MemoryParams;
use crate::error::Result;
use crate::golden::{Fetch, GoldenAddressableMemory};
use crate::hex::HexImage;
use crate::oracle::{CycleModel, Observation, Oracle, Probe};

const INSTRUCTION_WORD: &str = "instruction_word";
const ALIGNMENT_EXCEPTION: &str = "alignment_exception";

impl Observation for Fetch {
    fn probes(&self) -> Vec<Probe> {
        vec![
            Probe::new(INSTRUCTION_WORD, self.word as u64, 32),
            Probe::new(ALIGNMENT_EXCEPTION, self.exception as u64, 1),
        ]
    }
}

/// The simulated instruction memory behind a harness; the stimulus is the
/// program counter.
pub struct InsnMemDut<'h> {
    harness: &'h mut Harness,
}

impl<'h> InsnMemDut<'h> {
    pub fn new(harness: &'h mut Harness) -> Self {
        Self { harness }
    }
}

impl CycleModel for InsnMemDut<'_> {
    type Stimulus = u32;
    type Observation = Fetch;

    fn apply_stimulus(&mut self, pc: &u32) -> Result<()> {
        set_pc_and_wait(self.harness, *pc)
    }

    fn observe(&self) -> Result<Fetch> {
        Ok(Fetch {
            word: self.harness.capture(INSTRUCTION_WORD)? as u32,
            exception: self.harness.capture(ALIGNMENT_EXCEPTION)? != 0,
        })
    }
}

/// Golden memory with the DUT's one-cycle fetch latency: the word belongs
/// to the previous address, the exception to the current one.
pub struct InsnMemReference {
    mem: GoldenAddressableMemory,
    latched: u32,
    sampled: Fetch,
}

impl InsnMemReference {
    pub fn new(mem: GoldenAddressableMemory) -> Self {
        Self {
            mem,
            latched: 0,
            sampled: Fetch {
                word: 0,
                exception: false,
            },
        }
    }
}

impl CycleModel for InsnMemReference {
    type Stimulus = u32;
    type Observation = Fetch;

    fn apply_stimulus(&mut self, pc: &u32) -> Result<()> {
        let fetch = self.mem.fetch(*pc);
        self.sampled = Fetch {
            word: self.latched,
            exception: fetch.exception,
        };
        self.latched = fetch.word;
        Ok(())
    }

    fn observe(&self) -> Result<Fetch> {
        Ok(self.sampled)
    }
}

fn set_pc_and_wait(harness: &mut Harness, pc: u32) -> Result<()> {
    harness.drive("program_counter", pc as u64)?;
    harness.advance(1)?;
    Ok(())
}

fn start(
    bench: &Bench,
    image: &HexImage,
    params: MemoryParams,
    scenario: &str,
) -> Result<(Harness, GoldenAddressableMemory)> {
    let golden = GoldenAddressableMemory::new(image, params.size)?;
    let model = InsnMemModel::new(params.size, image.bytes())?;
    let mut harness = bench.harness(
        Box::new(model),
        &format!("insnmem_{scenario}_{}", params.size),
    )?;
    set_pc_and_wait(&mut harness, 0)?;
    Ok((harness, golden))
}

fn expect_word(harness: &Harness, expected: u32, pc: u32) -> Result<()> {
    let actual = harness.capture(INSTRUCTION_WORD)?;
    check(harness, INSTRUCTION_WORD, expected as u64, actual, || {
        format!("fetch pc={pc:#010x}")
    })
}

/// The first word of the image comes out one edge after its address.
pub fn basic_read(bench: &Bench, image: &HexImage, params: MemoryParams) -> Result<()> {
    let (mut harness, golden) = start(bench, image, params, "basic_read")?;
    set_pc_and_wait(&mut harness, 0)?;
    harness.advance(1)?;
    expect_word(&harness, golden.fetch(0).word, 0)
}

/// Every address in 0..100 raises the exception exactly when unaligned.
pub fn nonaligned_exception(bench: &Bench, image: &HexImage, params: MemoryParams) -> Result<()> {
    let (mut harness, golden) = start(bench, image, params, "nonaligned_exception")?;
    for pc in 0..100 {
        set_pc_and_wait(&mut harness, pc)?;
        let actual = harness.capture(ALIGNMENT_EXCEPTION)?;
        check(
            &harness,
            ALIGNMENT_EXCEPTION,
            golden.fetch(pc).exception as u64,
            actual,
            || format!("present pc={pc:#x}"),
        )?;
    }
    Ok(())
}

/// 100 random word addresses, checked through a one-deep address pipeline.
pub fn read_varied(bench: &Bench, image: &HexImage, params: MemoryParams) -> Result<()> {
    let (mut harness, golden) = start(bench, image, params, "read_varied")?;
    let mut rng = bench.rng(params.size as u64);
    let words = (params.size / 4) as u32;
    let addresses: Vec<u32> = (0..100).map(|_| rng.gen_range(0..words) << 2).collect();

    let mut prev = addresses[0];
    set_pc_and_wait(&mut harness, prev)?;
    for &pc in &addresses[1..] {
        set_pc_and_wait(&mut harness, pc)?;
        expect_word(&harness, golden.fetch(prev).word, prev)?;
        debug!("pc {prev:#x}: instruction {:#010x}", golden.fetch(prev).word);
        prev = pc;
    }
    Ok(())
}

/// Sequential fetch of pc = 0, 4, ..., 36 returns the first ten words in order.
pub fn pc_sequence(bench: &Bench, image: &HexImage, params: MemoryParams) -> Result<()> {
    let (mut harness, _) = start(bench, image, params, "pc_sequence")?;
    let expected: Vec<u32> = image.words().chain(std::iter::repeat(0)).take(10).collect();

    set_pc_and_wait(&mut harness, 0)?;
    for (idx, pc) in (4..=40).step_by(4).enumerate() {
        set_pc_and_wait(&mut harness, pc)?;
        expect_word(&harness, expected[idx], pc - 4)?;
    }
    Ok(())
}

/// Random aligned, unaligned and out-of-range fetches against the golden model.
pub fn oracle_random(bench: &Bench, image: &HexImage, params: MemoryParams) -> Result<()> {
    let (mut harness, golden) = start(bench, image, params, "oracle_random")?;
    let mut rng = bench.rng(!(params.size as u64));
    let limit = params.size as u32 + 16;
    let stimuli: Vec<u32> = (0..200).map(|_| rng.gen_range(0..limit)).collect();

    let mut reference = InsnMemReference::new(golden);
    reference.apply_stimulus(&0)?;
    let mut oracle = Oracle::new(InsnMemDut::new(&mut harness), reference);
    oracle.run(&stimuli)
}
