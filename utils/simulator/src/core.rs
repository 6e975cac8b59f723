use std::path::Path;

use tracing::{debug, info};

use crate::error::{Result, SimError};
use crate::kernel::{Kernel, Process, ProcessHandle, SimTime};
use crate::models::Model;
use crate::signal::SignalId;
use crate::vcd::VcdTrace;

const RESET_SIGNAL: &str = "reset_n";
const CLOCK_SIGNAL: &str = "clock";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    pub period_ns: SimTime,
}

impl ClockConfig {
    pub fn new(period_ns: SimTime) -> Result<Self> {
        if period_ns < 2 {
            return Err(SimError::InvalidConfig(format!(
                "clock period must be at least 2 ns, got {period_ns}"
            )));
        }
        Ok(Self { period_ns })
    }

    pub fn freq_hz(&self) -> u64 {
        1_000_000_000 / self.period_ns
    }

    fn half_period(&self) -> SimTime {
        self.period_ns / 2
    }
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { period_ns: 10 }
    }
}

/// Active-low reset pulse: `reset_n` is held high for `pre_edges`, low for
/// `hold_edges`, then released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetConfig {
    pub pre_edges: u64,
    pub hold_edges: u64,
}

impl ResetConfig {
    pub fn new(pre_edges: u64, hold_edges: u64) -> Result<Self> {
        let config = Self {
            pre_edges,
            hold_edges,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.hold_edges == 0 {
            return Err(SimError::InvalidConfig(
                "reset must be held low for at least one edge".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn edges(&self) -> u64 {
        self.pre_edges + self.hold_edges
    }
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            pre_edges: 1,
            hold_edges: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HarnessState {
    Unreset,
    InReset,
    Running,
}

/// Clock, reset and drive/wait/capture around one model.
///
/// The clock starts low at time zero and rises at `period / 2 + k * period`.
/// At every rising edge the harness settles combinational logic, samples all
/// signals, then applies the model's synchronous update. [`capture`] returns
/// the sampled value, so a registered output shows the result of the
/// previous edge.
///
/// [`capture`]: Harness::capture
pub struct Harness {
    model: Box<dyn Model>,
    clock: ClockConfig,
    reset: ResetConfig,
    kernel: Kernel,
    clock_id: Option<SignalId>,
    now: SimTime,
    cycle: u64,
    released_at: Option<u64>,
    state: HarnessState,
    sampled: Vec<u64>,
    trace: Option<VcdTrace>,
}

impl Harness {
    pub fn new(model: Box<dyn Model>, clock: ClockConfig, reset: ResetConfig) -> Result<Self> {
        reset.validate()?;
        let bus = model.bus();
        let clock_id = bus.id(CLOCK_SIGNAL).ok();
        bus.id(RESET_SIGNAL)?;
        let sampled = bus.values().to_vec();

        Ok(Self {
            model,
            clock,
            reset,
            kernel: Kernel::new(),
            clock_id,
            now: 0,
            cycle: 0,
            released_at: None,
            state: HarnessState::Unreset,
            sampled,
            trace: None,
        })
    }

    pub fn model(&self) -> &dyn Model {
        self.model.as_ref()
    }

    pub fn clock(&self) -> ClockConfig {
        self.clock
    }

    pub fn state(&self) -> HarnessState {
        self.state
    }

    /// Rising edges since construction.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Start dumping every bus signal to a VCD file.
    pub fn open_vcd(&mut self, path: &Path) -> Result<()> {
        let trace = VcdTrace::create(path, self.model.name(), self.model.bus())?;
        debug!(path = %path.display(), "opened waveform trace");
        self.trace = Some(trace);
        Ok(())
    }

    pub fn close_vcd(&mut self) {
        self.trace = None;
    }

    /// Run the reset pulse. Returns the number of edges it took.
    pub fn reset(&mut self) -> Result<u64> {
        info!(
            model = self.model.name(),
            pre = self.reset.pre_edges,
            hold = self.reset.hold_edges,
            "applying reset"
        );
        self.state = HarnessState::InReset;
        self.released_at = None;

        self.drive(RESET_SIGNAL, 1)?;
        self.advance(self.reset.pre_edges)?;
        self.drive(RESET_SIGNAL, 0)?;
        self.advance(self.reset.hold_edges)?;
        self.drive(RESET_SIGNAL, 1)?;

        self.state = HarnessState::Running;
        self.released_at = Some(self.cycle);
        debug!(cycle = self.cycle, "reset released");
        Ok(self.reset.edges())
    }

    /// Set an input; it is sampled by the next rising edge.
    pub fn drive(&mut self, name: &str, value: u64) -> Result<()> {
        self.model.bus_mut().write(name, value)
    }

    /// Run until `edges` more rising edges have happened.
    pub fn advance(&mut self, edges: u64) -> Result<()> {
        let target = self.cycle + edges;
        while self.cycle < target {
            self.step_edge()?;
        }
        Ok(())
    }

    /// Value of `name` sampled at the most recent rising edge.
    pub fn capture(&self, name: &str) -> Result<u64> {
        let id = self.model.bus().id(name)?;
        match (self.state, self.released_at) {
            (HarnessState::Running, Some(released)) if self.cycle > released => {
                Ok(self.sampled[id.index()])
            }
            _ => Err(SimError::CaptureBeforeEdge {
                signal: name.to_owned(),
            }),
        }
    }

    /// Advance edge by edge until the sampled `name` equals `value`.
    /// Returns the number of edges waited.
    pub fn wait_until(&mut self, name: &str, value: u64, max_edges: u64) -> Result<u64> {
        let id = self.model.bus().id(name)?;
        let value = value & self.model.bus().signal(id).mask();
        for waited in 1..=max_edges {
            self.step_edge()?;
            if self.sampled[id.index()] == value {
                return Ok(waited);
            }
        }
        Err(SimError::WaitTimeout {
            signal: name.to_owned(),
            value,
            edges: max_edges,
        })
    }

    /// Advance simulated time by `duration` nanoseconds.
    pub fn wait_time(&mut self, duration: SimTime) -> Result<()> {
        let target = self.now + duration;
        while self.next_edge_time() <= target {
            self.step_edge()?;
        }
        self.kernel
            .run_timers(target, self.cycle, self.model.bus_mut(), &self.sampled)?;
        self.now = target;
        Ok(())
    }

    pub fn spawn(&mut self, process: Box<dyn Process>) -> ProcessHandle {
        self.kernel.spawn(process, self.now)
    }

    pub fn is_done(&self, handle: ProcessHandle) -> Result<bool> {
        self.kernel.is_done(handle)
    }

    /// Advance until the process has finished, for at most `max_edges` edges.
    pub fn join(&mut self, handle: ProcessHandle, max_edges: u64) -> Result<()> {
        for _ in 0..max_edges {
            if self.kernel.is_done(handle)? {
                return Ok(());
            }
            self.step_edge()?;
        }
        if self.kernel.is_done(handle)? {
            return Ok(());
        }
        Err(SimError::JoinTimeout {
            name: self.kernel.name(handle)?.to_owned(),
            edges: max_edges,
        })
    }

    fn next_edge_time(&self) -> SimTime {
        self.clock.half_period() + self.cycle * self.clock.period_ns
    }

    /// Fire timers due up to the next edge, then take the edge.
    fn step_edge(&mut self) -> Result<()> {
        let edge = self.next_edge_time();
        self.kernel
            .run_timers(edge, self.cycle, self.model.bus_mut(), &self.sampled)?;
        self.now = edge;

        if let Some(clock) = self.clock_id {
            self.model.bus_mut().set(clock, 1);
        }
        self.model.eval();
        self.sampled.copy_from_slice(self.model.bus().values());
        self.model.step();
        self.model.eval();
        self.cycle += 1;

        if let Some(trace) = &mut self.trace {
            trace.record(edge, self.model.bus())?;
        }
        if let Some(clock) = self.clock_id {
            self.model.bus_mut().set(clock, 0);
            if let Some(trace) = &mut self.trace {
                trace.record(edge + self.clock.half_period(), self.model.bus())?;
            }
        }

        self.kernel
            .on_edge(edge, self.cycle, self.model.bus_mut(), &self.sampled)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::baud_gen::BaudGenModel;
    use crate::kernel::{ProcessContext, Wait};
    use crate::register_file::RegFileModel;

    fn regfile() -> Harness {
        Harness::new(
            Box::new(RegFileModel::new()),
            ClockConfig::default(),
            ResetConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn reset_must_hold_for_an_edge() {
        assert!(matches!(ResetConfig::new(1, 0), Err(SimError::InvalidConfig(_))));
        assert_eq!(ResetConfig::new(1, 2).unwrap(), ResetConfig::default());

        let unchecked = ResetConfig {
            pre_edges: 3,
            hold_edges: 0,
        };
        let err = Harness::new(Box::new(RegFileModel::new()), ClockConfig::default(), unchecked);
        assert!(matches!(err, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn reset_walks_through_states() {
        let mut h = regfile();
        assert_eq!(h.state(), HarnessState::Unreset);
        assert_eq!(h.reset().unwrap(), 3);
        assert_eq!(h.state(), HarnessState::Running);
        assert_eq!(h.cycle(), 3);
        assert_eq!(h.now(), 25);
    }

    #[test]
    fn capture_requires_an_edge_after_release() {
        let mut h = regfile();
        assert!(matches!(
            h.capture("read_data_port1"),
            Err(SimError::CaptureBeforeEdge { .. })
        ));
        h.reset().unwrap();
        assert!(h.capture("read_data_port1").is_err());
        h.advance(1).unwrap();
        assert_eq!(h.capture("read_data_port1").unwrap(), 0);
        assert!(matches!(h.capture("nope"), Err(SimError::UnknownSignal(_))));
    }

    #[test]
    fn registered_output_is_seen_one_edge_later() {
        let mut h = regfile();
        h.reset().unwrap();
        h.drive("write_addr", 4).unwrap();
        h.drive("write_data", 0x1234).unwrap();
        h.drive("write_enable", 1).unwrap();
        h.drive("read_addr_port1", 4).unwrap();
        h.advance(1).unwrap();
        h.drive("write_enable", 0).unwrap();
        h.advance(1).unwrap();
        // Read at the write edge returned the old value.
        assert_eq!(h.capture("read_data_port1").unwrap(), 0);
        h.advance(1).unwrap();
        assert_eq!(h.capture("read_data_port1").unwrap(), 0x1234);
    }

    #[test]
    fn drives_after_an_edge_do_not_change_the_capture() {
        let mut h = regfile();
        h.reset().unwrap();
        h.advance(1).unwrap();
        h.drive("read_addr_port1", 9).unwrap();
        assert_eq!(h.capture("read_addr_port1").unwrap(), 0);
    }

    #[test]
    fn baud_tick_after_divisor_edges() {
        let model = BaudGenModel::new(100_000_000, 115_200).unwrap();
        let m = model.divisor();
        let mut h = Harness::new(Box::new(model), ClockConfig::default(), ResetConfig::default())
            .unwrap();
        h.reset().unwrap();
        for _ in 0..3 {
            h.advance(m - 1).unwrap();
            assert_eq!(h.capture("tick").unwrap(), 0);
            h.advance(1).unwrap();
            assert_eq!(h.capture("tick").unwrap(), 1);
        }
    }

    #[test]
    fn wait_until_times_out() {
        let mut h = regfile();
        h.reset().unwrap();
        let err = h.wait_until("read_data_port2", 1, 4).unwrap_err();
        assert!(matches!(err, SimError::WaitTimeout { edges: 4, .. }));
        assert_eq!(h.cycle(), 7);
    }

    #[test]
    fn timers_drive_before_the_edge_they_coincide_with() {
        let mut h = regfile();
        h.reset().unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut step = 0;
        let handle = h.spawn(Box::new(move |cx: &mut ProcessContext<'_>| {
            log.borrow_mut().push(cx.now());
            step += 1;
            cx.drive("read_addr_port1", step)?;
            Ok(if step < 3 { Wait::Time(10) } else { Wait::Done })
        }));
        h.join(handle, 10).unwrap();
        assert_eq!(*seen.borrow(), vec![25, 35, 45]);

        h.wait_time(1).unwrap();
        assert_eq!(h.capture("read_addr_port1").unwrap(), 3);
    }
}
