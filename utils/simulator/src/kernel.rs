use std::cmp::Reverse;
use std::collections::BinaryHeap;

use tracing::trace;

use crate::error::{Result, SimError};
use crate::signal::{SignalBus, SignalId};

/// Simulated time in nanoseconds.
pub type SimTime = u64;

/// What a process waits for before it is resumed again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Resume after this many rising edges. `Edges(0)` resumes at the current time.
    Edges(u64),
    /// Resume after this much simulated time.
    Time(SimTime),
    /// Resume at the first edge, after this one, whose sampled value of
    /// `signal` equals `value`.
    Until { signal: String, value: u64 },
    /// The process has finished.
    Done,
}

/// View of the simulation handed to a process while it runs.
pub struct ProcessContext<'a> {
    now: SimTime,
    cycle: u64,
    bus: &'a mut SignalBus,
    sampled: &'a [u64],
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(now: SimTime, cycle: u64, bus: &'a mut SignalBus, sampled: &'a [u64]) -> Self {
        Self {
            now,
            cycle,
            bus,
            sampled,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Rising edges elapsed since the harness was created.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn drive(&mut self, name: &str, value: u64) -> Result<()> {
        self.bus.write(name, value)
    }

    /// Value of `name` sampled at the most recent rising edge.
    pub fn sampled(&self, name: &str) -> Result<u64> {
        let id = self.bus.id(name)?;
        Ok(self.sampled[id.index()])
    }
}

/// A cooperatively scheduled stimulus or monitor.
pub trait Process {
    fn name(&self) -> &str {
        "process"
    }

    fn resume(&mut self, cx: &mut ProcessContext<'_>) -> Result<Wait>;
}

impl<F> Process for F
where
    F: FnMut(&mut ProcessContext<'_>) -> Result<Wait>,
{
    fn resume(&mut self, cx: &mut ProcessContext<'_>) -> Result<Wait> {
        self(cx)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessHandle(usize);

struct Slot {
    name: String,
    process: Option<Box<dyn Process>>,
}

struct UntilWaiter {
    id: usize,
    signal: SignalId,
    value: u64,
}

/// Discrete-event scheduler for processes.
///
/// Timers are ordered by `(time, sequence)`, edge waiters by
/// `(edge, sequence)`. The harness owns time: it fires due timers and reports
/// every rising edge.
#[derive(Default)]
pub struct Kernel {
    slots: Vec<Slot>,
    timers: BinaryHeap<Reverse<(SimTime, u64, usize)>>,
    edge_waiters: BinaryHeap<Reverse<(u64, u64, usize)>>,
    until_waiters: Vec<UntilWaiter>,
    seq: u64,
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a process; it first runs at `now`.
    pub fn spawn(&mut self, process: Box<dyn Process>, now: SimTime) -> ProcessHandle {
        let id = self.slots.len();
        self.slots.push(Slot {
            name: process.name().to_owned(),
            process: Some(process),
        });
        self.schedule_timer(now, id);
        trace!(id, name = %self.slots[id].name, "spawned process");
        ProcessHandle(id)
    }

    pub fn is_done(&self, handle: ProcessHandle) -> Result<bool> {
        self.slots
            .get(handle.0)
            .map(|slot| slot.process.is_none())
            .ok_or(SimError::UnknownProcess(handle.0))
    }

    pub fn name(&self, handle: ProcessHandle) -> Result<&str> {
        self.slots
            .get(handle.0)
            .map(|slot| slot.name.as_str())
            .ok_or(SimError::UnknownProcess(handle.0))
    }

    /// Time of the earliest pending timer.
    pub fn next_timer(&self) -> Option<SimTime> {
        self.timers.peek().map(|Reverse((time, _, _))| *time)
    }

    /// Run every timer due at or before `limit`, including timers scheduled
    /// by the processes it resumes.
    pub fn run_timers(
        &mut self,
        limit: SimTime,
        cycle: u64,
        bus: &mut SignalBus,
        sampled: &[u64],
    ) -> Result<()> {
        while let Some(&Reverse((time, _, id))) = self.timers.peek() {
            if time > limit {
                break;
            }
            self.timers.pop();
            let mut cx = ProcessContext::new(time, cycle, bus, sampled);
            self.resume(id, &mut cx)?;
        }
        Ok(())
    }

    /// Wake the processes waiting on the edge that just brought the edge
    /// count to `cycle`, in spawn order.
    pub fn on_edge(
        &mut self,
        now: SimTime,
        cycle: u64,
        bus: &mut SignalBus,
        sampled: &[u64],
    ) -> Result<()> {
        let mut ready = Vec::new();
        while let Some(&Reverse((edge, _, id))) = self.edge_waiters.peek() {
            if edge > cycle {
                break;
            }
            self.edge_waiters.pop();
            ready.push(id);
        }
        self.until_waiters.retain(|waiter| {
            if sampled[waiter.signal.index()] == waiter.value {
                ready.push(waiter.id);
                false
            } else {
                true
            }
        });
        ready.sort_unstable();

        for id in ready {
            let mut cx = ProcessContext::new(now, cycle, bus, sampled);
            self.resume(id, &mut cx)?;
        }
        Ok(())
    }

    fn resume(&mut self, id: usize, cx: &mut ProcessContext<'_>) -> Result<()> {
        let Some(mut process) = self.slots[id].process.take() else {
            return Ok(());
        };
        let wait = process.resume(cx)?;
        match wait {
            Wait::Edges(0) => self.schedule_timer(cx.now, id),
            Wait::Edges(n) => {
                self.seq += 1;
                self.edge_waiters.push(Reverse((cx.cycle + n, self.seq, id)));
            }
            Wait::Time(delay) => self.schedule_timer(cx.now + delay, id),
            Wait::Until { signal, value } => {
                let signal = cx.bus.id(&signal)?;
                let value = value & cx.bus.signal(signal).mask();
                self.until_waiters.push(UntilWaiter { id, signal, value });
            }
            Wait::Done => {
                trace!(id, name = %self.slots[id].name, "process finished");
                return Ok(());
            }
        }
        self.slots[id].process = Some(process);
        Ok(())
    }

    fn schedule_timer(&mut self, time: SimTime, id: usize) {
        self.seq += 1;
        self.timers.push(Reverse((time, self.seq, id)));
    }
}
