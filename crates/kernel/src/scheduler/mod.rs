//! The scheduler family: six disciplines behind one contract.
//!
//! Every CPU owns one `Scheduler`. `next_process` is the sole authority
//! for promoting a Ready process to Running and routes every promotion
//! through the dispatcher so context switches are counted in one place.
//! Quantum expiry and priority preemption are enforced by the engine;
//! SRTF preemption lives here, on the `next_process` path.


use core::str::FromStr;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::{Pid, ProcessState, ProcessTable, Tick};

/// Ready processes older than this many waiting ticks get promoted by
/// aging.
const AGING_WAIT_THRESHOLD: u64 = 20;
/// Number of distinct priority levels served by PriorityRR.
const PRIORITY_LEVELS: usize = 10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown scheduling algorithm {0:?}")]
pub struct ParseSchedulerKindError(pub String);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Fcfs,
    Sjf,
    Srtf,
    RoundRobin,
    Priority,
    PriorityRr,
}

impl SchedulerKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fcfs => "FCFS",
            Self::Sjf => "SJF",
            Self::Srtf => "SRTF",
            Self::RoundRobin => "RR",
            Self::Priority => "Priority",
            Self::PriorityRr => "PriorityRR",
        }
    }

    /// Whether the engine must enforce a quantum for this discipline.
    pub const fn is_quantum_driven(&self) -> bool {
        matches!(self, Self::RoundRobin | Self::PriorityRr)
    }

    /// Whether the engine must check for a higher-priority Ready process
    /// after every executed tick.
    pub const fn preempts_on_priority(&self) -> bool {
        matches!(self, Self::Priority)
    }
}

impl FromStr for SchedulerKind {
    type Err = ParseSchedulerKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FCFS" => Ok(Self::Fcfs),
            "SJF" => Ok(Self::Sjf),
            "SRTF" => Ok(Self::Srtf),
            "RR" => Ok(Self::RoundRobin),
            "Priority" => Ok(Self::Priority),
            "PriorityRR" => Ok(Self::PriorityRr),
            _ => Err(ParseSchedulerKindError(s.into())),
        }
    }
}

/// Performs context switches and keeps count of them.
///
/// A switch is counted when the CPU this scheduler feeds goes from one
/// process to a *different* one; the very first dispatch onto an idle
/// machine is not a switch.
#[derive(Debug, Default, Clone)]
pub struct Dispatcher {
    last_dispatched: Option<Pid>,
    context_switches: usize,
}

impl Dispatcher {
    fn dispatch(&mut self, table: &mut ProcessTable, previous: Option<Pid>, next: Pid) {
        if let Some(prev) = previous
            && let Some(process) = table.get_mut(prev)
        {
            process.state = ProcessState::Ready;
        }
        if let Some(process) = table.get_mut(next) {
            process.state = ProcessState::Running;
        }

        if self.last_dispatched.is_some_and(|last| last != next) {
            self.context_switches += 1;
        }
        self.last_dispatched = Some(next);
    }

    #[inline]
    pub const fn context_switches(&self) -> usize {
        self.context_switches
    }
}

/// Per-discipline ready structure.
#[derive(Debug, Clone)]
enum ReadyQueue {
    /// FCFS, SJF and SRTF share an unordered pool; the selection key
    /// differs.
    Pool(Vec<Pid>),
    /// Round-Robin FIFO, sorted by priority at dequeue time.
    Fifo(VecDeque<Pid>),
    /// One FIFO lane per priority level, lowest non-empty lane served.
    Levels(Box<[VecDeque<Pid>; PRIORITY_LEVELS]>),
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    kind: SchedulerKind,
    queue: ReadyQueue,
    pub dispatcher: Dispatcher,
    aging_interval: Tick,
    last_aging_tick: Tick,
}

impl Scheduler {
    pub fn new(kind: SchedulerKind, aging_interval: Tick) -> Self {
        let queue = match kind {
            SchedulerKind::Fcfs | SchedulerKind::Sjf | SchedulerKind::Srtf | SchedulerKind::Priority => {
                ReadyQueue::Pool(Vec::new())
            }
            SchedulerKind::RoundRobin => ReadyQueue::Fifo(VecDeque::new()),
            SchedulerKind::PriorityRr => ReadyQueue::Levels(Box::new(core::array::from_fn(|_| VecDeque::new()))),
        };
        Self {
            kind,
            queue,
            dispatcher: Dispatcher::default(),
            aging_interval: aging_interval.max(1),
            last_aging_tick: 0,
        }
    }

    #[inline]
    pub const fn kind(&self) -> SchedulerKind {
        self.kind
    }

    /// Number of Ready processes queued here; the engine's least-loaded
    /// placement key.
    pub fn queue_len(&self) -> usize {
        match &self.queue {
            ReadyQueue::Pool(pool) => pool.len(),
            ReadyQueue::Fifo(fifo) => fifo.len(),
            ReadyQueue::Levels(levels) => levels.iter().map(VecDeque::len).sum(),
        }
    }

    /// Marks the process Ready and enqueues it.
    pub fn add_process(&mut self, pid: Pid, table: &mut ProcessTable) {
        let Some(process) = table.get_mut(pid) else {
            return;
        };
        process.state = ProcessState::Ready;
        let priority = process.priority;

        match &mut self.queue {
            ReadyQueue::Pool(pool) => pool.push(pid),
            ReadyQueue::Fifo(fifo) => fifo.push_back(pid),
            ReadyQueue::Levels(levels) => {
                levels[priority.min(9) as usize].push_back(pid);
            }
        }
    }

    /// Hands back the process that should run on the CPU this scheduler
    /// feeds. `current` is whatever the CPU is executing right now; the
    /// non-preemptive disciplines return it untouched while it runs, SRTF
    /// swaps it out when a Ready process has strictly less left to do.
    pub fn next_process(&mut self, current: Option<Pid>, table: &mut ProcessTable, _now: Tick) -> Option<Pid> {
        let current_running =
            current.filter(|&pid| table.get(pid).is_some_and(|p| p.state.is_running()));

        if self.kind == SchedulerKind::Srtf {
            return self.next_srtf(current_running, table);
        }

        if let Some(pid) = current_running {
            return Some(pid);
        }

        let chosen = match (&mut self.queue, self.kind) {
            (ReadyQueue::Pool(pool), SchedulerKind::Fcfs) => {
                Self::take_min(pool, table, |p| (p.priority, p.arrival_tick, p.pid))
            }
            (ReadyQueue::Pool(pool), SchedulerKind::Sjf) => {
                Self::take_min(pool, table, |p| (p.priority, p.duration_ticks, p.arrival_tick, p.pid))
            }
            (ReadyQueue::Pool(pool), SchedulerKind::Priority) => {
                Self::take_min(pool, table, |p| (p.priority, p.arrival_tick, p.pid))
            }
            (ReadyQueue::Fifo(fifo), _) => {
                // stable sort keeps FIFO order inside a priority level
                let mut drained: Vec<Pid> = fifo.drain(..).collect();
                drained.sort_by_key(|&pid| table.get(pid).map_or(u8::MAX, |p| p.priority));
                *fifo = drained.into();
                fifo.pop_front()
            }
            (ReadyQueue::Levels(levels), _) => levels.iter_mut().find_map(VecDeque::pop_front),
            _ => unreachable!("queue shape always matches the scheduler kind"),
        }?;

        self.dispatcher.dispatch(table, None, chosen);
        Some(chosen)
    }

    fn next_srtf(&mut self, current: Option<Pid>, table: &mut ProcessTable) -> Option<Pid> {
        let ReadyQueue::Pool(pool) = &mut self.queue else {
            unreachable!("SRTF uses a pool queue");
        };

        let best = pool
            .iter()
            .copied()
            .filter_map(|pid| table.get(pid).map(|p| ((p.priority, p.remaining_ticks, p.arrival_tick), pid)))
            .min();

        if let Some(pid) = current {
            let process = table.get(pid)?;
            let current_key = (process.priority, process.remaining_ticks);
            if let Some(((priority, remaining, _), best_pid)) = best
                && (priority, remaining) < current_key
            {
                pool.retain(|&p| p != best_pid);
                pool.push(pid);
                self.dispatcher.dispatch(table, Some(pid), best_pid);
                return Some(best_pid);
            }
            return Some(pid);
        }

        let (_, best_pid) = best?;
        pool.retain(|&p| p != best_pid);
        self.dispatcher.dispatch(table, None, best_pid);
        Some(best_pid)
    }

    fn take_min<K: Ord>(
        pool: &mut Vec<Pid>,
        table: &ProcessTable,
        key: impl Fn(&crate::process::Process) -> K,
    ) -> Option<Pid> {
        let (index, _) = pool
            .iter()
            .enumerate()
            .filter_map(|(i, &pid)| table.get(pid).map(|p| (i, key(p))))
            .min_by(|a, b| a.1.cmp(&b.1))?;
        Some(pool.remove(index))
    }

    /// Per-tick hook. Under Priority scheduling this is where aging runs:
    /// every `aging_interval` ticks, queued processes that waited past the
    /// threshold move one priority level up (floor 0).
    pub fn on_tick(&mut self, table: &mut ProcessTable, now: Tick) {
        if self.kind != SchedulerKind::Priority {
            return;
        }
        if now.saturating_sub(self.last_aging_tick) < self.aging_interval {
            return;
        }
        self.last_aging_tick = now;

        let ReadyQueue::Pool(pool) = &self.queue else {
            return;
        };
        for &pid in pool {
            if let Some(process) = table.get_mut(pid)
                && process.waiting_ticks > AGING_WAIT_THRESHOLD
            {
                process.priority = process.priority.saturating_sub(1);
            }
        }
    }

    /// Lowest priority value among queued Ready processes, if any. The
    /// engine compares this against the running process to decide
    /// priority preemption.
    pub fn best_ready_priority(&self, table: &ProcessTable) -> Option<u8> {
        let pids: Vec<Pid> = match &self.queue {
            ReadyQueue::Pool(pool) => pool.clone(),
            ReadyQueue::Fifo(fifo) => fifo.iter().copied().collect(),
            ReadyQueue::Levels(levels) => levels.iter().flatten().copied().collect(),
        };
        pids.into_iter()
            .filter_map(|pid| table.get(pid).map(|p| p.priority))
            .min()
    }

    /// Empties the queue, handing the queued pids back in rough service
    /// order. Used when a CPU's discipline is swapped out underneath it.
    pub fn drain_pids(&mut self) -> Vec<Pid> {
        match &mut self.queue {
            ReadyQueue::Pool(pool) => pool.drain(..).collect(),
            ReadyQueue::Fifo(fifo) => fifo.drain(..).collect(),
            ReadyQueue::Levels(levels) => levels.iter_mut().flat_map(|level| level.drain(..)).collect(),
        }
    }

    /// Forgets a process entirely (used when the engine drops a PCB that
    /// is still queued somewhere).
    pub fn forget(&mut self, pid: Pid) {
        match &mut self.queue {
            ReadyQueue::Pool(pool) => pool.retain(|&p| p != pid),
            ReadyQueue::Fifo(fifo) => fifo.retain(|&p| p != pid),
            ReadyQueue::Levels(levels) => {
                for level in levels.iter_mut() {
                    level.retain(|&p| p != pid);
                }
            }
        }
    }
}
