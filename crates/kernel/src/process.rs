//! Process records (PCBs) and the engine-owned process table.
//!
//! Everything else in the simulator refers to processes by [`Pid`]; the
//! table is the only owner. Schedulers and CPUs keep indices into it.

use hashbrown::HashMap;
use serde::Serialize;

/// Process ID, a unique identifier for a process.
///
/// PIDs are strictly increasing over the engine's lifetime; the counter is
/// not rewound on reset.
pub type Pid = u32;

/// One advance of the global logical clock.
pub type Tick = u64;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

impl ProcessState {
    pub const fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub const fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub name: String,
    pub size_mb: u64,
    /// 0..=9, lower value wins
    pub priority: u8,
    pub duration_ticks: u64,
    pub remaining_ticks: u64,
    pub state: ProcessState,
    pub arrival_tick: Tick,
    /// first tick this process ran on a CPU
    pub start_tick: Option<Tick>,
    pub finish_tick: Option<Tick>,
    /// ticks spent in the ready queues so far
    pub waiting_ticks: u64,
    /// consecutive ticks executed inside the current quantum
    pub quantum_used: u32,
    pub cpu_id: Option<usize>,
    pub memory_unit_id: Option<usize>,
    pub io_remaining_ticks: u64,
    pub io_total_ticks: u64,
    /// why the process is currently waiting, if it is
    pub interrupt_reason: Option<String>,
    pub io_probability: f64,
    pub syscall_probability: f64,
    pub page_fault_probability: f64,
}

impl Process {
    pub fn new(pid: Pid, name: String, size_mb: u64, duration_ticks: u64, priority: u8, arrival_tick: Tick) -> Self {
        Self {
            pid,
            name,
            size_mb,
            priority: priority.min(9),
            duration_ticks,
            remaining_ticks: duration_ticks,
            state: ProcessState::New,
            arrival_tick,
            start_tick: None,
            finish_tick: None,
            waiting_ticks: 0,
            quantum_used: 0,
            cpu_id: None,
            memory_unit_id: None,
            io_remaining_ticks: 0,
            io_total_ticks: 0,
            interrupt_reason: None,
            io_probability: 0.15,
            syscall_probability: 0.05,
            page_fault_probability: 0.02,
        }
    }

    /// Number of logical pages this process spans for a given page size.
    #[inline]
    pub const fn pages(&self, page_size_mb: u64) -> u64 {
        self.size_mb.div_ceil(page_size_mb)
    }

    /// Marks the process terminated. Remaining work is zeroed so that
    /// processes rejected at birth satisfy the same invariant as processes
    /// that ran to completion.
    pub fn terminate(&mut self, now: Tick) {
        self.state = ProcessState::Terminated;
        self.remaining_ticks = 0;
        self.cpu_id = None;
        if self.finish_tick.is_none() {
            self.finish_tick = Some(now);
        }
    }
}

/// Immutable copy of a process handed out through the snapshot surface.
#[derive(Serialize, Debug, Clone)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub size_mb: u64,
    pub priority: u8,
    pub duration_ticks: u64,
    pub remaining_ticks: u64,
    pub state: ProcessState,
    pub arrival_tick: Tick,
    pub start_tick: Option<Tick>,
    pub finish_tick: Option<Tick>,
    pub waiting_ticks: u64,
    pub cpu_id: Option<usize>,
    pub memory_unit_id: Option<usize>,
    pub io_remaining_ticks: u64,
    pub interrupt_reason: Option<String>,
}

impl From<&Process> for ProcessInfo {
    fn from(process: &Process) -> Self {
        Self {
            pid: process.pid,
            name: process.name.clone(),
            size_mb: process.size_mb,
            priority: process.priority,
            duration_ticks: process.duration_ticks,
            remaining_ticks: process.remaining_ticks,
            state: process.state,
            arrival_tick: process.arrival_tick,
            start_tick: process.start_tick,
            finish_tick: process.finish_tick,
            waiting_ticks: process.waiting_ticks,
            cpu_id: process.cpu_id,
            memory_unit_id: process.memory_unit_id,
            io_remaining_ticks: process.io_remaining_ticks,
            interrupt_reason: process.interrupt_reason.clone(),
        }
    }
}

/// Owner of every live PCB.
///
/// Iteration order of the underlying map is not stable, so every sweep the
/// engine performs goes through [`Self::pids_sorted`] to stay reproducible.
#[derive(Debug, Default)]
pub struct ProcessTable {
    map: HashMap<Pid, Process>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self { map: HashMap::new() }
    }

    pub fn insert(&mut self, process: Process) {
        self.map.insert(process.pid, process);
    }

    #[inline]
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.map.get(&pid)
    }

    #[inline]
    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.map.get_mut(&pid)
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Process> {
        self.map.remove(&pid)
    }

    #[inline]
    pub fn contains(&self, pid: Pid) -> bool {
        self.map.contains_key(&pid)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All pids in ascending order.
    pub fn pids_sorted(&self) -> Vec<Pid> {
        let mut pids: Vec<Pid> = self.map.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.map.values()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Snapshot of every process that has not been cleaned up yet,
    /// ascending by pid.
    pub fn snapshot(&self) -> Vec<ProcessInfo> {
        let mut infos: Vec<ProcessInfo> = self.map.values().map(ProcessInfo::from).collect();
        infos.sort_unstable_by_key(|info| info.pid);
        infos
    }
}
