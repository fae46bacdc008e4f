//! Logical CPU model with hardware-thread scaled execution.

use serde::Serialize;

use crate::process::{Pid, ProcessTable, Tick};

#[derive(Debug, Clone)]
pub struct Cpu {
    pub id: usize,
    /// hardware threads this core contributes, at least 1
    pub thread_capacity: u32,
    pub threads_in_use: u32,
    pub process: Option<Pid>,
}

impl Cpu {
    pub fn new(id: usize, thread_capacity: u32) -> Self {
        Self {
            id,
            thread_capacity: thread_capacity.max(1),
            threads_in_use: 0,
            process: None,
        }
    }

    #[inline]
    pub const fn is_idle(&self) -> bool {
        self.process.is_none()
    }

    /// Binds `pid` to this core. The process becomes Running and its
    /// quantum counter restarts.
    pub fn assign(&mut self, pid: Pid, table: &mut ProcessTable) {
        if let Some(process) = table.get_mut(pid) {
            process.state = crate::process::ProcessState::Running;
            process.cpu_id = Some(self.id);
            process.quantum_used = 0;
        }
        self.process = Some(pid);
        self.threads_in_use = self.thread_capacity;
    }

    /// Unbinds the current process, if any.
    pub fn release(&mut self, table: &mut ProcessTable) {
        if let Some(pid) = self.process.take() {
            if let Some(process) = table.get_mut(pid) {
                process.cpu_id = None;
            }
        }
        self.threads_in_use = 0;
    }

    /// Executes one tick of the bound process: remaining work drops by
    /// `max(1, threads_in_use)`. Returns `true` when the process finished
    /// this tick.
    pub fn tick(&mut self, table: &mut ProcessTable, now: Tick) -> bool {
        let Some(pid) = self.process else {
            return false;
        };
        let Some(process) = table.get_mut(pid) else {
            return false;
        };
        if !process.state.is_running() {
            return false;
        }

        let step = u64::from(self.threads_in_use.max(1));
        process.remaining_ticks = process.remaining_ticks.saturating_sub(step);
        if process.remaining_ticks == 0 {
            process.terminate(now);
            return true;
        }
        false
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CpuInfo {
    pub id: usize,
    pub thread_capacity: u32,
    pub threads_in_use: u32,
    pub process: Option<Pid>,
}

impl From<&Cpu> for CpuInfo {
    fn from(cpu: &Cpu) -> Self {
        Self {
            id: cpu.id,
            thread_capacity: cpu.thread_capacity,
            threads_in_use: cpu.threads_in_use,
            process: cpu.process,
        }
    }
}
