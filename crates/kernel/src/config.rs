//! Engine configuration: everything the constructor accepts, with the
//! documented ranges clamped instead of rejected.

use serde::{Deserialize, Serialize};

use crate::interrupts::InterruptDefaults;
use crate::memory::{FitStrategy, ReplacementPolicy};
use crate::process::Tick;
use crate::scheduler::SchedulerKind;

pub const MAX_CPUS: usize = 8;
pub const MAX_MEMORY_UNITS: usize = 8;
pub const MEMORY_STEP_MB: u64 = 64;

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SimulationConfig {
    /// Architecture adapter name; only "Modular" is actively exposed and
    /// unknown names fall back to it.
    pub architecture: String,
    pub scheduler: SchedulerKind,
    /// 1..=20
    pub quantum: u32,
    /// 1..=8
    pub num_cpus: usize,
    /// 1..=8
    pub threads_per_cpu: u32,
    /// 1..=8
    pub num_memory_units: usize,
    /// 64..=4096 MiB, multiples of 64
    pub memory_unit_capacity_mb: u64,
    pub fit_strategy: FitStrategy,
    pub replacement_policy: ReplacementPolicy,
    /// Seed for the engine-owned RNG driving spawn and page-access
    /// streams; reset() re-seeds from this value.
    pub seed: u64,
    pub auto_create_processes: bool,
    pub max_process_duration: u64,
    /// ticks a terminated process lingers before cleanup
    pub cleanup_delay: Tick,
    /// ticks a process stays NEW before promotion
    pub new_delay: Tick,
    pub aging_interval: Tick,
    pub io_duration: u64,
    pub syscall_duration: u64,
    pub page_fault_duration: u64,
    pub io_probability: f64,
    pub syscall_probability: f64,
    pub page_fault_probability: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            architecture: "Modular".into(),
            scheduler: SchedulerKind::Fcfs,
            quantum: 4,
            num_cpus: 4,
            threads_per_cpu: 2,
            num_memory_units: 1,
            memory_unit_capacity_mb: 256,
            fit_strategy: FitStrategy::FirstFit,
            replacement_policy: ReplacementPolicy::Fifo,
            seed: 0,
            auto_create_processes: true,
            max_process_duration: 50,
            cleanup_delay: 10,
            new_delay: 2,
            aging_interval: 10,
            io_duration: 3,
            syscall_duration: 2,
            page_fault_duration: 5,
            io_probability: 0.15,
            syscall_probability: 0.05,
            page_fault_probability: 0.02,
        }
    }
}

impl SimulationConfig {
    /// Clamps every field into its documented range. Out-of-range values
    /// are a configuration mistake, not an error; the engine never
    /// refuses to start.
    pub fn sanitized(mut self) -> Self {
        self.quantum = self.quantum.clamp(1, 20);
        self.num_cpus = self.num_cpus.clamp(1, MAX_CPUS);
        self.threads_per_cpu = self.threads_per_cpu.clamp(1, 8);
        self.num_memory_units = self.num_memory_units.clamp(1, MAX_MEMORY_UNITS);
        self.memory_unit_capacity_mb = self.memory_unit_capacity_mb.clamp(MEMORY_STEP_MB, 4096)
            / MEMORY_STEP_MB
            * MEMORY_STEP_MB;
        self.max_process_duration = self.max_process_duration.max(20);
        self.aging_interval = self.aging_interval.max(1);
        self.io_probability = self.io_probability.clamp(0.0, 1.0);
        self.syscall_probability = self.syscall_probability.clamp(0.0, 1.0);
        self.page_fault_probability = self.page_fault_probability.clamp(0.0, 1.0);
        self
    }

    pub fn interrupt_defaults(&self) -> InterruptDefaults {
        InterruptDefaults {
            io_duration: self.io_duration,
            syscall_duration: self.syscall_duration,
            page_fault_duration: self.page_fault_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_clamps_the_documented_ranges() {
        let config = SimulationConfig {
            quantum: 99,
            num_cpus: 0,
            threads_per_cpu: 64,
            num_memory_units: 12,
            memory_unit_capacity_mb: 1000,
            ..Default::default()
        }
        .sanitized();

        assert_eq!(config.quantum, 20);
        assert_eq!(config.num_cpus, 1);
        assert_eq!(config.threads_per_cpu, 8);
        assert_eq!(config.num_memory_units, 8);
        // rounded down to a multiple of 64
        assert_eq!(config.memory_unit_capacity_mb, 960);
    }

    #[test]
    fn defaults_are_already_sane() {
        let config = SimulationConfig::default();
        let sanitized = config.clone().sanitized();
        assert_eq!(config.quantum, sanitized.quantum);
        assert_eq!(config.memory_unit_capacity_mb, sanitized.memory_unit_capacity_mb);
    }
}
