//! Aggregated simulation metrics: allocation statistics per fit strategy
//! and process completion accounting.

use hashbrown::HashMap;
use serde::Serialize;

use crate::memory::{AllocationOutcome, FitStrategy};
use crate::process::{Process, Tick};

/// Weight of history in the moving fragmentation/efficiency averages.
const SMOOTHING: f64 = 0.9;

#[derive(Debug, Clone, Copy, Default)]
struct StrategyStats {
    attempts: u64,
    successes: u64,
    fragmentation: f64,
    efficiency: f64,
}

#[derive(Debug, Default)]
pub struct SimulationMetrics {
    per_strategy: HashMap<FitStrategy, StrategyStats>,
    pub total_processes: u64,
    pub completed_processes: u64,
    pub total_turnaround_time: u64,
    pub total_waiting_time: u64,
    pub cpu_busy_ticks: u64,
}

impl SimulationMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one allocation attempt into the per-strategy counters and
    /// moving averages.
    pub fn record_allocation(&mut self, outcome: &AllocationOutcome) {
        let stats = self.per_strategy.entry(outcome.strategy).or_default();
        stats.attempts += 1;
        if outcome.success {
            stats.successes += 1;
        }
        stats.fragmentation = stats.fragmentation * SMOOTHING + outcome.fragmentation * (1.0 - SMOOTHING);
        stats.efficiency = stats.efficiency * SMOOTHING + outcome.efficiency * (1.0 - SMOOTHING);
    }

    pub fn record_completion(&mut self, process: &Process, now: Tick) {
        self.completed_processes += 1;
        self.total_turnaround_time += now.saturating_sub(process.arrival_tick);
        self.total_waiting_time += process.waiting_ticks;
    }

    pub fn success_rate(&self, strategy: FitStrategy) -> f64 {
        let Some(stats) = self.per_strategy.get(&strategy) else {
            return 0.0;
        };
        if stats.attempts == 0 {
            return 0.0;
        }
        stats.successes as f64 / stats.attempts as f64
    }

    pub fn average_turnaround(&self) -> f64 {
        if self.completed_processes == 0 {
            return 0.0;
        }
        self.total_turnaround_time as f64 / self.completed_processes as f64
    }

    pub fn average_waiting(&self) -> f64 {
        if self.completed_processes == 0 {
            return 0.0;
        }
        self.total_waiting_time as f64 / self.completed_processes as f64
    }

    /// Fraction of available CPU ticks that executed a process.
    pub fn cpu_utilization(&self, clock: Tick, num_cpus: usize) -> f64 {
        let available = clock * num_cpus as u64;
        if available == 0 {
            return 0.0;
        }
        self.cpu_busy_ticks as f64 / available as f64
    }

    /// One comparative row per strategy that has seen at least one
    /// allocation attempt, sorted by strategy name.
    pub fn algorithm_stats(&self) -> Vec<AlgorithmStats> {
        let mut rows: Vec<AlgorithmStats> = self
            .per_strategy
            .iter()
            .map(|(strategy, stats)| AlgorithmStats {
                strategy: *strategy,
                attempts: stats.attempts,
                successes: stats.successes,
                success_rate: self.success_rate(*strategy),
                fragmentation: stats.fragmentation,
                efficiency: stats.efficiency,
            })
            .collect();
        rows.sort_unstable_by_key(|row| row.strategy.name());
        rows
    }
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct AlgorithmStats {
    pub strategy: FitStrategy,
    pub attempts: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub fragmentation: f64,
    pub efficiency: f64,
}
