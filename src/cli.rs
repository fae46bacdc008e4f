use clap::Parser;
use kairos_core::{FitStrategy, ReplacementPolicy, SchedulerKind, SimulationConfig};

/// Minimum tick interval the speed setting clamps to.
pub const MIN_INTERVAL_MS: u64 = 10;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Scheduling algorithm: FCFS, SJF, SRTF, RR, Priority or PriorityRR
    #[arg(long, default_value = "FCFS")]
    pub scheduler: SchedulerKind,

    /// Round-Robin quantum in ticks (1..=20)
    #[arg(long, default_value_t = 4)]
    pub quantum: u32,

    /// Number of CPUs (1..=8)
    #[arg(long, default_value_t = 4)]
    pub cpus: usize,

    /// Hardware threads per CPU (1..=8)
    #[arg(long, default_value_t = 2)]
    pub threads: u32,

    /// Number of independent memory units (1..=8)
    #[arg(long, default_value_t = 1)]
    pub memory_units: usize,

    /// Capacity of each memory unit in MiB (64..=4096, multiples of 64)
    #[arg(long, default_value_t = 256)]
    pub capacity: u64,

    /// Contiguous fit strategy: first, best or worst
    #[arg(long, default_value = "first")]
    pub fit: FitStrategy,

    /// Page replacement policy: FIFO, LRU or Optimal
    #[arg(long, default_value = "FIFO")]
    pub paging: ReplacementPolicy,

    /// Architecture adapter; only Modular is actively exposed
    #[arg(long, default_value = "Modular")]
    pub architecture: String,

    /// Seed for the engine RNG (spawn and page-access streams)
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// How many ticks to simulate
    #[arg(long, default_value_t = 200)]
    pub ticks: u64,

    /// Milliseconds between ticks, clamped to at least 10
    #[arg(long, default_value_t = 50)]
    pub interval_ms: u64,

    /// Dump a JSON snapshot every N ticks (0 = only at the end)
    #[arg(long, default_value_t = 0)]
    pub snapshot_every: u64,

    /// Disable the engine's automatic process spawning
    #[arg(long, default_value = "false")]
    pub no_auto_create: bool,

    #[arg(short, long, default_value = "false")]
    pub verbose: bool,
}

impl Cli {
    pub fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            architecture: self.architecture.clone(),
            scheduler: self.scheduler,
            quantum: self.quantum,
            num_cpus: self.cpus,
            threads_per_cpu: self.threads,
            num_memory_units: self.memory_units,
            memory_unit_capacity_mb: self.capacity,
            fit_strategy: self.fit,
            replacement_policy: self.paging,
            seed: self.seed,
            auto_create_processes: !self.no_auto_create,
            ..SimulationConfig::default()
        }
    }
}
