//! Memory subsystem: independent capacity islands, each pairing a
//! contiguous manager and a paged manager over the same MiB budget.

pub mod contiguous;
pub mod paging;

use serde::Serialize;

use crate::process::{Pid, Tick};

pub use contiguous::{AllocationOutcome, ContiguousMemoryManager, FitStrategy, MemoryBlock};
pub use paging::{
    FrameInfo, PagedAllocationOutcome, PagedMemoryManager, PagingStats, ReplacementPolicy,
    DEFAULT_PAGE_SIZE_MB,
};

/// One capacity island owned by the engine.
#[derive(Debug, Clone)]
pub struct MemoryUnit {
    pub id: usize,
    pub contiguous: ContiguousMemoryManager,
    pub paged: PagedMemoryManager,
}

impl MemoryUnit {
    pub fn new(id: usize, capacity_mb: u64, strategy: FitStrategy, policy: ReplacementPolicy) -> Self {
        Self {
            id,
            contiguous: ContiguousMemoryManager::new(capacity_mb, strategy),
            paged: PagedMemoryManager::new(capacity_mb, DEFAULT_PAGE_SIZE_MB, policy),
        }
    }

    #[inline]
    pub const fn capacity_mb(&self) -> u64 {
        self.contiguous.total_mb()
    }

    /// Admits `pid` into both halves, or neither. The outcome always
    /// reflects the final verdict, so a paged rejection rolls back the
    /// contiguous half and reports failure.
    pub fn allocate(&mut self, pid: Pid, size_mb: u64, now: Tick) -> AllocationOutcome {
        let outcome = self.contiguous.allocate(pid, size_mb);
        if !outcome.success {
            return outcome;
        }
        if !self.paged.allocate(pid, size_mb, now).success {
            self.contiguous.release(pid);
            return self.contiguous.outcome(false);
        }
        outcome
    }

    pub fn release(&mut self, pid: Pid) {
        self.contiguous.release(pid);
        self.paged.release(pid);
    }

    pub fn tick(&mut self, now: Tick) {
        self.contiguous.tick();
        self.paged.tick(now);
    }

    /// Swaps the fit strategy, rebuilding the contiguous half from
    /// scratch.
    pub fn rebuild_contiguous(&mut self, strategy: FitStrategy) {
        self.contiguous = ContiguousMemoryManager::new(self.capacity_mb(), strategy);
    }

    /// Swaps the replacement policy, rebuilding the paged half from
    /// scratch.
    pub fn rebuild_paged(&mut self, policy: ReplacementPolicy) {
        self.paged = PagedMemoryManager::new(self.capacity_mb(), DEFAULT_PAGE_SIZE_MB, policy);
    }

    pub fn summary(&self) -> MemoryUnitSummary {
        MemoryUnitSummary {
            id: self.id,
            capacity_mb: self.capacity_mb(),
            strategy: self.contiguous.strategy(),
            policy: self.paged.policy(),
            used_mb: self.contiguous.used_mb(),
            free_mb: self.contiguous.free_mb(),
            fragmentation: self.contiguous.fragmentation_ratio(),
            efficiency: self.contiguous.efficiency(),
            frame_utilization: self.paged.memory_utilization(),
            blocks: self.contiguous.snapshot_blocks(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct MemoryUnitSummary {
    pub id: usize,
    pub capacity_mb: u64,
    pub strategy: FitStrategy,
    pub policy: ReplacementPolicy,
    pub used_mb: u64,
    pub free_mb: u64,
    pub fragmentation: f64,
    pub efficiency: f64,
    pub frame_utilization: f64,
    pub blocks: Vec<MemoryBlock>,
}

/// Paging statistics of one unit, tagged with its id.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct UnitPagingStats {
    pub unit: usize,
    pub stats: PagingStats,
}

/// Totals across every unit, plus the per-unit rows.
#[derive(Serialize, Debug, Clone)]
pub struct StorageOverview {
    pub total_mb: u64,
    pub used_mb: u64,
    pub free_mb: u64,
    pub units: Vec<MemoryUnitSummary>,
}

impl StorageOverview {
    pub fn gather(units: &[MemoryUnit]) -> Self {
        let summaries: Vec<MemoryUnitSummary> = units.iter().map(MemoryUnit::summary).collect();
        let total_mb = summaries.iter().map(|s| s.capacity_mb).sum();
        let used_mb = summaries.iter().map(|s| s.used_mb).sum();
        Self {
            total_mb,
            used_mb,
            free_mb: total_mb - used_mb,
            units: summaries,
        }
    }
}
