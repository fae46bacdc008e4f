//! Contiguous allocator: a block list over `[0, total_mb)` with pluggable
//! fit strategies, eager merging of free neighbours and compaction.

use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::Pid;

/// How long a unit waits between interval-driven compactions.
const COMPACT_INTERVAL: u64 = 50;
/// Fragmentation ratio that forces a compaction on the next tick.
const COMPACT_THRESHOLD: f64 = 0.30;
/// Interval-driven compaction only fires above this ratio.
const COMPACT_FLOOR: f64 = 0.10;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown fit strategy {0:?}")]
pub struct ParseFitStrategyError(pub String);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FitStrategy {
    FirstFit,
    BestFit,
    WorstFit,
}

impl FitStrategy {
    pub const ALL: [Self; 3] = [Self::FirstFit, Self::BestFit, Self::WorstFit];

    pub const fn name(&self) -> &'static str {
        match self {
            Self::FirstFit => "first",
            Self::BestFit => "best",
            Self::WorstFit => "worst",
        }
    }

    /// Index of the free block that should satisfy a request of `size_mb`,
    /// if any does.
    pub fn find_block(&self, blocks: &[MemoryBlock], size_mb: u64) -> Option<usize> {
        let candidates = blocks
            .iter()
            .enumerate()
            .filter(|(_, block)| block.is_free() && block.size() >= size_mb);

        match self {
            Self::FirstFit => candidates.map(|(i, _)| i).next(),
            Self::BestFit => candidates.min_by_key(|(_, block)| block.size()).map(|(i, _)| i),
            Self::WorstFit => candidates.max_by_key(|(_, block)| block.size()).map(|(i, _)| i),
        }
    }
}

impl FromStr for FitStrategy {
    type Err = ParseFitStrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" | "firstfit" | "first-fit" => Ok(Self::FirstFit),
            "best" | "bestfit" | "best-fit" => Ok(Self::BestFit),
            "worst" | "worstfit" | "worst-fit" => Ok(Self::WorstFit),
            _ => Err(ParseFitStrategyError(s.into())),
        }
    }
}

/// A `[start, end)` MiB interval, owned by a process or free.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBlock {
    pub start: u64,
    pub end: u64,
    pub owner: Option<Pid>,
}

impl MemoryBlock {
    pub const fn new(start: u64, end: u64, owner: Option<Pid>) -> Self {
        Self { start, end, owner }
    }

    #[inline]
    pub const fn size(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub const fn is_free(&self) -> bool {
        self.owner.is_none()
    }
}

/// What a single allocation attempt looked like, success or not.
/// Rejection is a normal outcome; the caller may retry on another unit.
#[derive(Serialize, Debug, Clone, Copy)]
pub struct AllocationOutcome {
    pub success: bool,
    pub fragmentation: f64,
    pub efficiency: f64,
    pub strategy: FitStrategy,
}

#[derive(Debug, Clone)]
pub struct ContiguousMemoryManager {
    total_mb: u64,
    strategy: FitStrategy,
    blocks: Vec<MemoryBlock>,
    ticks_since_compact: u64,
}

impl ContiguousMemoryManager {
    pub fn new(total_mb: u64, strategy: FitStrategy) -> Self {
        Self {
            total_mb,
            strategy,
            blocks: vec![MemoryBlock::new(0, total_mb, None)],
            ticks_since_compact: 0,
        }
    }

    #[inline]
    pub const fn total_mb(&self) -> u64 {
        self.total_mb
    }

    #[inline]
    pub const fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    pub fn used_mb(&self) -> u64 {
        self.blocks.iter().filter(|b| !b.is_free()).map(MemoryBlock::size).sum()
    }

    #[inline]
    pub fn free_mb(&self) -> u64 {
        self.total_mb - self.used_mb()
    }

    /// Tries to place `size_mb` MiB for `pid`. An exact fit takes the whole
    /// block; otherwise the chosen block is split into an owned prefix and
    /// a free remainder inserted right after it.
    pub fn allocate(&mut self, pid: Pid, size_mb: u64) -> AllocationOutcome {
        let Some(index) = self.strategy.find_block(&self.blocks, size_mb) else {
            return self.outcome(false);
        };

        let block = self.blocks[index];
        if block.size() == size_mb {
            self.blocks[index].owner = Some(pid);
        } else {
            let owned = MemoryBlock::new(block.start, block.start + size_mb, Some(pid));
            let remainder = MemoryBlock::new(block.start + size_mb, block.end, None);
            self.blocks[index] = owned;
            self.blocks.insert(index + 1, remainder);
        }

        self.outcome(true)
    }

    /// Frees every block owned by `pid` and merges free neighbours.
    /// Compaction stays a `tick()` / manual concern.
    pub fn release(&mut self, pid: Pid) {
        let mut owned_any = false;
        for block in &mut self.blocks {
            if block.owner == Some(pid) {
                block.owner = None;
                owned_any = true;
            }
        }
        if !owned_any {
            return;
        }

        self.merge_free();
    }

    /// Single left-to-right pass joining adjacent free blocks.
    pub fn merge_free(&mut self) {
        let mut merged: Vec<MemoryBlock> = Vec::with_capacity(self.blocks.len());
        for block in self.blocks.drain(..) {
            match merged.last_mut() {
                Some(last) if last.is_free() && block.is_free() => last.end = block.end,
                _ => merged.push(block),
            }
        }
        self.blocks = merged;
    }

    /// Slides every allocated block to the left, preserving order, and
    /// leaves one trailing free block. Applying this twice in a row equals
    /// applying it once.
    pub fn compact(&mut self) {
        let mut compacted: Vec<MemoryBlock> = Vec::with_capacity(self.blocks.len());
        let mut cursor = 0;
        for block in self.blocks.iter().filter(|b| !b.is_free()) {
            let size = block.size();
            compacted.push(MemoryBlock::new(cursor, cursor + size, block.owner));
            cursor += size;
        }
        if cursor < self.total_mb {
            compacted.push(MemoryBlock::new(cursor, self.total_mb, None));
        }
        if compacted.is_empty() {
            compacted.push(MemoryBlock::new(0, self.total_mb, None));
        }
        self.blocks = compacted;
        self.ticks_since_compact = 0;
    }

    fn check_and_compact(&mut self) -> bool {
        let ratio = self.fragmentation_ratio();
        let due = ratio >= COMPACT_THRESHOLD
            || (self.ticks_since_compact >= COMPACT_INTERVAL && ratio > COMPACT_FLOOR);
        if due {
            self.compact();
        }
        due
    }

    /// Per-tick maintenance: advances the compaction timer and compacts
    /// when fragmentation crossed the threshold or the interval elapsed
    /// with fragmentation above the floor.
    pub fn tick(&mut self) {
        self.ticks_since_compact += 1;
        self.check_and_compact();
    }

    /// Free space trapped outside the single largest free block, relative
    /// to the total.
    pub fn fragmentation_ratio(&self) -> f64 {
        let free: Vec<u64> = self.blocks.iter().filter(|b| b.is_free()).map(MemoryBlock::size).collect();
        let Some(&largest) = free.iter().max() else {
            return 0.0;
        };
        let mut trapped: u64 = free.iter().sum();
        trapped -= largest;
        trapped as f64 / self.total_mb as f64
    }

    pub fn efficiency(&self) -> f64 {
        let used = self.used_mb() as f64 / self.total_mb as f64;
        used * (1.0 - self.fragmentation_ratio())
    }

    pub fn snapshot_blocks(&self) -> Vec<MemoryBlock> {
        self.blocks.clone()
    }

    pub(crate) fn outcome(&self, success: bool) -> AllocationOutcome {
        AllocationOutcome {
            success,
            fragmentation: self.fragmentation_ratio(),
            efficiency: self.efficiency(),
            strategy: self.strategy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holes(manager: &mut ContiguousMemoryManager) {
        // [16 free][8 used][12 free][8 used][20 free]
        assert!(manager.allocate(1, 16).success);
        assert!(manager.allocate(2, 8).success);
        assert!(manager.allocate(3, 12).success);
        assert!(manager.allocate(4, 8).success);
        manager.release(1);
        manager.release(3);
    }

    #[test]
    fn best_fit_picks_the_tight_hole() {
        let mut manager = ContiguousMemoryManager::new(64, FitStrategy::BestFit);
        holes(&mut manager);
        let outcome = manager.allocate(9, 12);
        assert!(outcome.success);
        let block = manager
            .snapshot_blocks()
            .into_iter()
            .find(|b| b.owner == Some(9))
            .unwrap();
        assert_eq!((block.start, block.end), (24, 36));
    }

    #[test]
    fn first_fit_picks_the_leading_hole() {
        let mut manager = ContiguousMemoryManager::new(64, FitStrategy::FirstFit);
        holes(&mut manager);
        let outcome = manager.allocate(9, 12);
        assert!(outcome.success);
        let block = manager
            .snapshot_blocks()
            .into_iter()
            .find(|b| b.owner == Some(9))
            .unwrap();
        assert_eq!((block.start, block.end), (0, 12));
    }

    #[test]
    fn worst_fit_picks_the_widest_hole() {
        let mut manager = ContiguousMemoryManager::new(64, FitStrategy::WorstFit);
        holes(&mut manager);
        let outcome = manager.allocate(9, 12);
        assert!(outcome.success);
        let block = manager
            .snapshot_blocks()
            .into_iter()
            .find(|b| b.owner == Some(9))
            .unwrap();
        assert_eq!(block.start, 44);
    }

    #[test]
    fn allocate_release_round_trips() {
        let mut manager = ContiguousMemoryManager::new(256, FitStrategy::FirstFit);
        let before = manager.snapshot_blocks();
        assert!(manager.allocate(7, 32).success);
        manager.release(7);
        assert_eq!(manager.snapshot_blocks(), before);
    }

    #[test]
    fn blocks_always_cover_the_whole_range() {
        let mut manager = ContiguousMemoryManager::new(128, FitStrategy::BestFit);
        assert!(manager.allocate(1, 16).success);
        assert!(manager.allocate(2, 48).success);
        manager.release(1);
        assert!(manager.allocate(3, 8).success);

        let blocks = manager.snapshot_blocks();
        assert_eq!(blocks.first().unwrap().start, 0);
        assert_eq!(blocks.last().unwrap().end, 128);
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            // adjacent free blocks must have been merged
            assert!(!(pair[0].is_free() && pair[1].is_free()));
        }
    }

    #[test]
    fn compaction_is_idempotent() {
        let mut manager = ContiguousMemoryManager::new(128, FitStrategy::FirstFit);
        assert!(manager.allocate(1, 16).success);
        assert!(manager.allocate(2, 16).success);
        assert!(manager.allocate(3, 16).success);
        manager.release(2);

        manager.compact();
        let once = manager.snapshot_blocks();
        manager.compact();
        assert_eq!(manager.snapshot_blocks(), once);

        let owners: Vec<Option<Pid>> = once.iter().map(|b| b.owner).collect();
        assert_eq!(owners, vec![Some(1), Some(3), None]);
    }

    #[test]
    fn exact_fit_consumes_the_block() {
        let mut manager = ContiguousMemoryManager::new(64, FitStrategy::FirstFit);
        assert!(manager.allocate(1, 64).success);
        assert_eq!(manager.snapshot_blocks().len(), 1);
        assert!(!manager.allocate(2, 1).success);
    }

    #[test]
    fn fragmentation_excludes_the_largest_hole() {
        let mut manager = ContiguousMemoryManager::new(64, FitStrategy::FirstFit);
        holes(&mut manager);
        // free holes: 16, 12, 20 -> trapped = 16 + 12
        let expected = (16 + 12) as f64 / 64.0;
        assert!((manager.fragmentation_ratio() - expected).abs() < 1e-9);
    }
}
