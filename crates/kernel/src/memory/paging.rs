//! Paged allocator: a fixed frame table, per-process page tables and
//! FIFO / LRU / Optimal-approximation replacement.

use core::str::FromStr;
use std::collections::VecDeque;

use bitflags::bitflags;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::process::{Pid, Tick};

pub const DEFAULT_PAGE_SIZE_MB: u64 = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown replacement policy {0:?}")]
pub struct ParseReplacementPolicyError(pub String);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplacementPolicy {
    Fifo,
    Lru,
    /// Approximated: without future knowledge the victim is the occupied
    /// frame that has gone unreferenced the longest. Kept separate from
    /// LRU so a real predictor can be swapped in.
    Optimal,
}

impl ReplacementPolicy {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Fifo => "FIFO",
            Self::Lru => "LRU",
            Self::Optimal => "Optimal",
        }
    }
}

impl FromStr for ReplacementPolicy {
    type Err = ParseReplacementPolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lru" => Ok(Self::Lru),
            "optimal" => Ok(Self::Optimal),
            _ => Err(ParseReplacementPolicyError(s.into())),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FrameFlags: u8 {
        const REFERENCED = 1 << 0;
        const MODIFIED = 1 << 1;
    }
}

/// A physical page slot.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub owner: Option<Pid>,
    pub page_number: Option<u64>,
    pub loaded_tick: Tick,
    pub last_accessed: Tick,
    pub flags: FrameFlags,
}

impl Frame {
    const fn empty(index: usize) -> Self {
        Self {
            index,
            owner: None,
            page_number: None,
            loaded_tick: 0,
            last_accessed: 0,
            flags: FrameFlags::empty(),
        }
    }

    #[inline]
    pub const fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    fn evict(&mut self) {
        self.owner = None;
        self.page_number = None;
        self.loaded_tick = 0;
        self.last_accessed = 0;
        self.flags = FrameFlags::empty();
    }

    fn load(&mut self, pid: Pid, page: u64, now: Tick) {
        self.owner = Some(pid);
        self.page_number = Some(page);
        self.loaded_tick = now;
        self.last_accessed = now;
        self.flags = FrameFlags::REFERENCED;
    }
}

/// Serializable view of a frame for the snapshot surface.
#[derive(Serialize, Debug, Clone)]
pub struct FrameInfo {
    pub index: usize,
    pub owner: Option<Pid>,
    pub page_number: Option<u64>,
    pub loaded_tick: Tick,
    pub last_accessed: Tick,
    pub referenced: bool,
    pub modified: bool,
}

impl From<&Frame> for FrameInfo {
    fn from(frame: &Frame) -> Self {
        Self {
            index: frame.index,
            owner: frame.owner,
            page_number: frame.page_number,
            loaded_tick: frame.loaded_tick,
            last_accessed: frame.last_accessed,
            referenced: frame.flags.contains(FrameFlags::REFERENCED),
            modified: frame.flags.contains(FrameFlags::MODIFIED),
        }
    }
}

/// One row of a process's page table, indexed by logical page number.
#[derive(Debug, Clone)]
pub struct PageTableEntry {
    pub page_number: u64,
    pub frame: Option<usize>,
    pub valid: bool,
    pub loaded_tick: Tick,
    pub last_accessed: Tick,
    pub flags: FrameFlags,
}

impl PageTableEntry {
    const fn unmapped(page_number: u64) -> Self {
        Self {
            page_number,
            frame: None,
            valid: false,
            loaded_tick: 0,
            last_accessed: 0,
            flags: FrameFlags::empty(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct PagedAllocationOutcome {
    pub success: bool,
    /// faults charged by this allocation alone
    pub page_faults: u64,
    pub pages_allocated: u64,
}

#[derive(Serialize, Debug, Clone, Copy)]
pub struct PagingStats {
    pub policy: ReplacementPolicy,
    pub page_faults: u64,
    pub page_hits: u64,
    pub page_fault_rate: f64,
    pub memory_utilization: f64,
}

#[derive(Debug, Clone)]
pub struct PagedMemoryManager {
    total_mb: u64,
    page_size_mb: u64,
    policy: ReplacementPolicy,
    frames: Vec<Frame>,
    page_tables: HashMap<Pid, Vec<PageTableEntry>>,
    /// insertion order of bound frames, head = oldest
    fifo_queue: VecDeque<usize>,
    page_faults: u64,
    page_hits: u64,
    total_accesses: u64,
}

impl PagedMemoryManager {
    pub fn new(total_mb: u64, page_size_mb: u64, policy: ReplacementPolicy) -> Self {
        let page_size_mb = page_size_mb.max(1);
        let frame_count = (total_mb / page_size_mb) as usize;
        Self {
            total_mb,
            page_size_mb,
            policy,
            frames: (0..frame_count).map(Frame::empty).collect(),
            page_tables: HashMap::new(),
            fifo_queue: VecDeque::with_capacity(frame_count),
            page_faults: 0,
            page_hits: 0,
            total_accesses: 0,
        }
    }

    #[inline]
    pub const fn total_mb(&self) -> u64 {
        self.total_mb
    }

    #[inline]
    pub const fn page_size_mb(&self) -> u64 {
        self.page_size_mb
    }

    #[inline]
    pub const fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    #[inline]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub const fn lifetime_faults(&self) -> u64 {
        self.page_faults
    }

    #[inline]
    pub const fn lifetime_hits(&self) -> u64 {
        self.page_hits
    }

    /// Maps `ceil(size / page_size)` pages for `pid`. Free frames are taken
    /// first; afterwards each page costs a replacement, which counts as one
    /// page fault. A process may span more pages than the unit has frames;
    /// the tail of the allocation then evicts its own head.
    pub fn allocate(&mut self, pid: Pid, size_mb: u64, now: Tick) -> PagedAllocationOutcome {
        let pages_needed = size_mb.div_ceil(self.page_size_mb);
        let mut table = Vec::with_capacity(pages_needed as usize);
        let mut faults = 0;
        for page in 0..pages_needed {
            let (frame_index, replaced) = match self.find_free_frame() {
                Some(free) => (free, false),
                None => {
                    let Some(victim) = self.select_victim(now) else {
                        return PagedAllocationOutcome {
                            success: false,
                            page_faults: faults,
                            pages_allocated: table.len() as u64,
                        };
                    };
                    self.invalidate_mapping(victim);
                    (victim, true)
                }
            };

            self.bind_frame(frame_index, pid, page, now);
            if replaced {
                faults += 1;
                self.page_faults += 1;
            }

            let mut entry = PageTableEntry::unmapped(page);
            entry.frame = Some(frame_index);
            entry.valid = true;
            entry.loaded_tick = now;
            entry.last_accessed = now;
            table.push(entry);
        }

        self.page_tables.insert(pid, table);
        self.total_accesses += pages_needed;
        PagedAllocationOutcome {
            success: true,
            page_faults: faults,
            pages_allocated: pages_needed,
        }
    }

    /// Touches `page` for `pid`. A valid mapping is a hit and refreshes the
    /// recency bookkeeping; anything else charges a fault and loads the
    /// page (free frame or victim). Returns `true` on a hit.
    pub fn access_page(&mut self, pid: Pid, page: u64, now: Tick) -> bool {
        self.total_accesses += 1;

        let mapped = {
            let Some(entry) = self
                .page_tables
                .get(&pid)
                .and_then(|table| table.get(page as usize))
            else {
                return false;
            };
            if entry.valid { entry.frame } else { None }
        };

        if let Some(frame_index) = mapped {
            self.page_hits += 1;
            if let Some(entry) = self
                .page_tables
                .get_mut(&pid)
                .and_then(|table| table.get_mut(page as usize))
            {
                entry.last_accessed = now;
                entry.flags |= FrameFlags::REFERENCED;
            }
            let frame = &mut self.frames[frame_index];
            frame.last_accessed = now;
            frame.flags |= FrameFlags::REFERENCED;
            return true;
        }

        self.page_faults += 1;
        let frame_index = match self.find_free_frame() {
            Some(free) => free,
            None => {
                let Some(victim) = self.select_victim(now) else {
                    return false;
                };
                self.invalidate_mapping(victim);
                victim
            }
        };

        self.bind_frame(frame_index, pid, page, now);
        if let Some(entry) = self
            .page_tables
            .get_mut(&pid)
            .and_then(|table| table.get_mut(page as usize))
        {
            entry.frame = Some(frame_index);
            entry.valid = true;
            entry.loaded_tick = now;
            entry.last_accessed = now;
        }
        false
    }

    /// Drops the whole page table of `pid` and frees its frames.
    pub fn release(&mut self, pid: Pid) {
        let Some(table) = self.page_tables.remove(&pid) else {
            return;
        };
        for entry in table {
            if let Some(frame_index) = entry.frame
                && entry.valid
            {
                self.frames[frame_index].evict();
                self.fifo_queue.retain(|&i| i != frame_index);
            }
        }
    }

    pub fn page_fault_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            return 0.0;
        }
        self.page_faults as f64 / self.total_accesses as f64
    }

    pub fn memory_utilization(&self) -> f64 {
        if self.frames.is_empty() {
            return 0.0;
        }
        let used = self.frames.iter().filter(|f| !f.is_free()).count();
        used as f64 / self.frames.len() as f64
    }

    pub fn snapshot_frames(&self) -> Vec<FrameInfo> {
        self.frames.iter().map(FrameInfo::from).collect()
    }

    pub fn page_table(&self, pid: Pid) -> Option<&[PageTableEntry]> {
        self.page_tables.get(&pid).map(Vec::as_slice)
    }

    pub fn stats(&self) -> PagingStats {
        PagingStats {
            policy: self.policy,
            page_faults: self.page_faults,
            page_hits: self.page_hits,
            page_fault_rate: self.page_fault_rate(),
            memory_utilization: self.memory_utilization(),
        }
    }

    /// Per-tick maintenance hook; nothing ages yet.
    pub fn tick(&mut self, _now: Tick) {}

    fn find_free_frame(&self) -> Option<usize> {
        self.frames.iter().position(Frame::is_free)
    }

    fn select_victim(&self, now: Tick) -> Option<usize> {
        match self.policy {
            ReplacementPolicy::Fifo => self
                .fifo_queue
                .front()
                .copied()
                .or_else(|| self.frames.iter().position(|f| !f.is_free())),
            ReplacementPolicy::Lru => self
                .frames
                .iter()
                .filter(|f| !f.is_free())
                .min_by_key(|f| f.last_accessed)
                .map(|f| f.index),
            ReplacementPolicy::Optimal => self
                .frames
                .iter()
                .filter(|f| !f.is_free())
                .max_by_key(|f| now.saturating_sub(f.last_accessed))
                .map(|f| f.index),
        }
    }

    /// Clears the victim's old page-table entry (frame number and valid
    /// bit) before the frame is handed to a new page.
    fn invalidate_mapping(&mut self, frame_index: usize) {
        let Some(owner) = self.frames[frame_index].owner else {
            return;
        };
        if let Some(table) = self.page_tables.get_mut(&owner) {
            for entry in table.iter_mut() {
                if entry.frame == Some(frame_index) {
                    entry.frame = None;
                    entry.valid = false;
                }
            }
        }
    }

    fn bind_frame(&mut self, frame_index: usize, pid: Pid, page: u64, now: Tick) {
        self.frames[frame_index].load(pid, page, now);
        self.fifo_queue.retain(|&i| i != frame_index);
        self.fifo_queue.push_back(frame_index);
    }
}
