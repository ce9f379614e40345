/// Compiled code tracking.
///
/// The execution engine reports each block it compiles. Breakpoints added
/// afterwards over one of these blocks are not checked by the compiled code,
/// so the engine must be told to drop the block.

use std::collections::{
    BTreeMap, HashSet
};

use tracing::debug;

use crate::breakpoint::Breakpoint;

/// Inclusive address range of one compiled block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CompiledBlock {
    pub start: u32,
    pub end: u32,
}

impl CompiledBlock {
    pub fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }
}

#[derive(Default, Debug)]
pub struct CompiledRegions {
    /// Keyed by entry address.
    blocks: BTreeMap<u32, u32>,
    branch_targets: HashSet<u32>,
    /// Largest `end - start` tracked so far. Bounds the lookup window.
    max_span: u32,
}

impl CompiledRegions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a block. A block with the same entry replaces the old one.
    /// Reversed ranges are ignored.
    pub fn insert(&mut self, start: u32, end: u32) {
        if end < start {
            debug!(start, end, "ignoring reversed compiled block");
            return;
        }
        self.max_span = self.max_span.max(end - start);
        self.blocks.insert(start, end);
    }

    pub fn add_branch_target(&mut self, addr: u32) {
        self.branch_targets.insert(addr);
    }

    pub fn is_branch_target(&self, addr: u32) -> bool {
        self.branch_targets.contains(&addr)
    }

    /// Is this address the entry of a block?
    pub fn is_entry(&self, addr: u32) -> bool {
        self.blocks.contains_key(&addr)
    }

    /// Find the block covering the address.
    /// When blocks overlap the one with the highest entry wins.
    pub fn block_containing(&self, addr: u32) -> Option<CompiledBlock> {
        // No block that starts before this can reach addr.
        let lowest = addr.saturating_sub(self.max_span);
        self.blocks.range(lowest..=addr)
            .rev()
            .map(|(&start, &end)| CompiledBlock { start, end })
            .find(|block| block.contains(addr))
    }

    pub fn overlaps(&self, bp: &Breakpoint) -> bool {
        self.blocks.iter().any(|(&start, &end)| bp.overlaps(start, end))
    }

    /// Stop tracking every block that covers part of the breakpoint.
    pub fn invalidate_breakpoint(&mut self, bp: &Breakpoint) -> Vec<CompiledBlock> {
        self.remove_where(|block| bp.overlaps(block.start, block.end))
    }

    /// Stop tracking every block that covers part of `[start, end]`.
    pub fn invalidate_range(&mut self, start: u32, end: u32) -> Vec<CompiledBlock> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        self.branch_targets.retain(|&addr| addr < start || end < addr);
        self.remove_where(|block| block.start <= end && start <= block.end)
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
        self.branch_targets.clear();
        self.max_span = 0;
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&CompiledBlock) -> bool) -> Vec<CompiledBlock> {
        let removed = self.blocks.iter()
            .map(|(&start, &end)| CompiledBlock { start, end })
            .filter(|block| pred(block))
            .collect::<Vec<_>>();
        for block in removed.iter() {
            self.blocks.remove(&block.start);
        }
        removed
    }
}
