/// Fixed capacity breakpoint tables.

use tracing::debug;

use crate::{
    breakpoint::{Breakpoint, BreakpointKind, Slot},
    callback::CallbackRef,
    common::bit_64,
    error::{Error, Result},
};

/// Slots per table.
pub const MAX_BREAKPOINTS: usize = 32;

/// Identifies a registered breakpoint.
///
/// The generation changes every time a slot is filled, so a handle that
/// outlives its breakpoint cannot remove a later one in the same slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BreakpointHandle {
    kind: BreakpointKind,
    index: u8,
    generation: u32,
}

impl BreakpointHandle {
    pub fn kind(&self) -> BreakpointKind {
        self.kind
    }

    /// Slot index, which is also the bit of this breakpoint in a hit mask.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// A callback captured before any callback of a query runs.
pub struct SnapshotEntry {
    pub index: usize,
    pub generation: u32,
    pub callback: CallbackRef,
}

pub struct BreakpointTable {
    kind: BreakpointKind,
    slots: [Slot; MAX_BREAKPOINTS],
    generations: [u32; MAX_BREAKPOINTS],
    /// Scans stop after this slot.
    highest: Option<usize>,
}

impl BreakpointTable {
    pub fn new(kind: BreakpointKind) -> Self {
        Self {
            kind,
            slots: Default::default(),
            generations: [0; MAX_BREAKPOINTS],
            highest: None,
        }
    }

    pub fn kind(&self) -> BreakpointKind {
        self.kind
    }

    /// Put the breakpoint in the first empty slot.
    pub fn register(&mut self, bp: Breakpoint, callback: CallbackRef) -> Result<BreakpointHandle> {
        if bp.length == 0 {
            return Err(Error::ZeroLength);
        }
        let index = self.slots.iter()
            .position(Slot::is_empty)
            .ok_or(Error::CapacityExceeded { kind: self.kind })?;

        self.generations[index] = self.generations[index].wrapping_add(1);
        self.slots[index] = Slot::Occupied { bp, callback };
        self.highest = Some(self.highest.map_or(index, |h| h.max(index)));

        debug!(kind = %self.kind, index, base = bp.base, length = bp.length, "breakpoint registered");
        Ok(BreakpointHandle {
            kind: self.kind,
            index: index as u8,
            generation: self.generations[index],
        })
    }

    /// Empty the slot. The hole is reused by later registrations.
    pub fn unregister(&mut self, handle: BreakpointHandle) -> Result<Breakpoint> {
        let invalid = Error::IndexInvalid { kind: self.kind, index: handle.index() };
        if handle.kind != self.kind || !self.is_current(handle.index(), handle.generation) {
            return Err(invalid);
        }
        let bp = match std::mem::take(&mut self.slots[handle.index()]) {
            Slot::Occupied { bp, .. } => bp,
            Slot::Empty => return Err(invalid),
        };
        if self.highest == Some(handle.index()) {
            self.highest = self.slots.iter().rposition(|s| !s.is_empty());
        }

        debug!(kind = %self.kind, index = handle.index(), "breakpoint removed");
        Ok(bp)
    }

    /// Empty every slot.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::Empty;
        }
        self.highest = None;
    }

    /// Does the handle still refer to the breakpoint it was issued for?
    pub fn is_current(&self, index: usize, generation: u32) -> bool {
        index < MAX_BREAKPOINTS
            && !self.slots[index].is_empty()
            && self.generations[index] == generation
    }

    pub fn get(&self, handle: BreakpointHandle) -> Option<Breakpoint> {
        if handle.kind == self.kind && self.is_current(handle.index(), handle.generation) {
            self.slots[handle.index()].breakpoint()
        } else {
            None
        }
    }

    pub fn breakpoint(&self, index: usize) -> Option<Breakpoint> {
        self.slots.get(index).and_then(Slot::breakpoint)
    }

    /// Test every populated slot against the address.
    ///
    /// Returns a mask with bit n set if slot n matched.
    pub fn hits(&self, addr: u32) -> u64 {
        let end = match self.highest {
            Some(h) => h + 1,
            None => return 0,
        };
        self.slots[..end].iter()
            .enumerate()
            .filter(|(_, slot)| slot.breakpoint().map_or(false, |bp| bp.test(addr)))
            .fold(0, |mask, (n, _)| mask | bit_64(n))
    }

    /// Mask of populated slots whose range overlaps `[start, end]`.
    pub fn overlapping(&self, start: u32, end: u32) -> u64 {
        self.iter()
            .filter(|(_, bp)| bp.overlaps(start, end))
            .fold(0, |mask, (n, _)| mask | bit_64(n))
    }

    /// Capture the callbacks of the slots in the mask.
    pub fn snapshot(&self, mask: u64) -> Vec<SnapshotEntry> {
        crate::common::set_bits(mask)
            .filter_map(|index| {
                let callback = self.slots.get(index)?.callback()?.clone();
                Some(SnapshotEntry {
                    index,
                    generation: self.generations[index],
                    callback,
                })
            })
            .collect()
    }

    /// Populated slots with their index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Breakpoint)> + '_ {
        self.slots.iter()
            .enumerate()
            .filter_map(|(n, slot)| slot.breakpoint().map(|bp| (n, bp)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.highest.is_none()
    }
}
