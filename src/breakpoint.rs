/// Breakpoint ranges and table slots.

use std::fmt;

use crate::callback::CallbackRef;

/// Which event a breakpoint intercepts.
/// Each kind has its own independent table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BreakpointKind {
    /// Instruction fetch.
    Exec,
    /// Memory load.
    Read,
    /// Memory store.
    Write,
}

impl fmt::Display for BreakpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BreakpointKind::Exec => write!(f, "execution"),
            BreakpointKind::Read => write!(f, "read"),
            BreakpointKind::Write => write!(f, "write"),
        }
    }
}

/// An address interval `[base, base + length)`, modulo 2^32.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Breakpoint {
    pub base: u32,
    pub length: u32,
}

impl Breakpoint {
    pub const fn new(base: u32, length: u32) -> Self {
        Self { base, length }
    }

    /// Check if the address is inside the interval.
    ///
    /// A single wrapping subtraction covers both bounds, and stays correct
    /// when `base + length` runs past the top of the address space.
    #[inline]
    pub const fn test(&self, addr: u32) -> bool {
        addr.wrapping_sub(self.base) < self.length
    }

    /// Check if any address of the inclusive range `[start, end]` is inside the interval.
    pub const fn overlaps(&self, start: u32, end: u32) -> bool {
        if self.length == 0 {
            return false;
        }
        // Both ranges expressed as an offset from our base.
        let last = self.length - 1;
        let start_off = start.wrapping_sub(self.base);
        let end_off = end.wrapping_sub(self.base);
        if start_off <= last || end_off <= last {
            return true;
        }
        // The other range may fully contain ours.
        let span = end.wrapping_sub(start);
        self.base.wrapping_sub(start) <= span
    }
}

/// One entry of a breakpoint table.
#[derive(Clone)]
pub enum Slot {
    Empty,
    Occupied {
        bp: Breakpoint,
        callback: CallbackRef,
    },
}

impl Slot {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn breakpoint(&self) -> Option<Breakpoint> {
        match self {
            Slot::Empty => None,
            Slot::Occupied { bp, .. } => Some(*bp),
        }
    }

    pub fn callback(&self) -> Option<&CallbackRef> {
        match self {
            Slot::Empty => None,
            Slot::Occupied { callback, .. } => Some(callback),
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Slot::Empty
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => write!(f, "Empty"),
            Slot::Occupied { bp, .. } => f.debug_struct("Occupied")
                .field("base", &format_args!("{:#010X}", bp.base))
                .field("length", &format_args!("{:#X}", bp.length))
                .finish_non_exhaustive(),
        }
    }
}
