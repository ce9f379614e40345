/// Breakpoint tables and compiled code state shared by the engine and callbacks.

use tracing::debug;

use crate::{
    breakpoint::{Breakpoint, BreakpointKind},
    callback::{callback_ref, CallbackRef, ScriptCallback},
    common::bit_64,
    compiled::{CompiledBlock, CompiledRegions},
    error::Result,
    table::{BreakpointHandle, BreakpointTable},
};

pub(crate) struct Registry {
    pub exec: BreakpointTable,
    pub read: BreakpointTable,
    pub write: BreakpointTable,
    pub blocks: CompiledRegions,
    /// Execution slots registered over code that was already compiled.
    pub fresh: u64,
    /// Fresh slots registered since the engine last reset this.
    pub appended: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            exec: BreakpointTable::new(BreakpointKind::Exec),
            read: BreakpointTable::new(BreakpointKind::Read),
            write: BreakpointTable::new(BreakpointKind::Write),
            blocks: CompiledRegions::new(),
            fresh: 0,
            appended: 0,
        }
    }

    pub fn table(&self, kind: BreakpointKind) -> &BreakpointTable {
        match kind {
            BreakpointKind::Exec => &self.exec,
            BreakpointKind::Read => &self.read,
            BreakpointKind::Write => &self.write,
        }
    }

    pub fn table_mut(&mut self, kind: BreakpointKind) -> &mut BreakpointTable {
        match kind {
            BreakpointKind::Exec => &mut self.exec,
            BreakpointKind::Read => &mut self.read,
            BreakpointKind::Write => &mut self.write,
        }
    }

    pub fn register(&mut self, kind: BreakpointKind, base: u32, length: u32, callback: CallbackRef) -> Result<BreakpointHandle> {
        let bp = Breakpoint::new(base, length);
        let handle = self.table_mut(kind).register(bp, callback)?;
        if kind == BreakpointKind::Exec {
            let bit = bit_64(handle.index());
            if self.blocks.overlaps(&bp) {
                debug!(index = handle.index(), base, length, "breakpoint appended over compiled code");
                self.fresh |= bit;
                self.appended |= bit;
            } else {
                self.fresh &= !bit;
            }
        }
        Ok(handle)
    }

    pub fn unregister(&mut self, handle: BreakpointHandle) -> Result<Breakpoint> {
        let bp = self.table_mut(handle.kind()).unregister(handle)?;
        if handle.kind() == BreakpointKind::Exec {
            self.fresh &= !bit_64(handle.index());
            self.appended &= !bit_64(handle.index());
        }
        Ok(bp)
    }

    /// Drop every compiled block that a fresh breakpoint in `mask` covers,
    /// and stop treating those breakpoints as fresh.
    pub fn invalidate_fresh(&mut self, mask: u64) -> Vec<CompiledBlock> {
        let mask = mask & self.fresh;
        let mut invalidated = Vec::new();
        for index in crate::common::set_bits(mask) {
            if let Some(bp) = self.exec.breakpoint(index) {
                invalidated.extend(self.blocks.invalidate_breakpoint(&bp));
            }
        }
        self.fresh &= !mask;
        invalidated
    }

    /// Forget fresh breakpoints that no longer overlap any compiled block.
    pub fn prune_fresh(&mut self) {
        for index in crate::common::set_bits(self.fresh) {
            let covered = self.exec.breakpoint(index)
                .map_or(false, |bp| self.blocks.overlaps(&bp));
            if !covered {
                self.fresh &= !bit_64(index);
            }
        }
    }

    pub fn clear(&mut self) {
        self.exec.clear();
        self.read.clear();
        self.write.clear();
        self.fresh = 0;
        self.appended = 0;
    }
}

/// Lets a running callback add and remove breakpoints.
///
/// Changes go straight into the tables, but the query that invoked the
/// callback works from a snapshot taken before any callback ran. New
/// breakpoints fire from the next query onwards.
pub struct ScriptControl<'a> {
    registry: &'a mut Registry,
}

impl<'a> ScriptControl<'a> {
    pub(crate) fn new(registry: &'a mut Registry) -> Self {
        Self { registry }
    }

    pub fn register_execution_breakpoint<C>(&mut self, base: u32, length: u32, callback: C) -> Result<BreakpointHandle>
        where C: ScriptCallback + 'static
    {
        self.registry.register(BreakpointKind::Exec, base, length, callback_ref(callback))
    }

    pub fn register_read_breakpoint<C>(&mut self, base: u32, length: u32, callback: C) -> Result<BreakpointHandle>
        where C: ScriptCallback + 'static
    {
        self.registry.register(BreakpointKind::Read, base, length, callback_ref(callback))
    }

    pub fn register_write_breakpoint<C>(&mut self, base: u32, length: u32, callback: C) -> Result<BreakpointHandle>
        where C: ScriptCallback + 'static
    {
        self.registry.register(BreakpointKind::Write, base, length, callback_ref(callback))
    }

    /// Register with a callback that is already shared elsewhere.
    pub fn register_shared(&mut self, kind: BreakpointKind, base: u32, length: u32, callback: CallbackRef) -> Result<BreakpointHandle> {
        self.registry.register(kind, base, length, callback)
    }

    pub fn unregister(&mut self, handle: BreakpointHandle) -> Result<Breakpoint> {
        self.registry.unregister(handle)
    }

    pub fn breakpoint(&self, handle: BreakpointHandle) -> Option<Breakpoint> {
        self.registry.table(handle.kind()).get(handle)
    }
}
