/// Memory interface and breakpoint-checked memory.

use crate::{
    arbiter::ExecutionDirective,
    compiled::CompiledBlock,
    engine::ScriptEngine,
    hit::MemHit,
};

/// Cycle types for memory accesses.
///
/// Non-sequential operations occur with random memory transfers or branches.
/// Sequential operations happen with normal instruction fetches and multi-transfers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MemCycleType {
    /// Sequential
    S,
    /// Non-sequential
    N
}

/// A 32-bit memory interface.
/// Capable of loading and storing bytes (8-bit), halfwords (16-bit), and words (32-bit).
///
/// All operations return the amount of cycles needed to do the transfer.
pub trait Mem32 {
    fn load_byte(&mut self, cycle: MemCycleType, addr: u32) -> (u8, usize);
    fn store_byte(&mut self, cycle: MemCycleType, addr: u32, data: u8) -> usize;

    fn load_halfword(&mut self, cycle: MemCycleType, addr: u32) -> (u16, usize);
    fn store_halfword(&mut self, cycle: MemCycleType, addr: u32, data: u16) -> usize;

    fn load_word(&mut self, cycle: MemCycleType, addr: u32) -> (u32, usize);
    fn store_word(&mut self, cycle: MemCycleType, addr: u32, data: u32) -> usize;
}

/// Memory that checks read and write breakpoints on every access.
///
/// The CPU sets the opcode of each instruction before executing it, and
/// collects the combined directive of its accesses afterwards with
/// `take_directive`. Write breakpoints are checked before the store happens.
pub struct WatchedMem<M: Mem32> {
    mem: M,
    engine: ScriptEngine,

    opcode: u32,
    directive: ExecutionDirective,
    invalidated: Vec<CompiledBlock>,
}

impl<M: Mem32> WatchedMem<M> {
    pub fn new(mem: M, engine: ScriptEngine) -> Self {
        Self {
            mem,
            engine,

            opcode: 0,
            directive: ExecutionDirective::Continue,
            invalidated: Vec::new(),
        }
    }

    pub fn engine(&self) -> &ScriptEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut ScriptEngine {
        &mut self.engine
    }

    pub fn inner(&self) -> &M {
        &self.mem
    }

    pub fn inner_mut(&mut self) -> &mut M {
        &mut self.mem
    }

    /// Set the opcode reported with read hits.
    pub fn set_opcode(&mut self, opcode: u32) {
        self.opcode = opcode;
    }

    /// Directive from the accesses since the last call.
    pub fn take_directive(&mut self) -> ExecutionDirective {
        std::mem::replace(&mut self.directive, ExecutionDirective::Continue)
    }

    /// Compiled blocks dropped because of the accesses since the last call.
    pub fn take_invalidated(&mut self) -> Vec<CompiledBlock> {
        std::mem::take(&mut self.invalidated)
    }

    pub fn into_parts(self) -> (M, ScriptEngine) {
        (self.mem, self.engine)
    }

    fn check_read(&mut self, addr: u32) {
        let hit = self.engine.on_memory_read(addr, self.opcode);
        self.merge(hit);
    }

    fn check_write(&mut self, addr: u32) {
        let hit = self.engine.on_memory_write(addr);
        self.merge(hit);
    }

    fn merge(&mut self, hit: MemHit) {
        self.directive = self.directive.combine(hit.directive);
        self.invalidated.extend(hit.invalidated);
    }
}

impl<M: Mem32> Mem32 for WatchedMem<M> {
    fn load_byte(&mut self, cycle: MemCycleType, addr: u32) -> (u8, usize) {
        self.check_read(addr);
        self.mem.load_byte(cycle, addr)
    }
    fn store_byte(&mut self, cycle: MemCycleType, addr: u32, data: u8) -> usize {
        self.check_write(addr);
        self.mem.store_byte(cycle, addr, data)
    }

    fn load_halfword(&mut self, cycle: MemCycleType, addr: u32) -> (u16, usize) {
        self.check_read(addr);
        self.mem.load_halfword(cycle, addr)
    }
    fn store_halfword(&mut self, cycle: MemCycleType, addr: u32, data: u16) -> usize {
        self.check_write(addr);
        self.mem.store_halfword(cycle, addr, data)
    }

    fn load_word(&mut self, cycle: MemCycleType, addr: u32) -> (u32, usize) {
        self.check_read(addr);
        self.mem.load_word(cycle, addr)
    }
    fn store_word(&mut self, cycle: MemCycleType, addr: u32, data: u32) -> usize {
        self.check_write(addr);
        self.mem.store_word(cycle, addr, data)
    }
}
