use std::{cell::RefCell, rc::Rc};

use crate::{
    arbiter::ExecutionDirective,
    callback::{callback_ref, on_hit, CallbackRef, HitInfo, ScriptCallback},
    memory::*,
};

/// Construct a word from bytes (high to low).
const fn make_32(bytes: &[u8]) -> u32 {
    ((bytes[3] as u32) << 24) |
    ((bytes[2] as u32) << 16) |
    ((bytes[1] as u32) << 8) |
    (bytes[0] as u32)
}

pub struct TestMem(Vec<u32>);

impl TestMem {
    pub fn new(size: usize) -> Self {
        Self((0..size).map(|i| (i & 0xFF) as u8)
            .collect::<Vec<_>>()
            .chunks_exact(4)
            .map(make_32)
            .collect::<Vec<_>>()
        )
    }
}

impl Mem32 for TestMem {
    fn load_byte(&mut self, _cycle: MemCycleType, addr: u32) -> (u8, usize) {
        let idx = (addr >> 2) as usize;
        let data = self.0[idx];
        let shift = (addr & 3) * 8;
        let ret = (data >> shift) as u8;
        (ret, 1)
    }
    fn store_byte(&mut self, _cycle: MemCycleType, addr: u32, data: u8) -> usize {
        let idx = (addr >> 2) as usize;
        let stored = self.0[idx];
        let shift = (addr & 3) * 8;
        let mask = !(0xFF << shift);
        self.0[idx] = (stored & mask) | ((data as u32) << shift);
        1
    }

    fn load_halfword(&mut self, _cycle: MemCycleType, addr: u32) -> (u16, usize) {
        let idx = (addr >> 2) as usize;
        let data = self.0[idx];
        let shift = (addr & 2) * 8;
        let ret = (data >> shift) as u16;
        (ret, 1)
    }
    fn store_halfword(&mut self, _cycle: MemCycleType, addr: u32, data: u16) -> usize {
        let idx = (addr >> 2) as usize;
        let stored = self.0[idx];
        let shift = (addr & 2) * 8;
        let mask = !(0xFFFF << shift);
        self.0[idx] = (stored & mask) | ((data as u32) << shift);
        1
    }

    fn load_word(&mut self, _cycle: MemCycleType, addr: u32) -> (u32, usize) {
        let idx = (addr >> 2) as usize;
        (self.0[idx], 1)
    }
    fn store_word(&mut self, _cycle: MemCycleType, addr: u32, data: u32) -> usize {
        let idx = (addr >> 2) as usize;
        self.0[idx] = data;
        1
    }
}

/// A callback that does nothing.
pub fn noop() -> CallbackRef {
    callback_ref(on_hit(|_, _| ExecutionDirective::Continue))
}

/// Records every hit and answers with a fixed directive.
#[derive(Clone)]
pub struct Recorder {
    pub hits: Rc<RefCell<Vec<HitInfo>>>,
    pub directive: ExecutionDirective,
}

impl Recorder {
    pub fn new(directive: ExecutionDirective) -> Self {
        Self {
            hits: Rc::new(RefCell::new(Vec::new())),
            directive,
        }
    }

    pub fn count(&self) -> usize {
        self.hits.borrow().len()
    }

    pub fn last(&self) -> Option<HitInfo> {
        self.hits.borrow().last().copied()
    }
}

impl ScriptCallback for Recorder {
    fn hit(&mut self, info: &HitInfo, _ctl: &mut crate::ScriptControl) -> ExecutionDirective {
        self.hits.borrow_mut().push(*info);
        self.directive
    }
}
