/// Script callback interface.

use std::{
    cell::RefCell,
    rc::Rc
};

use crate::{
    arbiter::ExecutionDirective,
    breakpoint::BreakpointKind,
    hit::ExecStatus,
    registry::ScriptControl,
};

/// What the engine passes to a callback when its breakpoint fires.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct HitInfo {
    pub kind: BreakpointKind,
    /// Slot that fired.
    pub index: usize,
    /// Program counter for execution hits, access address for memory hits.
    pub addr: u32,
    /// Opcode of the instruction doing the access, for read hits.
    pub opcode: Option<u32>,
    /// Compiled-code status of the program counter, for execution hits.
    pub status: ExecStatus,
}

/// Logic run when a breakpoint fires.
///
/// Called synchronously on the emulation thread. The returned directive tells
/// the execution engine how to continue. Breakpoints can be added or removed
/// through `ctl`; the changes are seen from the next query onwards.
pub trait ScriptCallback {
    fn hit(&mut self, info: &HitInfo, ctl: &mut ScriptControl) -> ExecutionDirective;
}

impl<F> ScriptCallback for F
    where F: FnMut(&HitInfo, &mut ScriptControl) -> ExecutionDirective
{
    fn hit(&mut self, info: &HitInfo, ctl: &mut ScriptControl) -> ExecutionDirective {
        self(info, ctl)
    }
}

/// Pin a closure to the callback signature.
///
/// Lets the closure's argument types be inferred at the call site.
pub fn on_hit<F>(f: F) -> F
    where F: FnMut(&HitInfo, &mut ScriptControl) -> ExecutionDirective
{
    f
}

/// Shared reference to a callback.
/// The engine holds one for as long as the breakpoint is registered.
pub type CallbackRef = Rc<RefCell<dyn ScriptCallback>>;

pub fn callback_ref<C: ScriptCallback + 'static>(callback: C) -> CallbackRef {
    Rc::new(RefCell::new(callback))
}

/// Receives emulation lifecycle events.
pub trait ScriptHost {
    /// A new program image was loaded.
    fn program_loaded(&mut self) {}
    /// Emulation resumed after a suspend.
    fn resumed(&mut self) {}
    /// Emulation suspended.
    fn suspended(&mut self) {}
    /// The engine is shutting down.
    fn finalized(&mut self) {}
}
