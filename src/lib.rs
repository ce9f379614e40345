mod common;
mod breakpoint;
mod table;
mod callback;
mod registry;
mod hit;
mod compiled;
mod arbiter;
mod trace;
mod memory;
mod config;
mod error;
mod engine;

#[cfg(test)]
mod test_utils;

pub use crate::breakpoint::{
    Breakpoint, BreakpointKind
};

pub use crate::table::{
    BreakpointHandle, BreakpointTable, MAX_BREAKPOINTS
};

pub use crate::callback::{
    HitInfo, ScriptCallback, ScriptHost, CallbackRef, callback_ref, on_hit
};

pub use crate::registry::ScriptControl;

pub use crate::hit::{
    ExecHit, ExecStatus, HitContext, MemHit
};

pub use crate::compiled::{
    CompiledBlock, CompiledRegions
};

pub use crate::arbiter::{
    ExecutionDirective, arbitrate
};

pub use crate::trace::{
    TraceMask, TraceRecord, TraceReader, TraceSession,
    TRACE_MAGIC, TRACE_VERSION, TRACE_HEADER_SIZE, TRACE_RECORD_SIZE
};

pub use crate::memory::{
    Mem32, MemCycleType, WatchedMem
};

pub use crate::config::EngineConfig;

pub use crate::error::{
    Error, Result
};

pub use crate::engine::{
    ScriptEngine, EngineBuilder
};
