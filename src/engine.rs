/// Breakpoint engine.
///
/// The execution engine asks it, before each instruction or block and on
/// every load and store, whether a breakpoint fired and how to continue.
/// Scripts register breakpoints on it and are called back on hits.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path
};

use tracing::{debug, trace, warn};

use crate::{
    arbiter::{arbitrate, ExecutionDirective},
    breakpoint::{Breakpoint, BreakpointKind},
    callback::{callback_ref, CallbackRef, HitInfo, ScriptCallback, ScriptHost},
    compiled::{CompiledBlock, CompiledRegions},
    config::EngineConfig,
    error::{Error, Result},
    hit::{ExecHit, ExecStatus, HitContext, MemHit},
    registry::{Registry, ScriptControl},
    table::{BreakpointHandle, BreakpointTable},
    trace::{TraceMask, TraceRecord, TraceSession},
};

type TraceSink = TraceSession<Box<dyn Write>>;

/// The access the engine was last queried about.
#[derive(Clone, Copy)]
struct Access {
    addr: u32,
    opcode: u32,
    hits: u64,
}

/// Builder for the engine.
///
/// Call `build` to finish building.
pub struct EngineBuilder {
    config: EngineConfig,
    trace: Option<TraceSink>,
    host: Option<Box<dyn ScriptHost>>,
}

impl EngineBuilder {
    pub fn build(self) -> ScriptEngine {
        ScriptEngine {
            registry: Registry::new(),
            config: self.config,
            trace: self.trace,
            host: self.host,
            current: Access { addr: 0, opcode: 0, hits: 0 },
            last_read_opcode: 0,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn trace_categories(mut self, categories: TraceMask) -> Self {
        self.config.trace_categories = categories;
        self
    }

    pub fn check_branch_targets(mut self, check: bool) -> Self {
        self.config.check_branch_targets = check;
        self
    }

    pub fn auto_trace(mut self, auto: bool) -> Self {
        self.config.auto_trace = auto;
        self
    }

    pub fn with_trace_writer<W: Write + 'static>(mut self, writer: W) -> Result<Self> {
        self.trace = Some(TraceSession::new(Box::new(writer) as Box<dyn Write>)?);
        Ok(self)
    }

    pub fn with_trace_file<P: AsRef<Path>>(self, path: P) -> Result<Self> {
        let file = File::create(path)?;
        self.with_trace_writer(BufWriter::new(file))
    }

    pub fn set_host<H: ScriptHost + 'static>(mut self, host: H) -> Self {
        self.host = Some(Box::new(host));
        self
    }
}

pub struct ScriptEngine {
    registry: Registry,
    config: EngineConfig,
    trace: Option<TraceSink>,
    host: Option<Box<dyn ScriptHost>>,

    current: Access,
    last_read_opcode: u32,
}

impl ScriptEngine {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder {
            config: EngineConfig::default(),
            trace: None,
            host: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // Registration.

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

    /// Remove a breakpoint. The engine drops its reference to the callback.
    pub fn unregister(&mut self, handle: BreakpointHandle) -> Result<Breakpoint> {
        self.registry.unregister(handle)
    }

    pub fn breakpoint(&self, handle: BreakpointHandle) -> Option<Breakpoint> {
        self.registry.table(handle.kind()).get(handle)
    }

    pub fn table(&self, kind: BreakpointKind) -> &BreakpointTable {
        self.registry.table(kind)
    }

    // Compiled code.

    /// The execution engine compiled `[start, end]`.
    pub fn notify_block_compiled(&mut self, start: u32, end: u32) {
        trace!(start, end, "block compiled");
        self.registry.blocks.insert(start, end);
    }

    /// `addr` may be entered by a jump into the middle of a block.
    pub fn notify_branch_target(&mut self, addr: u32) {
        self.registry.blocks.add_branch_target(addr);
    }

    /// The execution engine dropped its compiled code for `[start, end]`.
    pub fn invalidate_blocks(&mut self, start: u32, end: u32) -> Vec<CompiledBlock> {
        let removed = self.registry.blocks.invalidate_range(start, end);
        if !removed.is_empty() {
            self.registry.prune_fresh();
        }
        removed
    }

    pub fn compiled_blocks(&self) -> &CompiledRegions {
        &self.registry.blocks
    }

    // Queries.

    /// Check for execution breakpoints at `pc`.
    pub fn on_before_instruction(&mut self, pc: u32) -> ExecutionDirective {
        self.check_execution(HitContext::new(pc)).directive
    }

    /// Check for execution breakpoints and run the callbacks of any that fired.
    pub fn check_execution(&mut self, ctx: HitContext) -> ExecHit {
        let pc = ctx.pc;
        let mask = self.registry.exec.hits(pc);
        let block = self.registry.blocks.block_containing(pc);

        let mut status = ExecStatus::empty();
        if block.is_some() {
            status.insert(ExecStatus::INSIDE_COMPILED);
        }
        if self.config.check_branch_targets && (ctx.possible_branch || self.registry.blocks.is_branch_target(pc)) {
            status.insert(ExecStatus::POSSIBLE_BRANCH);
        }

        self.current = Access { addr: pc, opcode: ctx.opcode.unwrap_or(0), hits: mask };
        if self.config.auto_trace {
            self.write_trace(TraceMask::EXEC);
        }

        // Breakpoints the compiled code at pc was built without.
        // On entry to a block, that is any in the rest of the block.
        let stale = match block {
            Some(block) if block.start == pc || status.contains(ExecStatus::POSSIBLE_BRANCH) => {
                self.registry.exec.overlapping(pc, block.end)
            },
            Some(_) => mask,
            None => 0,
        } & self.registry.fresh;

        if stale != 0 {
            let invalidated = self.registry.invalidate_fresh(stale);
            debug!(pc, stale, blocks = invalidated.len(), "flushing compiled code for appended breakpoint");
            // Callbacks run when the interpreter comes back to this pc.
            return ExecHit {
                mask,
                status,
                new_append: true,
                invalidated,
                directive: ExecutionDirective::FlushAndInterpret,
            };
        }

        self.registry.appended = 0;
        let requested = self.dispatch(BreakpointKind::Exec, mask, pc, ctx.opcode, status);
        let (new_append, invalidated) = self.take_appended();

        ExecHit {
            mask,
            status,
            new_append,
            invalidated,
            directive: arbitrate(mask, new_append, requested),
        }
    }

    /// Check for read breakpoints. `opcode` is the instruction doing the load.
    pub fn on_memory_read(&mut self, addr: u32, opcode: u32) -> MemHit {
        self.last_read_opcode = opcode;
        self.check_memory(BreakpointKind::Read, addr, Some(opcode))
    }

    /// Check for write breakpoints.
    pub fn on_memory_write(&mut self, addr: u32) -> MemHit {
        self.check_memory(BreakpointKind::Write, addr, None)
    }

    /// Opcode of the instruction behind the last read query.
    pub fn last_read_opcode(&self) -> u32 {
        self.last_read_opcode
    }

    fn check_memory(&mut self, kind: BreakpointKind, addr: u32, opcode: Option<u32>) -> MemHit {
        let mask = self.registry.table(kind).hits(addr);

        self.current = Access { addr, opcode: opcode.unwrap_or(0), hits: mask };
        if self.config.auto_trace {
            let category = if kind == BreakpointKind::Read { TraceMask::READ } else { TraceMask::WRITE };
            self.write_trace(category);
        }

        self.registry.appended = 0;
        let requested = self.dispatch(kind, mask, addr, opcode, ExecStatus::empty());
        let (new_append, invalidated) = self.take_appended();

        MemHit {
            mask,
            opcode,
            new_append,
            invalidated,
            directive: arbitrate(mask, new_append, requested),
        }
    }

    /// Run the callbacks of every slot in `mask`.
    ///
    /// The callbacks are captured first. A breakpoint removed by an earlier
    /// callback in the same query does not fire.
    fn dispatch(&mut self, kind: BreakpointKind, mask: u64, addr: u32, opcode: Option<u32>, status: ExecStatus) -> ExecutionDirective {
        if mask == 0 {
            return ExecutionDirective::Continue;
        }

        let snapshot = self.registry.table(kind).snapshot(mask);
        let mut directive = ExecutionDirective::Continue;
        for entry in snapshot {
            if !self.registry.table(kind).is_current(entry.index, entry.generation) {
                trace!(%kind, index = entry.index, "breakpoint removed before its callback ran");
                continue;
            }
            trace!(%kind, index = entry.index, addr, "breakpoint hit");

            let info = HitInfo {
                kind,
                index: entry.index,
                addr,
                opcode,
                status,
            };
            let mut ctl = ScriptControl::new(&mut self.registry);
            let requested = entry.callback.borrow_mut().hit(&info, &mut ctl);
            directive = directive.combine(requested);
        }
        directive
    }

    /// Handle execution breakpoints that callbacks added over compiled code.
    fn take_appended(&mut self) -> (bool, Vec<CompiledBlock>) {
        let appended = std::mem::take(&mut self.registry.appended);
        if appended == 0 {
            return (false, Vec::new());
        }
        let invalidated = self.registry.invalidate_fresh(appended);
        debug!(appended, blocks = invalidated.len(), "callback appended breakpoint over compiled code");
        (true, invalidated)
    }

    // Tracing.

    /// Record the current access if a trace sink is open and `mask`
    /// selects an enabled category.
    ///
    /// Returns true if a record was written. Never fails: a sink that
    /// errors is closed and later calls return false.
    pub fn write_trace(&mut self, mask: TraceMask) -> bool {
        let category = mask & self.config.trace_categories;
        if category.is_empty() {
            return false;
        }
        let session = match self.trace.as_mut() {
            Some(session) => session,
            None => return false,
        };

        let record = TraceRecord {
            addr: self.current.addr,
            opcode: self.current.opcode,
            category,
            hits: self.current.hits,
        };
        match session.write_record(&record) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "trace write failed, closing trace sink");
                self.trace = None;
                false
            }
        }
    }

    /// Start a trace session to the writer, closing any open one.
    pub fn open_trace_writer<W: Write + 'static>(&mut self, writer: W) -> Result<()> {
        let session = TraceSession::new(Box::new(writer) as Box<dyn Write>)?;
        if let Some(old) = self.trace.replace(session) {
            if let Err(e) = old.finish() {
                warn!(error = %e, "failed to flush previous trace sink");
            }
        }
        debug!("trace session opened");
        Ok(())
    }

    pub fn open_trace_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.open_trace_writer(BufWriter::new(file))
    }

    /// End the trace session. Returns how many records it holds.
    pub fn close_trace(&mut self) -> Result<u64> {
        let session = self.trace.take().ok_or(Error::TraceSinkUnavailable)?;
        let records = session.records();
        session.finish()?;
        debug!(records, "trace session closed");
        Ok(records)
    }

    pub fn flush_trace(&mut self) -> Result<()> {
        let session = self.trace.as_mut().ok_or(Error::TraceSinkUnavailable)?;
        session.flush()?;
        Ok(())
    }

    pub fn is_tracing(&self) -> bool {
        self.trace.is_some()
    }

    // Lifecycle.

    pub fn set_host<H: ScriptHost + 'static>(&mut self, host: H) {
        self.host = Some(Box::new(host));
    }

    /// A new program was loaded: every compiled block is gone.
    pub fn on_program_loaded(&mut self) {
        debug!("program loaded");
        self.registry.blocks.clear();
        self.registry.fresh = 0;
        if let Some(host) = self.host.as_mut() {
            host.program_loaded();
        }
    }

    pub fn on_resume(&mut self) {
        debug!("emulation resumed");
        if let Some(host) = self.host.as_mut() {
            host.resumed();
        }
    }

    pub fn on_suspend(&mut self) {
        debug!("emulation suspended");
        if let Some(session) = self.trace.as_mut() {
            if let Err(e) = session.flush() {
                warn!(error = %e, "failed to flush trace sink");
            }
        }
        if let Some(host) = self.host.as_mut() {
            host.suspended();
        }
    }

    /// Close the trace session and remove every breakpoint.
    pub fn finalize(&mut self) -> Result<()> {
        debug!("finalizing");
        let trace = match self.trace.take() {
            Some(session) => session.finish().map(|_| ()),
            None => Ok(()),
        };
        self.registry.clear();
        self.registry.blocks.clear();
        if let Some(host) = self.host.as_mut() {
            host.finalized();
        }
        trace
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new()
    }
}
