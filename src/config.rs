/// Engine settings.

use crate::trace::TraceMask;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Categories `write_trace` will record.
    pub trace_categories: TraceMask,
    /// Compute the possible-branch status bit for execution checks.
    pub check_branch_targets: bool,
    /// Write a trace record for every execution and memory query.
    pub auto_trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trace_categories: TraceMask::all(),
            check_branch_targets: true,
            auto_trace: false,
        }
    }
}
