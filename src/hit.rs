/// Per-query hit results.
///
/// Nothing here is kept between queries. Every check rebuilds its result
/// from the tables and hands it back by value.

use bitflags::bitflags;

use crate::{
    arbiter::ExecutionDirective,
    common::{bit, test_bit_64},
    compiled::CompiledBlock,
};

bitflags! {
    /// Status of the program counter relative to compiled code.
    #[derive(Default)]
    pub struct ExecStatus: u32 {
        /// PC is inside a block the execution engine has compiled.
        const INSIDE_COMPILED = bit(8);
        /// PC may be reached by a jump into the middle of a block.
        const POSSIBLE_BRANCH = bit(9);
    }
}

/// Input to an execution check, supplied by the execution engine.
#[derive(Clone, Copy, Default, Debug)]
pub struct HitContext {
    pub pc: u32,
    /// Opcode at `pc`, if the engine has already fetched it.
    pub opcode: Option<u32>,
    /// The engine knows `pc` was reached by a branch.
    pub possible_branch: bool,
}

impl HitContext {
    pub fn new(pc: u32) -> Self {
        Self {
            pc,
            ..Default::default()
        }
    }
}

/// Result of an execution check.
#[derive(Clone, Default, Debug)]
pub struct ExecHit {
    /// One bit per execution slot that matched.
    pub mask: u64,
    pub status: ExecStatus,
    /// A breakpoint was added over code that was compiled before it existed.
    /// The execution engine must drop its cached code for `invalidated`.
    pub new_append: bool,
    /// Compiled blocks the engine stopped tracking as a result of this query.
    pub invalidated: Vec<CompiledBlock>,
    pub directive: ExecutionDirective,
}

impl ExecHit {
    pub fn is_hit(&self) -> bool {
        self.mask != 0
    }

    pub fn slot_hit(&self, index: usize) -> bool {
        test_bit_64(self.mask, index)
    }

    /// Hit mask with the status bits in the upper word.
    pub fn raw(&self) -> u64 {
        self.mask | ((self.status.bits() as u64) << 32)
    }
}

/// Result of a memory read or write check.
#[derive(Clone, Default, Debug)]
pub struct MemHit {
    /// One bit per slot that matched.
    pub mask: u64,
    /// Opcode doing the access, for reads.
    pub opcode: Option<u32>,
    /// A callback added an execution breakpoint over compiled code.
    pub new_append: bool,
    pub invalidated: Vec<CompiledBlock>,
    pub directive: ExecutionDirective,
}

impl MemHit {
    pub fn is_hit(&self) -> bool {
        self.mask != 0
    }

    pub fn slot_hit(&self, index: usize) -> bool {
        test_bit_64(self.mask, index)
    }
}
