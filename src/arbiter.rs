/// Execution mode arbitration.

use num_traits::FromPrimitive;

/// What the execution engine should do with the current instruction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[repr(u32)]
pub enum ExecutionDirective {
    /// Keep running compiled code.
    Continue = 0,
    /// Drop the current compiled block and re-enter through the interpreter.
    FlushAndInterpret = 1,
    /// Run the current instruction again without advancing.
    ReplayOneInstruction = 2,
}

impl ExecutionDirective {
    /// Merge the requests of two callbacks that fired on the same query.
    /// A flush covers a replay, and a replay covers continuing.
    pub fn combine(self, other: Self) -> Self {
        use ExecutionDirective::*;
        match (self, other) {
            (FlushAndInterpret, _) | (_, FlushAndInterpret) => FlushAndInterpret,
            (ReplayOneInstruction, _) | (_, ReplayOneInstruction) => ReplayOneInstruction,
            _ => Continue,
        }
    }

    pub fn is_continue(self) -> bool {
        self == ExecutionDirective::Continue
    }
}

impl Default for ExecutionDirective {
    fn default() -> Self {
        ExecutionDirective::Continue
    }
}

/// Scripts report directives as plain integers.
impl FromPrimitive for ExecutionDirective {
    fn from_i64(n: i64) -> Option<Self> {
        if n < 0 {
            None
        } else {
            Self::from_u64(n as u64)
        }
    }

    fn from_u64(n: u64) -> Option<Self> {
        match n {
            0 => Some(ExecutionDirective::Continue),
            1 => Some(ExecutionDirective::FlushAndInterpret),
            2 => Some(ExecutionDirective::ReplayOneInstruction),
            _ => None,
        }
    }
}

/// Decide the directive for one query.
///
/// `requested` is the combined directive of every callback that ran.
pub fn arbitrate(mask: u64, new_append: bool, requested: ExecutionDirective) -> ExecutionDirective {
    if new_append {
        ExecutionDirective::FlushAndInterpret
    } else if mask == 0 {
        ExecutionDirective::Continue
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ExecutionDirective::*;

    #[test]
    fn combine_precedence() {
        assert_eq!(Continue.combine(Continue), Continue);
        assert_eq!(Continue.combine(ReplayOneInstruction), ReplayOneInstruction);
        assert_eq!(ReplayOneInstruction.combine(FlushAndInterpret), FlushAndInterpret);
        assert_eq!(FlushAndInterpret.combine(Continue), FlushAndInterpret);
    }

    #[test]
    fn arbitrate_no_hit() {
        assert_eq!(arbitrate(0, false, ReplayOneInstruction), Continue);
    }

    #[test]
    fn arbitrate_new_append_forces_flush() {
        assert_eq!(arbitrate(0, true, Continue), FlushAndInterpret);
        assert_eq!(arbitrate(1, true, ReplayOneInstruction), FlushAndInterpret);
    }

    #[test]
    fn arbitrate_hit_uses_request() {
        assert_eq!(arbitrate(0b100, false, ReplayOneInstruction), ReplayOneInstruction);
        assert_eq!(arbitrate(0b100, false, Continue), Continue);
    }

    #[test]
    fn from_script_int() {
        assert_eq!(ExecutionDirective::from_i32(1), Some(FlushAndInterpret));
        assert_eq!(ExecutionDirective::from_u8(2), Some(ReplayOneInstruction));
        assert_eq!(ExecutionDirective::from_i64(-1), None);
        assert_eq!(ExecutionDirective::from_u32(3), None);
    }
}
