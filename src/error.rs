/// Errors reported by the breakpoint engine.

use thiserror::Error;

use crate::breakpoint::BreakpointKind;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Every slot of the table is populated.
    #[error("{kind} breakpoint table is full")]
    CapacityExceeded { kind: BreakpointKind },
    /// Out of range, already empty, or the slot has been reused since the handle was issued.
    #[error("no {kind} breakpoint at slot {index}")]
    IndexInvalid { kind: BreakpointKind, index: usize },
    /// A breakpoint must cover at least one address.
    #[error("breakpoint length must be non-zero")]
    ZeroLength,
    #[error("no trace sink is open")]
    TraceSinkUnavailable,
    #[error("invalid trace: {0}")]
    InvalidTrace(&'static str),
    #[error("trace i/o: {0}")]
    Io(#[from] std::io::Error),
}
