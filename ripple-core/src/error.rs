//! Error types.
//!
//! Almost every failure in the engine is a contract violation by the caller
//! and is reported by panicking. The types here give those panics a stable
//! message and are returned directly by the fallible `try_*` entry points.

use thiserror::Error;

/// An edit could not be applied to a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditError {
    /// The edit names a position outside the sequence.
    #[error("edit index {index} is out of bounds for a sequence of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
}

/// A propagation pass could not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PropagationError {
    /// Some nodes were still waiting on each other when the pass ran out of
    /// ready work.
    #[error("dependency cycle: {remaining} node(s) never settled during the pass")]
    Cycle { remaining: usize },
}
