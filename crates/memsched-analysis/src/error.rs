//! Error types for memsched analyses.

use memsched_ir::IrError;

use crate::size::SizeError;

/// Structural defects that make a module impossible to schedule.
///
/// These are never recoverable for the affected module: no partial or
/// best-effort result is produced.
#[derive(Debug, thiserror::Error)]
pub enum MalformedGraph {
    #[error("module '{module}' has no entry computation")]
    MissingEntry { module: String },

    #[error("call graph cycle through computation '{computation}'")]
    CyclicCallGraph { computation: String },

    #[error("computation '{computation}' has no root instruction")]
    MissingRoot { computation: String },

    #[error("root '{root}' of computation '{computation}' has users")]
    RootHasUsers { computation: String, root: String },

    #[error("instruction '{instruction}' in '{computation}' uses '{operand}', which is not defined earlier in that computation")]
    ForeignOperand {
        computation: String,
        instruction: String,
        operand: String,
    },

    #[error("no sequence for computation '{computation}'")]
    MissingSequence { computation: String },

    #[error("sequence for computation '{computation}' is invalid: {reason}")]
    InvalidSequence { computation: String, reason: String },

    #[error("'{instruction}' in '{computation}' has {actual} operands, expected {expected}")]
    BadOperandCount {
        computation: String,
        instruction: String,
        expected: usize,
        actual: usize,
    },
}

/// Errors produced by memsched analyses.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("malformed graph: {0}")]
    MalformedGraph(#[from] MalformedGraph),

    /// The caller-supplied size function failed.
    #[error(transparent)]
    Size(#[from] SizeError),

    #[error(transparent)]
    Ir(#[from] IrError),
}

impl AnalysisError {
    /// Returns `true` for structural defects of the input module.
    pub fn is_malformed_graph(&self) -> bool {
        matches!(self, Self::MalformedGraph(_) | Self::Ir(_))
    }
}
