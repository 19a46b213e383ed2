//! Error types for the memsched IR.

/// Errors that can occur when constructing IR.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    /// Two instructions of one computation share a name.
    #[error("duplicate instruction name '{name}' in computation '{computation}'")]
    DuplicateName { computation: String, name: String },

    /// An operand was defined in a different computation.
    #[error("instruction '{instruction}' in '{computation}' uses operand '{operand}' from another computation")]
    ForeignOperand {
        computation: String,
        instruction: String,
        operand: String,
    },

    /// An instruction was given the wrong number of operands for its kind.
    #[error("'{instruction}' ({opcode}) takes {expected} operands, got {actual}")]
    OperandCount {
        instruction: String,
        opcode: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A tuple-only operation was applied to a non-tuple operand.
    #[error("operand '{operand}' of '{instruction}' is not a tuple (shape {shape})")]
    NotATuple {
        instruction: String,
        operand: String,
        shape: String,
    },

    /// A get-tuple-element index is past the end of the tuple.
    #[error("tuple index {index} out of range for '{operand}' with {len} elements")]
    TupleIndexOutOfRange {
        operand: String,
        index: usize,
        len: usize,
    },
}
