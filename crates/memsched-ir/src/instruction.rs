//! Instructions and their opcodes.

use std::fmt;

use crate::arena::Handle;
use crate::computation::Computation;
use crate::shape::Shape;

/// Elementwise unary operations.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Abs,
    Exp,
    Log,
    Negate,
    Sqrt,
    Tanh,
}

/// Elementwise binary operations.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Maximum,
    Minimum,
}

/// Direction of an elementwise comparison.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ComparisonDirection {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// What an instruction does, together with the opcode-specific payload.
///
/// Call-like variants carry handles of the computations they invoke.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionKind {
    /// Formal parameter `number` of the enclosing computation.
    Parameter { number: usize },
    /// A literal baked into the program.
    Constant,
    Unary(UnaryOp),
    Binary(BinaryOp),
    Compare(ComparisonDirection),
    /// Materializes a fresh copy of its operand.
    Copy,
    Broadcast { dimensions: Vec<usize> },
    Transpose { dimensions: Vec<usize> },
    Reshape,
    /// Groups its operands into a tuple without copying them.
    Tuple,
    /// Exposes element `index` of a tuple operand without copying it.
    GetTupleElement { index: usize },
    /// Invokes `to_apply` once with the operands as parameters.
    Call { to_apply: Handle<Computation> },
    /// Runs `body` while `condition` holds; the single operand is the initial
    /// loop state.
    While {
        condition: Handle<Computation>,
        body: Handle<Computation>,
    },
    /// Operand 0 selects which branch runs; operand `i + 1` feeds branch `i`.
    Conditional { branches: Vec<Handle<Computation>> },
    /// Applies `to_apply` elementwise over the operands.
    Map { to_apply: Handle<Computation> },
    /// Reduces operand 0 along `dimensions` with `to_apply`, operand 1 being
    /// the initial value.
    Reduce {
        to_apply: Handle<Computation>,
        dimensions: Vec<usize>,
    },
}

impl InstructionKind {
    /// Computations invoked by this instruction, in operand order.
    pub fn called_computations(&self) -> Vec<Handle<Computation>> {
        match self {
            Self::Call { to_apply } | Self::Map { to_apply } | Self::Reduce { to_apply, .. } => {
                vec![*to_apply]
            }
            Self::While { condition, body } => vec![*condition, *body],
            Self::Conditional { branches } => branches.clone(),
            Self::Parameter { .. }
            | Self::Constant
            | Self::Unary(_)
            | Self::Binary(_)
            | Self::Compare(_)
            | Self::Copy
            | Self::Broadcast { .. }
            | Self::Transpose { .. }
            | Self::Reshape
            | Self::Tuple
            | Self::GetTupleElement { .. } => Vec::new(),
        }
    }

    /// Number of operands this kind takes, or `None` when it is variadic.
    pub fn operand_count(&self) -> Option<usize> {
        match self {
            Self::Parameter { .. } | Self::Constant => Some(0),
            Self::Unary(_)
            | Self::Copy
            | Self::Broadcast { .. }
            | Self::Transpose { .. }
            | Self::Reshape
            | Self::GetTupleElement { .. }
            | Self::While { .. } => Some(1),
            Self::Binary(_) | Self::Compare(_) | Self::Reduce { .. } => Some(2),
            Self::Conditional { branches } => Some(branches.len() + 1),
            Self::Tuple | Self::Call { .. } | Self::Map { .. } => None,
        }
    }

    /// Returns `true` for instructions that invoke other computations.
    pub fn is_call_like(&self) -> bool {
        matches!(
            self,
            Self::Call { .. }
                | Self::While { .. }
                | Self::Conditional { .. }
                | Self::Map { .. }
                | Self::Reduce { .. }
        )
    }

    /// Returns `true` when output element `i` depends only on element `i` of
    /// each operand.
    pub fn is_elementwise(&self) -> bool {
        matches!(
            self,
            Self::Unary(_) | Self::Binary(_) | Self::Compare(_) | Self::Copy | Self::Map { .. }
        )
    }

    /// Short opcode mnemonic used in dumps.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Self::Parameter { .. } => "parameter",
            Self::Constant => "constant",
            Self::Unary(op) => match op {
                UnaryOp::Abs => "abs",
                UnaryOp::Exp => "exponential",
                UnaryOp::Log => "log",
                UnaryOp::Negate => "negate",
                UnaryOp::Sqrt => "sqrt",
                UnaryOp::Tanh => "tanh",
            },
            Self::Binary(op) => match op {
                BinaryOp::Add => "add",
                BinaryOp::Subtract => "subtract",
                BinaryOp::Multiply => "multiply",
                BinaryOp::Divide => "divide",
                BinaryOp::Maximum => "maximum",
                BinaryOp::Minimum => "minimum",
            },
            Self::Compare(_) => "compare",
            Self::Copy => "copy",
            Self::Broadcast { .. } => "broadcast",
            Self::Transpose { .. } => "transpose",
            Self::Reshape => "reshape",
            Self::Tuple => "tuple",
            Self::GetTupleElement { .. } => "get-tuple-element",
            Self::Call { .. } => "call",
            Self::While { .. } => "while",
            Self::Conditional { .. } => "conditional",
            Self::Map { .. } => "map",
            Self::Reduce { .. } => "reduce",
        }
    }
}

impl fmt::Display for ComparisonDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Eq => "EQ",
            Self::Ne => "NE",
            Self::Lt => "LT",
            Self::Le => "LE",
            Self::Gt => "GT",
            Self::Ge => "GE",
        })
    }
}

/// A single operation node of a computation.
#[derive(Clone, Debug)]
pub struct Instruction {
    pub(crate) name: String,
    pub(crate) kind: InstructionKind,
    pub(crate) operands: Vec<Handle<Instruction>>,
    pub(crate) shape: Shape,
    pub(crate) parent: Handle<Computation>,
    /// Distinct users in the order they were added.
    pub(crate) users: Vec<Handle<Instruction>>,
}

impl Instruction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    /// Operands in positional order; an instruction may appear more than once.
    pub fn operands(&self) -> &[Handle<Instruction>] {
        &self.operands
    }

    /// Operands with duplicates removed, keeping the first occurrence.
    pub fn unique_operands(&self) -> Vec<Handle<Instruction>> {
        let mut unique = Vec::with_capacity(self.operands.len());
        for &operand in &self.operands {
            if !unique.contains(&operand) {
                unique.push(operand);
            }
        }
        unique
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The computation this instruction belongs to.
    pub fn parent(&self) -> Handle<Computation> {
        self.parent
    }

    /// Distinct instructions that use this one as an operand.
    pub fn users(&self) -> &[Handle<Instruction>] {
        &self.users
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn is_user_of(&self, operand: Handle<Instruction>) -> bool {
        self.operands.contains(&operand)
    }

    /// Positions at which `operand` appears in the operand list.
    pub fn operand_indices(&self, operand: Handle<Instruction>) -> Vec<usize> {
        self.operands
            .iter()
            .enumerate()
            .filter(|(_, o)| **o == operand)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn called_computations(&self) -> Vec<Handle<Computation>> {
        self.kind.called_computations()
    }
}
