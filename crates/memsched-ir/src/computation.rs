//! Computations: named instruction graphs with a designated root.

use crate::arena::Handle;
use crate::instruction::Instruction;

/// A named subgraph of instructions, analogous to a function body.
///
/// Instructions are listed in construction order. Since an operand must
/// exist before its user is added, construction order is always a valid
/// topological order of the computation.
#[derive(Clone, Debug)]
pub struct Computation {
    pub(crate) name: String,
    pub(crate) instructions: Vec<Handle<Instruction>>,
    pub(crate) parameters: Vec<Handle<Instruction>>,
    pub(crate) root: Option<Handle<Instruction>>,
}

impl Computation {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            instructions: Vec::new(),
            parameters: Vec::new(),
            root: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instructions in construction order.
    pub fn instructions(&self) -> &[Handle<Instruction>] {
        &self.instructions
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Parameter instructions in the order they were added.
    pub fn parameters(&self) -> &[Handle<Instruction>] {
        &self.parameters
    }

    /// The instruction whose value the computation produces. `None` only for
    /// a computation without instructions.
    pub fn root(&self) -> Option<Handle<Instruction>> {
        self.root
    }
}
