//! Incremental construction of computations.

use crate::Module;
use crate::arena::Handle;
use crate::computation::Computation;
use crate::error::IrError;
use crate::instruction::{
    BinaryOp, ComparisonDirection, Instruction, InstructionKind, UnaryOp,
};
use crate::shape::{PrimitiveType, Shape, ShapeIndex};

/// Appends instructions to one computation of a [`Module`].
///
/// Each added instruction becomes the computation's root until another one is
/// added or [`set_root`](Self::set_root) picks a different one.
pub struct ComputationBuilder<'m> {
    module: &'m mut Module,
    computation: Handle<Computation>,
}

impl<'m> ComputationBuilder<'m> {
    pub(crate) fn new(module: &'m mut Module, computation: Handle<Computation>) -> Self {
        Self {
            module,
            computation,
        }
    }

    /// The computation being built.
    pub fn computation(&self) -> Handle<Computation> {
        self.computation
    }

    /// Adds an instruction with an explicit kind, operand list and shape.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken, the operand count does not fit `kind`, an
    /// operand belongs to another computation, or a handle does not resolve.
    pub fn add(
        &mut self,
        name: impl Into<String>,
        kind: InstructionKind,
        operands: Vec<Handle<Instruction>>,
        shape: Shape,
    ) -> Result<Handle<Instruction>, IrError> {
        let name = name.into();
        let computation_name = self.module.computations[self.computation].name.clone();

        if self.module.find_instruction(self.computation, &name).is_some() {
            return Err(IrError::DuplicateName {
                computation: computation_name,
                name,
            });
        }
        if let Some(expected) = kind.operand_count()
            && expected != operands.len()
        {
            return Err(IrError::OperandCount {
                instruction: name,
                opcode: kind.mnemonic(),
                expected,
                actual: operands.len(),
            });
        }
        for &operand in &operands {
            let op = self.module.try_instruction(operand)?;
            if op.parent != self.computation {
                return Err(IrError::ForeignOperand {
                    computation: computation_name,
                    instruction: name,
                    operand: op.name.clone(),
                });
            }
        }
        for callee in kind.called_computations() {
            if !self.module.computations.contains(callee) {
                return Err(IrError::BadHandle {
                    index: callee.index(),
                    size: self.module.computations.len(),
                });
            }
        }

        let is_parameter = matches!(kind, InstructionKind::Parameter { .. });
        let handle = self.module.instructions.append(Instruction {
            name,
            kind,
            operands: operands.clone(),
            shape,
            parent: self.computation,
            users: Vec::new(),
        });
        for operand in operands {
            if let Some(op) = self.module.instructions.get_mut(operand)
                && !op.users.contains(&handle)
            {
                op.users.push(handle);
            }
        }
        if let Some(computation) = self.module.computations.get_mut(self.computation) {
            computation.instructions.push(handle);
            if is_parameter {
                computation.parameters.push(handle);
            }
            computation.root = Some(handle);
        }
        Ok(handle)
    }

    /// Makes `root` the value produced by this computation.
    pub fn set_root(&mut self, root: Handle<Instruction>) -> Result<(), IrError> {
        let instruction = self.module.try_instruction(root)?;
        if instruction.parent != self.computation {
            return Err(IrError::ForeignOperand {
                computation: self.module.computations[self.computation].name.clone(),
                instruction: "<root>".into(),
                operand: instruction.name.clone(),
            });
        }
        if let Some(computation) = self.module.computations.get_mut(self.computation) {
            computation.root = Some(root);
        }
        Ok(())
    }

    pub fn parameter(
        &mut self,
        number: usize,
        shape: Shape,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(name, InstructionKind::Parameter { number }, Vec::new(), shape)
    }

    pub fn constant(
        &mut self,
        shape: Shape,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(name, InstructionKind::Constant, Vec::new(), shape)
    }

    /// Elementwise unary op; the result has the operand's shape.
    pub fn unary(
        &mut self,
        op: UnaryOp,
        operand: Handle<Instruction>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        let shape = self.shape_of(operand)?;
        self.add(name, InstructionKind::Unary(op), vec![operand], shape)
    }

    /// Elementwise binary op; the result has the left operand's shape.
    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: Handle<Instruction>,
        rhs: Handle<Instruction>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        let shape = self.shape_of(lhs)?;
        self.add(name, InstructionKind::Binary(op), vec![lhs, rhs], shape)
    }

    /// Comparison producing a scalar predicate.
    pub fn compare(
        &mut self,
        direction: ComparisonDirection,
        lhs: Handle<Instruction>,
        rhs: Handle<Instruction>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(
            name,
            InstructionKind::Compare(direction),
            vec![lhs, rhs],
            Shape::scalar(PrimitiveType::Pred),
        )
    }

    pub fn copy(
        &mut self,
        operand: Handle<Instruction>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        let shape = self.shape_of(operand)?;
        self.add(name, InstructionKind::Copy, vec![operand], shape)
    }

    pub fn broadcast(
        &mut self,
        shape: Shape,
        operand: Handle<Instruction>,
        dimensions: Vec<usize>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(
            name,
            InstructionKind::Broadcast { dimensions },
            vec![operand],
            shape,
        )
    }

    pub fn transpose(
        &mut self,
        shape: Shape,
        operand: Handle<Instruction>,
        dimensions: Vec<usize>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(
            name,
            InstructionKind::Transpose { dimensions },
            vec![operand],
            shape,
        )
    }

    pub fn reshape(
        &mut self,
        shape: Shape,
        operand: Handle<Instruction>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(name, InstructionKind::Reshape, vec![operand], shape)
    }

    /// Tuple of the operands; the shape is the tuple of operand shapes.
    pub fn tuple(
        &mut self,
        operands: Vec<Handle<Instruction>>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        let elements = operands
            .iter()
            .map(|&o| self.shape_of(o))
            .collect::<Result<Vec<_>, _>>()?;
        self.add(name, InstructionKind::Tuple, operands, Shape::tuple(elements))
    }

    /// Element `index` of a tuple-shaped operand.
    pub fn get_tuple_element(
        &mut self,
        operand: Handle<Instruction>,
        index: usize,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        let name = name.into();
        let op = self.module.try_instruction(operand)?;
        if !op.shape.is_tuple() {
            return Err(IrError::NotATuple {
                instruction: name,
                operand: op.name.clone(),
                shape: op.shape.to_string(),
            });
        }
        let shape = op
            .shape
            .subshape(&ShapeIndex::from(vec![index]))
            .cloned()
            .ok_or_else(|| IrError::TupleIndexOutOfRange {
                operand: op.name.clone(),
                index,
                len: op.shape.tuple_len(),
            })?;
        self.add(
            name,
            InstructionKind::GetTupleElement { index },
            vec![operand],
            shape,
        )
    }

    pub fn call(
        &mut self,
        shape: Shape,
        to_apply: Handle<Computation>,
        operands: Vec<Handle<Instruction>>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(name, InstructionKind::Call { to_apply }, operands, shape)
    }

    pub fn while_loop(
        &mut self,
        shape: Shape,
        condition: Handle<Computation>,
        body: Handle<Computation>,
        init: Handle<Instruction>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(
            name,
            InstructionKind::While { condition, body },
            vec![init],
            shape,
        )
    }

    /// Branch `i` receives `branches[i].1` as its parameter.
    pub fn conditional(
        &mut self,
        shape: Shape,
        predicate: Handle<Instruction>,
        branches: Vec<(Handle<Computation>, Handle<Instruction>)>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        let mut operands = vec![predicate];
        operands.extend(branches.iter().map(|(_, operand)| *operand));
        let branches = branches.into_iter().map(|(c, _)| c).collect();
        self.add(
            name,
            InstructionKind::Conditional { branches },
            operands,
            shape,
        )
    }

    pub fn map(
        &mut self,
        shape: Shape,
        to_apply: Handle<Computation>,
        operands: Vec<Handle<Instruction>>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(name, InstructionKind::Map { to_apply }, operands, shape)
    }

    pub fn reduce(
        &mut self,
        shape: Shape,
        operand: Handle<Instruction>,
        init: Handle<Instruction>,
        dimensions: Vec<usize>,
        to_apply: Handle<Computation>,
        name: impl Into<String>,
    ) -> Result<Handle<Instruction>, IrError> {
        self.add(
            name,
            InstructionKind::Reduce {
                to_apply,
                dimensions,
            },
            vec![operand, init],
            shape,
        )
    }

    fn shape_of(&self, operand: Handle<Instruction>) -> Result<Shape, IrError> {
        Ok(self.module.try_instruction(operand)?.shape.clone())
    }
}
