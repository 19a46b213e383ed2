//! memsched intermediate representation.
//!
//! An arena-based dataflow IR: a [`Module`] owns every [`Computation`] and
//! every [`Instruction`], and all cross references (operands, users, called
//! computations, parents) are typed [`Handle`]s into those arenas.

pub mod arena;
mod builder;
mod computation;
mod display;
mod error;
mod instruction;
mod shape;

use std::ops::Index;

pub use arena::{Arena, Handle};
pub use builder::ComputationBuilder;
pub use computation::Computation;
pub use display::dump_module;
pub use error::IrError;
pub use instruction::{BinaryOp, ComparisonDirection, Instruction, InstructionKind, UnaryOp};
pub use shape::{PrimitiveType, Shape, ShapeIndex};

/// A program: an entry computation plus the computations it embeds.
#[derive(Clone, Debug, Default)]
pub struct Module {
    name: String,
    computations: Arena<Computation>,
    instructions: Arena<Instruction>,
    entry: Option<Handle<Computation>>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds an empty computation and returns its handle.
    pub fn add_computation(&mut self, name: impl Into<String>) -> Handle<Computation> {
        self.computations.append(Computation::new(name.into()))
    }

    /// Returns a builder appending instructions to `computation`.
    ///
    /// # Panics
    ///
    /// Panics if `computation` does not belong to this module.
    pub fn builder(&mut self, computation: Handle<Computation>) -> ComputationBuilder<'_> {
        assert!(
            self.computations.contains(computation),
            "builder: computation {computation:?} not in module '{}'",
            self.name,
        );
        ComputationBuilder::new(self, computation)
    }

    /// Designates the entry computation.
    pub fn set_entry(&mut self, computation: Handle<Computation>) -> Result<(), IrError> {
        if !self.computations.contains(computation) {
            return Err(IrError::BadHandle {
                index: computation.index(),
                size: self.computations.len(),
            });
        }
        self.entry = Some(computation);
        Ok(())
    }

    pub fn entry(&self) -> Option<Handle<Computation>> {
        self.entry
    }

    /// Computations in the order they were added.
    pub fn computations(&self) -> impl Iterator<Item = (Handle<Computation>, &Computation)> {
        self.computations.iter()
    }

    pub fn computation_count(&self) -> usize {
        self.computations.len()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Looks up a computation by name.
    pub fn find_computation(&self, name: &str) -> Option<Handle<Computation>> {
        self.computations
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(h, _)| h)
    }

    /// Looks up an instruction of `computation` by name.
    pub fn find_instruction(
        &self,
        computation: Handle<Computation>,
        name: &str,
    ) -> Option<Handle<Instruction>> {
        self.computations
            .try_get(computation)?
            .instructions
            .iter()
            .copied()
            .find(|&h| self.instructions[h].name == name)
    }

    pub fn try_computation(
        &self,
        handle: Handle<Computation>,
    ) -> Result<&Computation, IrError> {
        self.computations
            .try_get(handle)
            .ok_or(IrError::BadHandle {
                index: handle.index(),
                size: self.computations.len(),
            })
    }

    pub fn try_instruction(
        &self,
        handle: Handle<Instruction>,
    ) -> Result<&Instruction, IrError> {
        self.instructions
            .try_get(handle)
            .ok_or(IrError::BadHandle {
                index: handle.index(),
                size: self.instructions.len(),
            })
    }
}

impl Index<Handle<Computation>> for Module {
    type Output = Computation;

    fn index(&self, handle: Handle<Computation>) -> &Computation {
        &self.computations[handle]
    }
}

impl Index<Handle<Instruction>> for Module {
    type Output = Instruction;

    fn index(&self, handle: Handle<Instruction>) -> &Instruction {
        &self.instructions[handle]
    }
}
