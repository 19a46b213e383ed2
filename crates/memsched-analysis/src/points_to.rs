//! Points-to analysis: which logical buffers each output of an instruction
//! may refer to.
//!
//! Tuples and get-tuple-element forward buffers rather than defining new
//! ones, so one buffer can be reachable through several instructions. Every
//! other opcode, call-like instructions included, defines a fresh buffer at
//! every index of its output shape.

use std::collections::HashMap;
use std::fmt;

use memsched_ir::{
    Arena, Computation, Handle, Instruction, InstructionKind, Module, Shape, ShapeIndex,
};

use crate::error::{AnalysisError, MalformedGraph};

/// A unit of storage produced by an instruction at a shape index.
#[derive(Clone, Debug)]
pub struct LogicalBuffer {
    instruction: Handle<Instruction>,
    computation: Handle<Computation>,
    index: ShapeIndex,
    shape: Shape,
    label: String,
}

impl LogicalBuffer {
    /// The defining instruction.
    pub fn instruction(&self) -> Handle<Instruction> {
        self.instruction
    }

    pub fn computation(&self) -> Handle<Computation> {
        self.computation
    }

    /// Where in the defining instruction's output this buffer lives.
    pub fn index(&self) -> &ShapeIndex {
        &self.index
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_tuple(&self) -> bool {
        self.shape.is_tuple()
    }
}

impl fmt::Display for LogicalBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.label, self.index)
    }
}

/// An (instruction, index) pair through which a buffer can be observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferAlias {
    pub instruction: Handle<Instruction>,
    pub index: ShapeIndex,
}

/// The buffers an instruction may refer to, per shape index in preorder.
#[derive(Clone, Debug, Default)]
pub struct PointsToSet {
    elements: Vec<(ShapeIndex, Vec<Handle<LogicalBuffer>>)>,
}

impl PointsToSet {
    /// Buffers at one index, or `None` if the index is not in the shape.
    pub fn element(&self, index: &ShapeIndex) -> Option<&[Handle<LogicalBuffer>]> {
        self.elements
            .iter()
            .find(|(i, _)| i == index)
            .map(|(_, buffers)| buffers.as_slice())
    }

    /// `(index, buffers)` pairs in preorder of the shape.
    pub fn iter(&self) -> impl Iterator<Item = (&ShapeIndex, &[Handle<LogicalBuffer>])> {
        self.elements
            .iter()
            .map(|(index, buffers)| (index, buffers.as_slice()))
    }

    /// Every buffer at every index, sorted by handle and deduplicated.
    pub fn flattened(&self) -> Vec<Handle<LogicalBuffer>> {
        let mut all: Vec<_> = self
            .elements
            .iter()
            .flat_map(|(_, buffers)| buffers.iter().copied())
            .collect();
        all.sort();
        all.dedup();
        all
    }

    fn push(&mut self, index: ShapeIndex, buffers: Vec<Handle<LogicalBuffer>>) {
        self.elements.push((index, buffers));
    }
}

/// Points-to sets for every instruction of a module.
#[derive(Debug)]
pub struct PointsToAnalysis {
    buffers: Arena<LogicalBuffer>,
    points_to: HashMap<Handle<Instruction>, PointsToSet>,
    defined: HashMap<Handle<Instruction>, Vec<Handle<LogicalBuffer>>>,
    aliases: Vec<Vec<BufferAlias>>,
}

impl PointsToAnalysis {
    /// Runs the analysis over every computation of `module`.
    ///
    /// Instructions are visited in construction order, which the IR keeps
    /// topological; an operand that has not been seen yet in its user's
    /// computation is reported as malformed.
    pub fn run(module: &Module) -> Result<Self, AnalysisError> {
        let mut analysis = Self {
            buffers: Arena::new(),
            points_to: HashMap::new(),
            defined: HashMap::new(),
            aliases: Vec::new(),
        };

        for (computation, comp) in module.computations() {
            for &handle in comp.instructions() {
                let instruction = module.try_instruction(handle)?;
                for &operand in instruction.operands() {
                    if !analysis.points_to.contains_key(&operand)
                        || module[operand].parent() != computation
                    {
                        return Err(MalformedGraph::ForeignOperand {
                            computation: comp.name().to_string(),
                            instruction: instruction.name().to_string(),
                            operand: module[operand].name().to_string(),
                        }
                        .into());
                    }
                }
                let set = analysis.compute_set(handle, instruction, computation, comp)?;
                analysis.points_to.insert(handle, set);
            }
        }

        analysis.aliases = vec![Vec::new(); analysis.buffers.len()];
        for (_, comp) in module.computations() {
            for &handle in comp.instructions() {
                for (index, buffers) in analysis.points_to[&handle].iter() {
                    for buffer in buffers {
                        analysis.aliases[buffer.index()].push(BufferAlias {
                            instruction: handle,
                            index: index.clone(),
                        });
                    }
                }
            }
        }

        log::debug!(
            "points-to: {} buffers over {} instructions in module '{}'",
            analysis.buffers.len(),
            analysis.points_to.len(),
            module.name(),
        );
        Ok(analysis)
    }

    fn compute_set(
        &mut self,
        handle: Handle<Instruction>,
        instruction: &Instruction,
        computation: Handle<Computation>,
        comp: &Computation,
    ) -> Result<PointsToSet, MalformedGraph> {
        let mut set = PointsToSet::default();
        match instruction.kind() {
            InstructionKind::Tuple => {
                let shell = self.define(handle, instruction, computation, ShapeIndex::root());
                set.push(ShapeIndex::root(), vec![shell]);
                for (i, operand) in instruction.operands().iter().enumerate() {
                    for (index, buffers) in self.points_to[operand].iter() {
                        set.push(index.prefixed(i), buffers.to_vec());
                    }
                }
            }
            InstructionKind::GetTupleElement { index: element } => {
                let [operand] = instruction.operands() else {
                    return Err(MalformedGraph::BadOperandCount {
                        computation: comp.name().to_string(),
                        instruction: instruction.name().to_string(),
                        expected: 1,
                        actual: instruction.operands().len(),
                    });
                };
                for (index, buffers) in self.points_to[operand].iter() {
                    if let Some((first, rest)) = index.split_first()
                        && first == *element
                    {
                        set.push(rest, buffers.to_vec());
                    }
                }
            }
            _ => {
                for index in instruction.shape().indices() {
                    let buffer = self.define(handle, instruction, computation, index.clone());
                    set.push(index, vec![buffer]);
                }
            }
        }
        Ok(set)
    }

    fn define(
        &mut self,
        handle: Handle<Instruction>,
        instruction: &Instruction,
        computation: Handle<Computation>,
        index: ShapeIndex,
    ) -> Handle<LogicalBuffer> {
        let shape = instruction
            .shape()
            .subshape(&index)
            .cloned()
            .unwrap_or_else(|| instruction.shape().clone());
        let buffer = self.buffers.append(LogicalBuffer {
            instruction: handle,
            computation,
            index,
            shape,
            label: instruction.name().to_string(),
        });
        self.defined.entry(handle).or_default().push(buffer);
        buffer
    }

    /// The points-to set of `instruction`.
    ///
    /// # Panics
    ///
    /// Panics if `instruction` was not part of the analyzed module.
    pub fn points_to(&self, instruction: Handle<Instruction>) -> &PointsToSet {
        &self.points_to[&instruction]
    }

    /// Buffers whose defining instruction is `instruction`, in preorder of
    /// its shape. Empty for tuples' elements and get-tuple-element.
    pub fn buffers_defined_by(&self, instruction: Handle<Instruction>) -> &[Handle<LogicalBuffer>] {
        self.defined
            .get(&instruction)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every buffer `instruction` reads through its operands, sorted by
    /// handle and deduplicated.
    pub fn buffers_used_by(
        &self,
        module: &Module,
        instruction: Handle<Instruction>,
    ) -> Vec<Handle<LogicalBuffer>> {
        let mut used: Vec<_> = module[instruction]
            .unique_operands()
            .into_iter()
            .flat_map(|operand| self.points_to(operand).flattened())
            .collect();
        used.sort();
        used.dedup();
        used
    }

    /// Every (instruction, index) at which `buffer` appears, including its
    /// definition.
    pub fn buffer_aliases(&self, buffer: Handle<LogicalBuffer>) -> &[BufferAlias] {
        &self.aliases[buffer.index()]
    }

    pub fn buffer(&self, buffer: Handle<LogicalBuffer>) -> &LogicalBuffer {
        &self.buffers[buffer]
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn buffers(&self) -> impl Iterator<Item = (Handle<LogicalBuffer>, &LogicalBuffer)> {
        self.buffers.iter()
    }
}
