//! Depth-first post-order scheduling.
//!
//! Emits a post-order of the operand graph, descending first into the
//! operands whose subgraphs have the most extra users and then the most
//! bytes. Subgraphs that are used more than once are thus computed early
//! and stay live for their whole span, while single-use subgraphs are
//! computed right before they are consumed.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};

use memsched_analysis::MalformedGraph;
use memsched_ir::{Computation, Handle, Instruction, InstructionKind};

use crate::{MemoryScheduler, ScheduleError, SchedulingContext};

/// Post-order scheduler ordered by cumulative fan-out and size.
#[derive(Clone, Copy, Debug, Default)]
pub struct DfsScheduler;

#[derive(Clone, Copy, Default)]
struct SubgraphCost {
    extra_users: usize,
    total_bytes: u64,
}

impl MemoryScheduler for DfsScheduler {
    fn name(&self) -> &'static str {
        "dfs"
    }

    fn schedule(
        &self,
        cx: &SchedulingContext<'_>,
        computation: Handle<Computation>,
    ) -> Result<Vec<Handle<Instruction>>, ScheduleError> {
        let module = cx.module;
        let comp = module.try_computation(computation)?;
        let root = comp.root().ok_or_else(|| MalformedGraph::MissingRoot {
            computation: comp.name().to_string(),
        })?;

        // Construction order is topological, so operand costs are ready.
        let mut cost: HashMap<Handle<Instruction>, SubgraphCost> = HashMap::new();
        for &handle in comp.instructions() {
            let instruction = &module[handle];
            if matches!(
                instruction.kind(),
                InstructionKind::Parameter { .. } | InstructionKind::Constant
            ) {
                cost.insert(handle, SubgraphCost::default());
                continue;
            }
            let mut own = SubgraphCost {
                extra_users: instruction.user_count().saturating_sub(1),
                total_bytes: 0,
            };
            for &buffer in cx.points_to.buffers_defined_by(handle) {
                own.total_bytes += cx.size_fn.size_of(cx.points_to.buffer(buffer))?;
            }
            for operand in instruction.unique_operands() {
                let operand_cost = cost.get(&operand).copied().unwrap_or_default();
                own.extra_users += operand_cost.extra_users;
                own.total_bytes += operand_cost.total_bytes;
            }
            cost.insert(handle, own);
        }

        let ordered_operands = |handle: Handle<Instruction>| -> Vec<Handle<Instruction>> {
            let mut operands = module[handle].unique_operands();
            operands.sort_by_key(|o| {
                let c = cost.get(o).copied().unwrap_or_default();
                (
                    Reverse(c.extra_users),
                    Reverse(c.total_bytes),
                    module[*o].name(),
                )
            });
            operands
        };

        let mut starts: Vec<Handle<Instruction>> = comp
            .instructions()
            .iter()
            .copied()
            .filter(|&h| h != root && module[h].user_count() == 0)
            .collect();
        starts.push(root);

        let mut visited = HashSet::with_capacity(comp.instruction_count());
        let mut sequence = Vec::with_capacity(comp.instruction_count());
        for start in starts {
            post_order(start, &ordered_operands, &mut visited, &mut sequence);
        }

        if sequence.len() != comp.instruction_count() {
            return Err(ScheduleError::Incomplete {
                scheduler: self.name(),
                computation: comp.name().to_string(),
                scheduled: sequence.len(),
                total: comp.instruction_count(),
            });
        }
        Ok(sequence)
    }
}

fn post_order(
    start: Handle<Instruction>,
    ordered_operands: &impl Fn(Handle<Instruction>) -> Vec<Handle<Instruction>>,
    visited: &mut HashSet<Handle<Instruction>>,
    sequence: &mut Vec<Handle<Instruction>>,
) {
    if !visited.insert(start) {
        return;
    }
    let mut stack = vec![(start, ordered_operands(start), 0usize)];
    while let Some((current, operands, next)) = stack.last_mut() {
        if let Some(&operand) = operands.get(*next) {
            *next += 1;
            if visited.insert(operand) {
                let children = ordered_operands(operand);
                stack.push((operand, children, 0));
            }
        } else {
            sequence.push(*current);
            stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TieBreak;
    use memsched_analysis::{CalleePeaks, PointsToAnalysis, shape_size};
    use memsched_ir::{BinaryOp, Module, PrimitiveType, Shape, UnaryOp};

    fn schedule(module: &Module, computation: Handle<Computation>) -> Vec<Handle<Instruction>> {
        let points_to = PointsToAnalysis::run(module).unwrap();
        let size_fn = shape_size(8);
        let peaks = CalleePeaks::new();
        let cx = SchedulingContext {
            module,
            points_to: &points_to,
            size_fn: &size_fn,
            callee_peaks: &peaks,
            tie_break: TieBreak::ProgramOrder,
        };
        DfsScheduler.schedule(&cx, computation).unwrap()
    }

    #[test]
    fn shared_subgraph_first() {
        let vec = Shape::array(PrimitiveType::F32, &[42]);
        let mut module = Module::new("m");
        let entry = module.add_computation("entry");
        let mut b = module.builder(entry);
        let param = b.parameter(0, vec.clone(), "param").unwrap();
        let ab = b.unary(UnaryOp::Abs, param, "ab").unwrap();
        let exp = b.unary(UnaryOp::Exp, param, "exp").unwrap();
        let add = b.binary(BinaryOp::Add, ab, exp, "add").unwrap();
        let negate = b.unary(UnaryOp::Negate, exp, "negate").unwrap();
        let sub = b.binary(BinaryOp::Subtract, add, negate, "sub").unwrap();
        module.set_entry(entry).unwrap();

        // exp has two users, so it is visited before ab.
        assert_eq!(
            schedule(&module, entry),
            vec![param, exp, ab, add, negate, sub]
        );
    }

    #[test]
    fn names_break_ties() {
        let scalar = Shape::scalar(PrimitiveType::F32);
        let mut module = Module::new("m");
        let entry = module.add_computation("entry");
        let mut b = module.builder(entry);
        let p = b.parameter(0, scalar.clone(), "p").unwrap();
        let zeta = b.unary(UnaryOp::Exp, p, "zeta").unwrap();
        let alpha = b.unary(UnaryOp::Exp, p, "alpha").unwrap();
        let sum = b.binary(BinaryOp::Add, zeta, alpha, "sum").unwrap();
        module.set_entry(entry).unwrap();

        assert_eq!(schedule(&module, entry), vec![p, alpha, zeta, sum]);
    }

    #[test]
    fn unreachable_roots_come_first() {
        let scalar = Shape::scalar(PrimitiveType::F32);
        let mut module = Module::new("m");
        let entry = module.add_computation("entry");
        let mut b = module.builder(entry);
        let p = b.parameter(0, scalar.clone(), "p").unwrap();
        let root = b.unary(UnaryOp::Negate, p, "root").unwrap();
        let dead = b.unary(UnaryOp::Exp, p, "dead").unwrap();
        b.set_root(root).unwrap();
        module.set_entry(entry).unwrap();

        assert_eq!(schedule(&module, entry), vec![p, dead, root]);
    }
}
