//! Happens-before queries over a scheduled module.

use std::collections::HashMap;
use std::fmt;

use memsched_analysis::{CallGraph, validate_sequence};
use memsched_ir::{Handle, Instruction, InstructionKind, Module};

use crate::{ModuleSequence, ScheduleError};

/// Execution order of a module whose computations each run sequentially.
#[derive(Debug)]
pub struct SequentialOrdering<'m> {
    module: &'m Module,
    call_graph: CallGraph,
    sequence: ModuleSequence,
    positions: HashMap<Handle<Instruction>, usize>,
}

impl<'m> SequentialOrdering<'m> {
    /// Wraps `sequence` after checking each of its orders against `module`.
    pub fn new(module: &'m Module, sequence: ModuleSequence) -> Result<Self, ScheduleError> {
        let call_graph = CallGraph::build(module)?;
        let mut positions = HashMap::new();
        for (computation, order) in sequence.iter() {
            validate_sequence(module, computation, order)?;
            positions.extend(order.iter().enumerate().map(|(i, &h)| (h, i)));
        }
        Ok(Self {
            module,
            call_graph,
            sequence,
            positions,
        })
    }

    /// Position of `instruction` within its computation's order.
    pub fn position(&self, instruction: Handle<Instruction>) -> Option<usize> {
        self.positions.get(&instruction).copied()
    }

    pub fn sequence(&self) -> &ModuleSequence {
        &self.sequence
    }

    pub fn call_graph(&self) -> &CallGraph {
        &self.call_graph
    }

    /// Returns `true` if `a` is known to finish before `b` starts.
    ///
    /// Instructions in different computations are compared through the call
    /// sites that lead to them. When either side is reached through a
    /// computation with several call sites, or the two meet in different
    /// branches of a conditional, no order is known and the answer is
    /// `false`.
    pub fn executes_before(&self, a: Handle<Instruction>, b: Handle<Instruction>) -> bool {
        if a == b {
            return false;
        }
        let Some((a_ancestor, b_ancestor)) = self
            .call_graph
            .nearest_ancestors_in_same_computation(self.module, a, b)
        else {
            return false;
        };

        if a_ancestor == b_ancestor {
            // The condition of a while runs before each trip through the body.
            if let InstructionKind::While { condition, body } = self.module[a_ancestor].kind()
                && self
                    .call_graph
                    .instruction_is_nested_in(self.module, a, *condition)
                && self.call_graph.instruction_is_nested_in(self.module, b, *body)
            {
                return true;
            }
            return false;
        }

        match (self.position(a_ancestor), self.position(b_ancestor)) {
            (Some(x), Some(y)) => x < y,
            _ => false,
        }
    }
}

impl fmt::Display for SequentialOrdering<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sequential ordering of module '{}':", self.module.name())?;
        write!(f, "{}", self.sequence.display(self.module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsched_ir::{ComparisonDirection, PrimitiveType, Shape, UnaryOp};

    #[test]
    fn same_computation_compares_positions() {
        let scalar = Shape::scalar(PrimitiveType::F32);
        let mut module = Module::new("m");
        let entry = module.add_computation("entry");
        let mut b = module.builder(entry);
        let p = b.parameter(0, scalar.clone(), "p").unwrap();
        let e = b.unary(UnaryOp::Exp, p, "e").unwrap();
        module.set_entry(entry).unwrap();

        let ordering =
            SequentialOrdering::new(&module, ModuleSequence::construction_order(&module)).unwrap();
        assert!(ordering.executes_before(p, e));
        assert!(!ordering.executes_before(e, p));
        assert!(!ordering.executes_before(p, p));
        assert_eq!(ordering.position(e), Some(1));
    }

    #[test]
    fn condition_before_body() {
        let scalar = Shape::scalar(PrimitiveType::F32);
        let mut module = Module::new("m");
        let cond = module.add_computation("cond");
        let lt = {
            let mut b = module.builder(cond);
            let p = b.parameter(0, scalar.clone(), "p").unwrap();
            b.compare(ComparisonDirection::Lt, p, p, "lt").unwrap()
        };
        let body = module.add_computation("body");
        let neg = {
            let mut b = module.builder(body);
            let p = b.parameter(0, scalar.clone(), "p").unwrap();
            b.unary(UnaryOp::Negate, p, "neg").unwrap()
        };
        let entry = module.add_computation("entry");
        let (x, lp) = {
            let mut b = module.builder(entry);
            let x = b.parameter(0, scalar.clone(), "x").unwrap();
            let lp = b.while_loop(scalar.clone(), cond, body, x, "loop").unwrap();
            (x, lp)
        };
        module.set_entry(entry).unwrap();

        let ordering =
            SequentialOrdering::new(&module, ModuleSequence::construction_order(&module)).unwrap();
        assert!(ordering.executes_before(lt, neg));
        assert!(!ordering.executes_before(neg, lt));
        // The loop's operand runs before anything nested in the loop.
        assert!(ordering.executes_before(x, neg));
        assert!(!ordering.executes_before(lp, lt));
    }

    #[test]
    fn conditional_branches_are_unordered() {
        let vector = Shape::array(PrimitiveType::F32, &[4]);
        let mut module = Module::new("m");
        let on_true = module.add_computation("on_true");
        let t = {
            let mut b = module.builder(on_true);
            let p = b.parameter(0, vector.clone(), "p").unwrap();
            b.unary(UnaryOp::Negate, p, "t").unwrap()
        };
        let on_false = module.add_computation("on_false");
        let f = {
            let mut b = module.builder(on_false);
            let p = b.parameter(0, vector.clone(), "p").unwrap();
            b.unary(UnaryOp::Exp, p, "f").unwrap()
        };
        let entry = module.add_computation("entry");
        {
            let mut b = module.builder(entry);
            let pred = b
                .parameter(0, Shape::scalar(PrimitiveType::Pred), "pred")
                .unwrap();
            let x = b.parameter(1, vector.clone(), "x").unwrap();
            b.conditional(vector.clone(), pred, vec![(on_true, x), (on_false, x)], "c")
                .unwrap();
        }
        module.set_entry(entry).unwrap();

        let ordering =
            SequentialOrdering::new(&module, ModuleSequence::construction_order(&module)).unwrap();
        assert!(!ordering.executes_before(t, f));
        assert!(!ordering.executes_before(f, t));
    }

    #[test]
    fn rejects_invalid_order() {
        let scalar = Shape::scalar(PrimitiveType::F32);
        let mut module = Module::new("m");
        let entry = module.add_computation("entry");
        let mut b = module.builder(entry);
        let p = b.parameter(0, scalar, "p").unwrap();
        let e = b.unary(UnaryOp::Exp, p, "e").unwrap();
        module.set_entry(entry).unwrap();

        let mut sequence = ModuleSequence::new();
        sequence.insert(entry, vec![e, p]);
        let err = SequentialOrdering::new(&module, sequence).unwrap_err();
        assert!(err.is_malformed_graph());
    }
}
