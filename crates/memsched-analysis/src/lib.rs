//! Analyses the memsched schedulers are built on.
//!
//! - [`CallGraph`]: which computations call which, in postorder.
//! - [`PointsToAnalysis`]: the logical buffers each instruction may refer to.
//! - [`LivenessAnalysis`]: when each buffer is live under a given sequence,
//!   and the resulting peak footprint.

pub mod call_graph;
pub mod error;
pub mod liveness;
pub mod points_to;
pub mod size;

pub use call_graph::{CallContext, CallGraph, CallGraphNode, CallSite};
pub use error::{AnalysisError, MalformedGraph};
pub use liveness::{
    CalleePeaks, LiveInterval, LivenessAnalysis, LivenessContext, is_ignored, validate_sequence,
};
pub use points_to::{BufferAlias, LogicalBuffer, PointsToAnalysis, PointsToSet};
pub use size::{SizeError, SizeFunction, shape_size};

use memsched_ir::{Computation, Handle, Module};

/// Checks the structural preconditions every scheduler relies on: an entry
/// computation, a root in every computation that no instruction uses.
pub fn verify_module(module: &Module) -> Result<Handle<Computation>, AnalysisError> {
    let entry = module.entry().ok_or_else(|| MalformedGraph::MissingEntry {
        module: module.name().to_string(),
    })?;
    for (_, computation) in module.computations() {
        let root = computation.root().ok_or_else(|| MalformedGraph::MissingRoot {
            computation: computation.name().to_string(),
        })?;
        if module[root].user_count() > 0 {
            return Err(MalformedGraph::RootHasUsers {
                computation: computation.name().to_string(),
                root: module[root].name().to_string(),
            }
            .into());
        }
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsched_ir::{PrimitiveType, Shape, UnaryOp};

    #[test]
    fn verify_requires_entry() {
        let mut module = Module::new("m");
        let c = module.add_computation("c");
        module
            .builder(c)
            .parameter(0, Shape::scalar(PrimitiveType::F32), "p")
            .unwrap();
        let err = verify_module(&module).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::MalformedGraph(MalformedGraph::MissingEntry { .. })
        ));
    }

    #[test]
    fn verify_rejects_empty_computation() {
        let mut module = Module::new("m");
        let c = module.add_computation("c");
        module.add_computation("empty");
        module
            .builder(c)
            .parameter(0, Shape::scalar(PrimitiveType::F32), "p")
            .unwrap();
        module.set_entry(c).unwrap();
        let err = verify_module(&module).unwrap_err();
        assert_eq!(
            err.to_string(),
            "malformed graph: computation 'empty' has no root instruction"
        );
    }

    #[test]
    fn verify_rejects_used_root() {
        let mut module = Module::new("m");
        let c = module.add_computation("c");
        {
            let mut b = module.builder(c);
            let p = b.parameter(0, Shape::scalar(PrimitiveType::F32), "p").unwrap();
            b.unary(UnaryOp::Exp, p, "e").unwrap();
            b.set_root(p).unwrap();
        }
        module.set_entry(c).unwrap();
        let err = verify_module(&module).unwrap_err();
        assert!(err.is_malformed_graph());
        assert!(matches!(
            err,
            AnalysisError::MalformedGraph(MalformedGraph::RootHasUsers { ref root, .. })
                if root == "p"
        ));
    }
}
