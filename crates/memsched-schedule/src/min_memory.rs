//! Peak-memory estimates for complete schedules.

use std::collections::HashSet;

use memsched_analysis::{
    CallGraph, CalleePeaks, LivenessAnalysis, LivenessContext, MalformedGraph, PointsToAnalysis,
    SizeFunction, verify_module,
};
use memsched_ir::{Computation, Handle, Instruction, Module};

use crate::{ModuleSequence, ScheduleError};

/// Peak bytes of `computation` under `order`, charging each call-like
/// instruction with the largest peak among its callees in
/// `cx.callee_peaks`.
pub fn minimum_memory_for_computation(
    cx: LivenessContext<'_>,
    computation: Handle<Computation>,
    order: &[Handle<Instruction>],
) -> Result<u64, ScheduleError> {
    Ok(LivenessAnalysis::run(cx, computation, order)?.peak_bytes())
}

/// Peak bytes of the whole program under `sequence`, measured from the entry
/// computation.
///
/// Every computation reachable from the entry must have an order in
/// `sequence`; other computations are ignored.
pub fn minimum_memory_for_sequence(
    module: &Module,
    sequence: &ModuleSequence,
    size_fn: &dyn SizeFunction,
) -> Result<u64, ScheduleError> {
    let entry = verify_module(module)?;
    let call_graph = CallGraph::build(module)?;
    let points_to = PointsToAnalysis::run(module)?;

    let mut reachable = HashSet::new();
    let mut stack = vec![entry];
    while let Some(computation) = stack.pop() {
        if reachable.insert(computation) {
            stack.extend(call_graph.node(computation).callees().iter().copied());
        }
    }

    let mut peaks = CalleePeaks::new();
    for &computation in call_graph.postorder() {
        if !reachable.contains(&computation) {
            continue;
        }
        let order = sequence
            .get(computation)
            .ok_or_else(|| MalformedGraph::MissingSequence {
                computation: module[computation].name().to_string(),
            })?;
        let cx = LivenessContext {
            module,
            points_to: &points_to,
            size_fn,
            callee_peaks: &peaks,
        };
        let bytes = minimum_memory_for_computation(cx, computation, order)?;
        peaks.insert(computation, bytes);
    }

    peaks.get(&entry).copied().ok_or_else(|| {
        MalformedGraph::MissingSequence {
            computation: module[entry].name().to_string(),
        }
        .into()
    })
}
