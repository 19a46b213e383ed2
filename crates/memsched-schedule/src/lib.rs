//! Memory-minimizing instruction scheduling.
//!
//! Provides a [`MemoryScheduler`] trait with two built-in schedulers
//! ([`ListScheduler`], [`DfsScheduler`]), a [`ScheduleDriver`] that orders
//! every computation of a module callees-first, and the estimators and
//! ordering queries that operate on the resulting [`ModuleSequence`].

mod dfs;
mod driver;
mod error;
mod list;
mod min_memory;
mod ordering;
mod sequence;

pub use dfs::DfsScheduler;
pub use driver::{
    ScheduleDriver, SchedulerConfig, Strategy, TieBreak, create_memory_minimizing_sequence,
};
pub use error::ScheduleError;
pub use list::ListScheduler;
pub use min_memory::{minimum_memory_for_computation, minimum_memory_for_sequence};
pub use ordering::SequentialOrdering;
pub use sequence::{ModuleSequence, SequenceDisplay};

use std::fmt::Debug;

use memsched_analysis::{CalleePeaks, LivenessContext, PointsToAnalysis, SizeFunction};
use memsched_ir::{Computation, Handle, Instruction, Module};

/// Shared, read-only inputs of one scheduling run.
#[derive(Clone, Copy)]
pub struct SchedulingContext<'a> {
    pub module: &'a Module,
    pub points_to: &'a PointsToAnalysis,
    pub size_fn: &'a dyn SizeFunction,
    /// Peaks of every computation scheduled so far.
    pub callee_peaks: &'a CalleePeaks,
    pub tie_break: TieBreak,
}

impl<'a> SchedulingContext<'a> {
    /// The same inputs, as consumed by the liveness analysis.
    pub fn liveness(&self) -> LivenessContext<'a> {
        LivenessContext {
            module: self.module,
            points_to: self.points_to,
            size_fn: self.size_fn,
            callee_peaks: self.callee_peaks,
        }
    }
}

/// Produces an execution order for a single computation.
pub trait MemoryScheduler: Debug {
    /// Human-readable name of the scheduler.
    fn name(&self) -> &'static str;

    /// Orders every instruction of `computation`, operands before users and
    /// the root last. Callees of `computation` have already been scheduled
    /// and their peaks are in `cx.callee_peaks`.
    fn schedule(
        &self,
        cx: &SchedulingContext<'_>,
        computation: Handle<Computation>,
    ) -> Result<Vec<Handle<Instruction>>, ScheduleError>;
}
