//! Module-level scheduling: every computation, callees first.

use memsched_analysis::{
    CallGraph, CalleePeaks, PointsToAnalysis, SizeFunction, verify_module,
};
use memsched_ir::Module;

use crate::{
    DfsScheduler, ListScheduler, MemoryScheduler, ModuleSequence, ScheduleError,
    SchedulingContext, minimum_memory_for_computation,
};

/// Which schedulers the driver tries on each computation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Greedy memory-pressure list scheduling.
    List,
    /// Depth-first post-order.
    Dfs,
    /// Both, keeping whichever order has the lower peak (list on ties).
    #[default]
    Best,
}

/// How the list scheduler orders ready instructions of equal priority.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// The instruction added to the computation first.
    #[default]
    ProgramOrder,
    /// The instruction that became ready most recently.
    LatestReady,
}

/// Scheduling options. The size function is passed separately.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub strategy: Strategy,
    pub tie_break: TieBreak,
}

/// Schedules every computation of a module with a set of candidate
/// schedulers and keeps the cheapest order per computation.
#[derive(Debug, Default)]
pub struct ScheduleDriver {
    schedulers: Vec<Box<dyn MemoryScheduler>>,
    tie_break: TieBreak,
}

impl ScheduleDriver {
    /// Creates a driver with no schedulers. Such a driver keeps every
    /// computation in construction order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a driver with the schedulers `strategy` calls for.
    pub fn for_strategy(strategy: Strategy) -> Self {
        let mut driver = Self::new();
        match strategy {
            Strategy::List => driver.add_scheduler(Box::new(ListScheduler)),
            Strategy::Dfs => driver.add_scheduler(Box::new(DfsScheduler)),
            Strategy::Best => {
                driver.add_scheduler(Box::new(ListScheduler));
                driver.add_scheduler(Box::new(DfsScheduler));
            }
        }
        driver
    }

    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self::for_strategy(config.strategy).with_tie_break(config.tie_break)
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Adds a candidate. Earlier candidates win ties.
    pub fn add_scheduler(&mut self, scheduler: Box<dyn MemoryScheduler>) {
        self.schedulers.push(scheduler);
    }

    /// Schedules `module` and returns the chosen order of every computation.
    pub fn run(
        &self,
        module: &Module,
        size_fn: &dyn SizeFunction,
    ) -> Result<ModuleSequence, ScheduleError> {
        self.run_with_peaks(module, size_fn)
            .map(|(sequence, _)| sequence)
    }

    /// Like [`run`](Self::run), also returning the peak bytes of each
    /// computation under its chosen order.
    pub fn run_with_peaks(
        &self,
        module: &Module,
        size_fn: &dyn SizeFunction,
    ) -> Result<(ModuleSequence, CalleePeaks), ScheduleError> {
        verify_module(module)?;
        let call_graph = CallGraph::build(module)?;
        let points_to = PointsToAnalysis::run(module)?;

        let mut peaks = CalleePeaks::new();
        let mut sequence = ModuleSequence::new();
        for &computation in call_graph.postorder() {
            let comp = &module[computation];
            let unused = comp
                .instructions()
                .iter()
                .filter(|&&h| Some(h) != comp.root() && module[h].user_count() == 0)
                .count();
            if unused > 0 {
                log::warn!(
                    "computation '{}' has {unused} instructions whose values are never used",
                    comp.name()
                );
            }

            let cx = SchedulingContext {
                module,
                points_to: &points_to,
                size_fn,
                callee_peaks: &peaks,
                tie_break: self.tie_break,
            };

            let mut best: Option<(u64, &'static str, Vec<_>)> = None;
            if self.schedulers.is_empty() {
                let order = comp.instructions().to_vec();
                let bytes = minimum_memory_for_computation(cx.liveness(), computation, &order)?;
                best = Some((bytes, "construction-order", order));
            }
            for scheduler in &self.schedulers {
                let order = scheduler.schedule(&cx, computation)?;
                let bytes = minimum_memory_for_computation(cx.liveness(), computation, &order)?;
                log::debug!(
                    "{} order of '{}' peaks at {bytes} bytes",
                    scheduler.name(),
                    comp.name()
                );
                if best.as_ref().is_none_or(|(least, _, _)| bytes < *least) {
                    best = Some((bytes, scheduler.name(), order));
                }
            }

            if let Some((bytes, name, order)) = best {
                log::debug!("scheduled '{}' with {name}: {bytes} bytes", comp.name());
                peaks.insert(computation, bytes);
                sequence.insert(computation, order);
            }
        }
        Ok((sequence, peaks))
    }
}

/// Schedules every computation of `module` according to `config`.
pub fn create_memory_minimizing_sequence(
    module: &Module,
    size_fn: &dyn SizeFunction,
    config: &SchedulerConfig,
) -> Result<ModuleSequence, ScheduleError> {
    ScheduleDriver::from_config(config).run(module, size_fn)
}
