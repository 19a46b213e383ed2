use memsched_analysis::{AnalysisError, MalformedGraph, SizeError};
use memsched_ir::IrError;

/// Errors produced while scheduling or scoring a module.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// A scheduler ran out of ready instructions before ordering the whole
    /// computation. Only possible when the dependency graph has a cycle.
    #[error("{scheduler} scheduler ordered {scheduled} of {total} instructions of computation '{computation}'")]
    Incomplete {
        scheduler: &'static str,
        computation: String,
        scheduled: usize,
        total: usize,
    },
}

impl ScheduleError {
    /// Returns `true` for defects of the input module rather than of the
    /// size function.
    pub fn is_malformed_graph(&self) -> bool {
        match self {
            Self::Analysis(err) => err.is_malformed_graph(),
            Self::Incomplete { .. } => true,
        }
    }
}

impl From<MalformedGraph> for ScheduleError {
    fn from(err: MalformedGraph) -> Self {
        Self::Analysis(err.into())
    }
}

impl From<SizeError> for ScheduleError {
    fn from(err: SizeError) -> Self {
        Self::Analysis(err.into())
    }
}

impl From<IrError> for ScheduleError {
    fn from(err: IrError) -> Self {
        Self::Analysis(err.into())
    }
}
