//! Buffer liveness over a fixed instruction sequence.
//!
//! Replays a sequence against a fragmentation-free heap: a buffer is
//! allocated when its defining instruction runs and released after the last
//! instruction that reads it. Buffers that leave the computation, and
//! parameters of the entry computation, stay allocated to the end.
//!
//! An elementwise instruction or a while loop may take over a buffer of one
//! of its operands when that buffer dies at the same step and has the same
//! shape; the bytes then move to the new buffer instead of being counted
//! twice.

use std::collections::{BTreeMap, HashMap, HashSet};

use memsched_ir::{Computation, Handle, Instruction, InstructionKind, Module};

use crate::error::{AnalysisError, MalformedGraph};
use crate::points_to::{LogicalBuffer, PointsToAnalysis};
use crate::size::SizeFunction;

/// Peak memory of computations that have already been analyzed, charged at
/// the instructions that call them.
pub type CalleePeaks = HashMap<Handle<Computation>, u64>;

/// Everything a liveness run reads besides the sequence itself.
#[derive(Clone, Copy)]
pub struct LivenessContext<'a> {
    pub module: &'a Module,
    pub points_to: &'a PointsToAnalysis,
    pub size_fn: &'a dyn SizeFunction,
    pub callee_peaks: &'a CalleePeaks,
}

/// The steps during which one buffer occupies memory. Positions are indices
/// into the analyzed sequence and both ends are inclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiveInterval {
    pub buffer: Handle<LogicalBuffer>,
    /// Position of the defining instruction.
    pub start: usize,
    /// Position after which the buffer is released.
    pub end: usize,
    pub size_bytes: u64,
    /// Live until the computation finishes.
    pub live_out: bool,
    /// Buffer that took over this one's storage at `end`.
    pub reused_by: Option<Handle<LogicalBuffer>>,
}

struct PendingUses {
    users: HashSet<Handle<Instruction>>,
    pinned: bool,
}

/// Liveness of every buffer of one computation under one sequence.
#[derive(Debug)]
pub struct LivenessAnalysis {
    intervals: Vec<LiveInterval>,
    live_after: Vec<Vec<Handle<LogicalBuffer>>>,
    peak_bytes: u64,
    peak_position: Option<usize>,
}

impl LivenessAnalysis {
    /// Simulates `sequence`, the full execution order of `computation`.
    ///
    /// Each instruction first retires its operand uses, then allocates the
    /// buffers it defines, then the peak is sampled (plus the largest callee
    /// peak for call-like instructions), and finally buffers that died at
    /// this step are released.
    pub fn run(
        cx: LivenessContext<'_>,
        computation: Handle<Computation>,
        sequence: &[Handle<Instruction>],
    ) -> Result<Self, AnalysisError> {
        let module = cx.module;
        let points_to = cx.points_to;
        let comp = module.try_computation(computation)?;
        validate_sequence(module, computation, sequence)?;
        let root = comp.root().ok_or_else(|| MalformedGraph::MissingRoot {
            computation: comp.name().to_string(),
        })?;

        let outputs: HashSet<_> = points_to.points_to(root).flattened().into_iter().collect();
        let is_entry = module.entry() == Some(computation);

        let mut pending: HashMap<Handle<LogicalBuffer>, PendingUses> = HashMap::new();
        for &instruction in sequence {
            for &buffer in points_to.buffers_defined_by(instruction) {
                if is_ignored(module, points_to, buffer) {
                    continue;
                }
                let users = points_to
                    .buffer_aliases(buffer)
                    .iter()
                    .flat_map(|alias| module[alias.instruction].users().iter().copied())
                    .collect();
                let pinned = outputs.contains(&buffer)
                    || (is_entry
                        && matches!(module[instruction].kind(), InstructionKind::Parameter { .. }));
                pending.insert(buffer, PendingUses { users, pinned });
            }
        }

        let mut live: BTreeMap<Handle<LogicalBuffer>, u64> = BTreeMap::new();
        let mut intervals: BTreeMap<Handle<LogicalBuffer>, LiveInterval> = BTreeMap::new();
        let mut live_after = Vec::with_capacity(sequence.len());
        let mut current = 0u64;
        let mut peak_bytes = 0u64;
        let mut peak_position = None;

        for (position, &instruction) in sequence.iter().enumerate() {
            let mut dying = Vec::new();
            for buffer in points_to.buffers_used_by(module, instruction) {
                if let Some(uses) = pending.get_mut(&buffer) {
                    uses.users.remove(&instruction);
                    if uses.users.is_empty() && !uses.pinned && live.contains_key(&buffer) {
                        dying.push(buffer);
                    }
                }
            }

            for &buffer in points_to.buffers_defined_by(instruction) {
                let Some(uses) = pending.get(&buffer) else {
                    continue;
                };
                let donor = dying
                    .iter()
                    .position(|&d| can_share(module, points_to, instruction, buffer, d));
                let size_bytes = match donor {
                    Some(i) => {
                        let donor = dying.remove(i);
                        let bytes = live.remove(&donor).unwrap_or_default();
                        if let Some(interval) = intervals.get_mut(&donor) {
                            interval.end = position;
                            interval.reused_by = Some(buffer);
                        }
                        log::trace!(
                            "{} reuses storage of {}",
                            points_to.buffer(buffer),
                            points_to.buffer(donor)
                        );
                        bytes
                    }
                    None => {
                        let bytes = cx.size_fn.size_of(points_to.buffer(buffer))?;
                        current = current.saturating_add(bytes);
                        bytes
                    }
                };
                live.insert(buffer, size_bytes);
                intervals.insert(
                    buffer,
                    LiveInterval {
                        buffer,
                        start: position,
                        end: position,
                        size_bytes,
                        live_out: uses.pinned,
                        reused_by: None,
                    },
                );
                if uses.users.is_empty() && !uses.pinned {
                    dying.push(buffer);
                }
            }

            if current > peak_bytes || peak_position.is_none() {
                peak_bytes = peak_bytes.max(current);
                peak_position = Some(position);
            }
            let callee_peak = module[instruction]
                .called_computations()
                .iter()
                .filter_map(|c| cx.callee_peaks.get(c).copied())
                .max()
                .unwrap_or(0);
            let with_callee = current.saturating_add(callee_peak);
            if with_callee > peak_bytes {
                peak_bytes = with_callee;
                peak_position = Some(position);
            }

            for buffer in dying {
                if let Some(bytes) = live.remove(&buffer) {
                    current = current.saturating_sub(bytes);
                    if let Some(interval) = intervals.get_mut(&buffer) {
                        interval.end = position;
                    }
                }
            }
            live_after.push(live.keys().copied().collect());
        }

        let last = sequence.len().saturating_sub(1);
        for buffer in live.keys() {
            if let Some(interval) = intervals.get_mut(buffer) {
                interval.end = last;
            }
        }

        log::trace!(
            "liveness of '{}': {} buffers, peak {} bytes",
            comp.name(),
            intervals.len(),
            peak_bytes
        );
        Ok(Self {
            intervals: intervals.into_values().collect(),
            live_after,
            peak_bytes,
            peak_position,
        })
    }

    /// Highest simultaneous footprint, callee peaks included.
    pub fn peak_bytes(&self) -> u64 {
        self.peak_bytes
    }

    /// Position at which the peak is first reached.
    pub fn peak_position(&self) -> Option<usize> {
        self.peak_position
    }

    /// Buffers still allocated once the instruction at `position` finished.
    pub fn live_after(&self, position: usize) -> &[Handle<LogicalBuffer>] {
        self.live_after
            .get(position)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Intervals of every accounted buffer, ordered by buffer handle.
    pub fn intervals(&self) -> &[LiveInterval] {
        &self.intervals
    }

    pub fn interval(&self, buffer: Handle<LogicalBuffer>) -> Option<&LiveInterval> {
        self.intervals
            .binary_search_by_key(&buffer, |i| i.buffer)
            .ok()
            .map(|i| &self.intervals[i])
    }

    /// Returns `true` if `buffer` is still allocated after `position`.
    pub fn is_live_after(&self, buffer: Handle<LogicalBuffer>, position: usize) -> bool {
        self.live_after(position).contains(&buffer)
    }
}

/// Constants live in read-only storage and never take heap space.
pub fn is_ignored(
    module: &Module,
    points_to: &PointsToAnalysis,
    buffer: Handle<LogicalBuffer>,
) -> bool {
    matches!(
        module[points_to.buffer(buffer).instruction()].kind(),
        InstructionKind::Constant
    )
}

fn can_share(
    module: &Module,
    points_to: &PointsToAnalysis,
    user: Handle<Instruction>,
    buffer: Handle<LogicalBuffer>,
    donor: Handle<LogicalBuffer>,
) -> bool {
    let user = &module[user];
    let donor = points_to.buffer(donor);
    if matches!(user.kind(), InstructionKind::Copy)
        || !user.is_user_of(donor.instruction())
        || donor.shape() != points_to.buffer(buffer).shape()
    {
        return false;
    }
    matches!(user.kind(), InstructionKind::While { .. }) || user.kind().is_elementwise()
}

/// Checks that `sequence` lists every instruction of `computation` exactly
/// once with operands before their users.
pub fn validate_sequence(
    module: &Module,
    computation: Handle<Computation>,
    sequence: &[Handle<Instruction>],
) -> Result<(), AnalysisError> {
    let comp = module.try_computation(computation)?;
    let invalid = |reason: String| MalformedGraph::InvalidSequence {
        computation: comp.name().to_string(),
        reason,
    };

    if sequence.len() != comp.instruction_count() {
        return Err(invalid(format!(
            "expected {} instructions, found {}",
            comp.instruction_count(),
            sequence.len()
        ))
        .into());
    }

    let mut positions = HashMap::with_capacity(sequence.len());
    for (position, &handle) in sequence.iter().enumerate() {
        let instruction = module.try_instruction(handle)?;
        if instruction.parent() != computation {
            return Err(invalid(format!(
                "'{}' belongs to computation '{}'",
                instruction.name(),
                module[instruction.parent()].name()
            ))
            .into());
        }
        if positions.insert(handle, position).is_some() {
            return Err(invalid(format!("'{}' appears more than once", instruction.name())).into());
        }
    }

    for (position, &handle) in sequence.iter().enumerate() {
        let instruction = &module[handle];
        for &operand in instruction.operands() {
            if positions.get(&operand).is_none_or(|&p| p >= position) {
                return Err(invalid(format!(
                    "'{}' runs before its operand '{}'",
                    instruction.name(),
                    module[operand].name()
                ))
                .into());
            }
        }
    }
    Ok(())
}
