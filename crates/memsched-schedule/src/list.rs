//! Greedy list scheduling by memory pressure.
//!
//! At every step the ready instruction that frees the most memory net of
//! what it allocates is scheduled next. The heuristic is myopic: it never
//! looks past the current step, and an expensive call is postponed even when
//! running it early would lower the peak.

use std::cmp::Ordering;
use std::collections::HashMap;

use memsched_analysis::{LogicalBuffer, MalformedGraph};
use memsched_ir::{Computation, Handle, Instruction, InstructionKind, Module};

use crate::{MemoryScheduler, ScheduleError, SchedulingContext, TieBreak};

/// Memory-pressure list scheduler.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListScheduler;

/// Parameters and constants occupy memory regardless of the order chosen,
/// so the list scheduler does not account for them.
fn is_fixed(module: &Module, instruction: Handle<Instruction>) -> bool {
    matches!(
        module[instruction].kind(),
        InstructionKind::Parameter { .. } | InstructionKind::Constant
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Priority {
    net_bytes: i128,
    user_count: usize,
}

struct ReadyEntry {
    instruction: Handle<Instruction>,
    program_order: usize,
    readied_at: usize,
}

struct ListState<'a, 'cx> {
    cx: &'a SchedulingContext<'cx>,
    buffer_size: HashMap<Handle<LogicalBuffer>, u64>,
    unscheduled_use_count: HashMap<Handle<LogicalBuffer>, usize>,
    buffer_uses: HashMap<Handle<Instruction>, Vec<Handle<LogicalBuffer>>>,
}

impl ListState<'_, '_> {
    fn bytes_defined(&self, instruction: Handle<Instruction>) -> u64 {
        self.cx
            .points_to
            .buffers_defined_by(instruction)
            .iter()
            .filter_map(|b| self.buffer_size.get(b))
            .sum()
    }

    fn bytes_freed(&self, instruction: Handle<Instruction>) -> u64 {
        self.buffer_uses[&instruction]
            .iter()
            .filter(|b| self.unscheduled_use_count.get(b) == Some(&1))
            .filter_map(|b| self.buffer_size.get(b))
            .sum()
    }

    fn max_callee_peak(&self, instruction: Handle<Instruction>) -> u64 {
        self.cx.module[instruction]
            .called_computations()
            .iter()
            .filter_map(|c| self.cx.callee_peaks.get(c).copied())
            .max()
            .unwrap_or(0)
    }

    fn priority(&self, instruction: Handle<Instruction>) -> Priority {
        let net_bytes = i128::from(self.bytes_freed(instruction))
            - i128::from(self.bytes_defined(instruction))
            - i128::from(self.max_callee_peak(instruction));
        Priority {
            net_bytes,
            user_count: self.cx.module[instruction].user_count(),
        }
    }
}

impl MemoryScheduler for ListScheduler {
    fn name(&self) -> &'static str {
        "list"
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

        let mut state = ListState {
            cx,
            buffer_size: HashMap::new(),
            unscheduled_use_count: HashMap::new(),
            buffer_uses: HashMap::new(),
        };
        for &instruction in comp.instructions() {
            if !is_fixed(module, instruction) {
                for &buffer in cx.points_to.buffers_defined_by(instruction) {
                    let bytes = cx.size_fn.size_of(cx.points_to.buffer(buffer))?;
                    state.buffer_size.insert(buffer, bytes);
                }
            }
            let uses = cx.points_to.buffers_used_by(module, instruction);
            for &buffer in &uses {
                *state.unscheduled_use_count.entry(buffer).or_default() += 1;
            }
            state.buffer_uses.insert(instruction, uses);
        }
        // Values leaving the computation have one use that is never scheduled.
        for buffer in cx.points_to.points_to(root).flattened() {
            *state.unscheduled_use_count.entry(buffer).or_default() += 1;
        }

        let program_order: HashMap<Handle<Instruction>, usize> = comp
            .instructions()
            .iter()
            .enumerate()
            .map(|(i, &h)| (h, i))
            .collect();
        let mut pending_operands: HashMap<Handle<Instruction>, usize> = comp
            .instructions()
            .iter()
            .map(|&h| (h, module[h].unique_operands().len()))
            .collect();

        let mut readied = 0usize;
        let mut ready: Vec<ReadyEntry> = Vec::new();
        for &instruction in comp.instructions() {
            if pending_operands[&instruction] == 0 {
                ready.push(ReadyEntry {
                    instruction,
                    program_order: program_order[&instruction],
                    readied_at: readied,
                });
                readied += 1;
            }
        }

        let mut sequence = Vec::with_capacity(comp.instruction_count());
        while !ready.is_empty() {
            let mut best: Option<(usize, Priority)> = None;
            for (i, entry) in ready.iter().enumerate() {
                // The root goes last: only pick it once nothing else is ready.
                if entry.instruction == root && ready.len() > 1 {
                    continue;
                }
                let priority = state.priority(entry.instruction);
                let better = match best {
                    None => true,
                    Some((j, best_priority)) => match priority.cmp(&best_priority) {
                        Ordering::Greater => true,
                        Ordering::Less => false,
                        Ordering::Equal => {
                            let incumbent = &ready[j];
                            match cx.tie_break {
                                TieBreak::ProgramOrder => {
                                    entry.program_order < incumbent.program_order
                                }
                                TieBreak::LatestReady => entry.readied_at > incumbent.readied_at,
                            }
                        }
                    },
                };
                if better {
                    best = Some((i, priority));
                }
            }
            let Some((index, priority)) = best else {
                break;
            };
            let instruction = ready.remove(index).instruction;
            log::trace!(
                "list: '{}' (net {} bytes, {} users)",
                module[instruction].name(),
                priority.net_bytes,
                priority.user_count
            );
            sequence.push(instruction);

            for buffer in &state.buffer_uses[&instruction] {
                if let Some(count) = state.unscheduled_use_count.get_mut(buffer) {
                    *count = count.saturating_sub(1);
                }
            }
            for &user in module[instruction].users() {
                if let Some(count) = pending_operands.get_mut(&user) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(ReadyEntry {
                            instruction: user,
                            program_order: program_order[&user],
                            readied_at: readied,
                        });
                        readied += 1;
                    }
                }
            }
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
