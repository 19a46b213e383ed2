//! Text dump for debugging.

use std::fmt::Write;

use crate::Module;
use crate::arena::Handle;
use crate::computation::Computation;
use crate::instruction::{Instruction, InstructionKind};

/// Renders a whole module, one computation per block, embedded computations
/// first and the entry computation marked `ENTRY`.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "module {}", module.name());
    for (handle, computation) in module.computations() {
        out.push('\n');
        dump_computation(module, handle, computation, &mut out);
    }
    out
}

fn dump_computation(
    module: &Module,
    handle: Handle<Computation>,
    computation: &Computation,
    out: &mut String,
) {
    let prefix = if module.entry() == Some(handle) {
        "ENTRY "
    } else {
        ""
    };
    let _ = writeln!(out, "{prefix}%{} {{", computation.name());
    for &instruction in computation.instructions() {
        let marker = if computation.root() == Some(instruction) {
            "ROOT "
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "  {marker}{}",
            format_instruction(module, &module[instruction])
        );
    }
    out.push_str("}\n");
}

/// Formats one instruction as `%name = shape opcode(operands), attributes`.
pub(crate) fn format_instruction(module: &Module, instruction: &Instruction) -> String {
    let operands: Vec<String> = instruction
        .operands()
        .iter()
        .map(|&o| format!("%{}", module[o].name()))
        .collect();
    let mut line = format!(
        "%{} = {} {}({})",
        instruction.name(),
        instruction.shape(),
        instruction.kind().mnemonic(),
        operands.join(", "),
    );

    let callee = |c: Handle<Computation>| format!("%{}", module[c].name());
    match instruction.kind() {
        InstructionKind::Parameter { number } => {
            line = format!(
                "%{} = {} parameter({number})",
                instruction.name(),
                instruction.shape()
            );
        }
        InstructionKind::Compare(direction) => {
            let _ = write!(line, ", direction={direction}");
        }
        InstructionKind::Broadcast { dimensions }
        | InstructionKind::Transpose { dimensions }
        | InstructionKind::Reduce { dimensions, .. } => {
            let dims: Vec<String> = dimensions.iter().map(|d| d.to_string()).collect();
            let _ = write!(line, ", dimensions={{{}}}", dims.join(","));
        }
        InstructionKind::GetTupleElement { index } => {
            let _ = write!(line, ", index={index}");
        }
        InstructionKind::While { condition, body } => {
            let _ = write!(
                line,
                ", condition={}, body={}",
                callee(*condition),
                callee(*body)
            );
        }
        InstructionKind::Conditional { branches } => {
            let names: Vec<String> = branches.iter().map(|&b| callee(b)).collect();
            let _ = write!(line, ", branch_computations={{{}}}", names.join(", "));
        }
        _ => {}
    }
    if let InstructionKind::Call { to_apply }
    | InstructionKind::Map { to_apply }
    | InstructionKind::Reduce { to_apply, .. } = instruction.kind()
    {
        let _ = write!(line, ", to_apply={}", callee(*to_apply));
    }
    line
}
