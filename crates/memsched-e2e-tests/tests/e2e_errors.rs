//! Malformed modules and failing size functions are rejected as a whole.

mod common;

use memsched_analysis::{AnalysisError, LogicalBuffer, MalformedGraph, SizeError};
use memsched_ir::{InstructionKind, IrError, Module, PrimitiveType, Shape, UnaryOp};
use memsched_schedule::{
    ModuleSequence, SchedulerConfig, ScheduleError, SequentialOrdering,
    create_memory_minimizing_sequence, minimum_memory_for_sequence,
};

fn scalar() -> Shape {
    Shape::scalar(PrimitiveType::F32)
}

fn schedule(module: &Module) -> Result<ModuleSequence, ScheduleError> {
    create_memory_minimizing_sequence(module, &common::sizes(), &SchedulerConfig::default())
}

#[test]
fn cyclic_call_graph() {
    let mut module = Module::new("cyclic");
    let a = module.add_computation("a");
    let b = module.add_computation("b");
    {
        let mut builder = module.builder(a);
        let p = builder.parameter(0, scalar(), "p").unwrap();
        builder.call(scalar(), b, vec![p], "call_b").unwrap();
    }
    {
        let mut builder = module.builder(b);
        let p = builder.parameter(0, scalar(), "p").unwrap();
        builder.call(scalar(), a, vec![p], "call_a").unwrap();
    }
    module.set_entry(a).unwrap();

    let err = schedule(&module).unwrap_err();
    assert!(err.is_malformed_graph());
    assert!(matches!(
        err,
        ScheduleError::Analysis(AnalysisError::MalformedGraph(
            MalformedGraph::CyclicCallGraph { .. }
        ))
    ));
}

#[test]
fn self_recursive_computation() {
    let mut module = Module::new("recursive");
    let a = module.add_computation("a");
    {
        let mut builder = module.builder(a);
        let p = builder.parameter(0, scalar(), "p").unwrap();
        builder.call(scalar(), a, vec![p], "again").unwrap();
    }
    module.set_entry(a).unwrap();

    let err = schedule(&module).unwrap_err();
    assert_eq!(
        err.to_string(),
        "malformed graph: call graph cycle through computation 'a'"
    );
}

#[test]
fn computation_without_root() {
    let mut module = Module::new("m");
    let empty = module.add_computation("empty");
    let main = module.add_computation("main");
    {
        let mut b = module.builder(main);
        let p = b.parameter(0, scalar(), "p").unwrap();
        b.call(scalar(), empty, vec![p], "call").unwrap();
    }
    module.set_entry(main).unwrap();

    let err = schedule(&module).unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::Analysis(AnalysisError::MalformedGraph(MalformedGraph::MissingRoot {
            ref computation
        })) if computation == "empty"
    ));
}

#[test]
fn root_with_users() {
    let mut module = Module::new("m");
    let main = module.add_computation("main");
    {
        let mut b = module.builder(main);
        let p = b.parameter(0, scalar(), "p").unwrap();
        let e = b.unary(UnaryOp::Exp, p, "e").unwrap();
        b.unary(UnaryOp::Negate, e, "n").unwrap();
        b.set_root(e).unwrap();
    }
    module.set_entry(main).unwrap();

    let err = schedule(&module).unwrap_err();
    assert!(err.is_malformed_graph());
}

#[test]
fn get_tuple_element_without_operand_is_rejected() {
    let mut module = Module::new("m");
    let main = module.add_computation("main");
    {
        let mut b = module.builder(main);
        let p = b.parameter(0, scalar(), "p").unwrap();
        let err = b
            .add(
                "g",
                InstructionKind::GetTupleElement { index: 0 },
                vec![],
                scalar(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            IrError::OperandCount {
                expected: 1,
                actual: 0,
                ..
            }
        ));
        b.unary(UnaryOp::Exp, p, "e").unwrap();
    }
    module.set_entry(main).unwrap();

    assert!(module.find_instruction(main, "g").is_none());
    let sequence = schedule(&module).unwrap();
    assert_eq!(sequence.get(main).unwrap().len(), 2);
}

#[test]
fn sequence_missing_an_instruction() {
    let module = common::last_use_module();
    let entry = common::entry(&module);
    let mut order = module[entry].instructions().to_vec();
    order.pop();
    let mut sequence = ModuleSequence::new();
    sequence.insert(entry, order);

    let err = minimum_memory_for_sequence(&module, &sequence, &common::sizes()).unwrap_err();
    assert!(err.is_malformed_graph());
    assert!(SequentialOrdering::new(&module, sequence).is_err());
}

#[test]
fn sequence_with_instruction_from_another_computation() {
    let module = common::while_tuple_module();
    let main = common::entry(&module);
    let mut sequence = ModuleSequence::construction_order(&module);
    let mut order = module[main].instructions().to_vec();
    order[0] = common::instr(&module, "WhileBody", "body_param");
    sequence.insert(main, order);

    let err = minimum_memory_for_sequence(&module, &sequence, &common::sizes()).unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::Analysis(AnalysisError::MalformedGraph(
            MalformedGraph::InvalidSequence { .. }
        ))
    ));
}

#[test]
fn size_function_error_propagates() {
    let module = common::aliasing_module();
    let refuse_tuples = |buffer: &LogicalBuffer| -> Result<u64, SizeError> {
        if buffer.is_tuple() {
            Err(SizeError::new(buffer, "tuples are not sized"))
        } else {
            Ok(buffer.shape().byte_size(8))
        }
    };

    let err = create_memory_minimizing_sequence(
        &module,
        &refuse_tuples,
        &SchedulerConfig::default(),
    )
    .unwrap_err();
    assert!(!err.is_malformed_graph());
    assert!(matches!(
        err,
        ScheduleError::Analysis(AnalysisError::Size(ref e)) if e.reason == "tuples are not sized"
    ));
}
