#![no_main]

use libfuzzer_sys::fuzz_target;
use memsched_analysis::{shape_size, validate_sequence};
use memsched_ir::{BinaryOp, Handle, Instruction, Module, PrimitiveType, Shape, UnaryOp};
use memsched_schedule::{
    SchedulerConfig, Strategy, TieBreak, create_memory_minimizing_sequence,
    minimum_memory_for_sequence,
};

/// Decodes bytes into a single-computation module: two bytes per
/// instruction, an opcode selector and an operand selector.
fn build(data: &[u8]) -> Option<Module> {
    let (&params, rest) = data.split_first()?;
    let shape = Shape::array(PrimitiveType::F32, &[4]);
    let mut module = Module::new("fuzz");
    let main = module.add_computation("main");
    {
        let mut b = module.builder(main);
        let mut values: Vec<Handle<Instruction>> = Vec::new();
        for i in 0..usize::from(params % 4) + 1 {
            values.push(b.parameter(i, shape.clone(), format!("p{i}")).ok()?);
        }
        for (i, pair) in rest.chunks_exact(2).enumerate() {
            let x = values[usize::from(pair[1]) % values.len()];
            let y = values[usize::from(pair[1] / 7) % values.len()];
            let name = format!("n{i}");
            let value = match pair[0] % 4 {
                0 => b.unary(UnaryOp::Exp, x, name),
                1 => b.binary(BinaryOp::Add, x, y, name),
                2 => b.copy(x, name),
                _ => {
                    let t = b.tuple(vec![x, y], format!("t{i}")).ok()?;
                    b.get_tuple_element(t, usize::from(pair[1] & 1), name)
                }
            };
            values.push(value.ok()?);
        }
    }
    module.set_entry(main).ok()?;
    Some(module)
}

fuzz_target!(|data: &[u8]| {
    let Some(module) = build(data) else {
        return;
    };
    let strategy = match data.last().map(|b| b % 3) {
        Some(0) => Strategy::List,
        Some(1) => Strategy::Dfs,
        _ => Strategy::Best,
    };
    let config = SchedulerConfig {
        strategy,
        tie_break: TieBreak::ProgramOrder,
    };
    let size_fn = shape_size(8);
    let sequence = create_memory_minimizing_sequence(&module, &size_fn, &config)
        .expect("well-formed modules always schedule");
    for (computation, order) in sequence.iter() {
        validate_sequence(&module, computation, order).expect("scheduled order is valid");
    }
    minimum_memory_for_sequence(&module, &sequence, &size_fn).expect("estimate succeeds");
});
