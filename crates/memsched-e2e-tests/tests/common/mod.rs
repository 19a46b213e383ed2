use memsched_analysis::SizeFunction;
#[allow(unused_imports)]
use memsched_ir::{
    BinaryOp, ComparisonDirection, Computation, Handle, Instruction, Module, PrimitiveType, Shape,
    UnaryOp,
};
use proptest::prelude::*;

/// Shape-based sizes with 8-byte tuple pointers.
#[allow(dead_code)]
pub fn sizes() -> impl SizeFunction + Copy {
    memsched_analysis::shape_size(8)
}

/// Looks up an instruction by computation and instruction name.
#[allow(dead_code)]
pub fn instr(module: &Module, computation: &str, name: &str) -> Handle<Instruction> {
    let c = module
        .find_computation(computation)
        .unwrap_or_else(|| panic!("no computation '{computation}'"));
    module
        .find_instruction(c, name)
        .unwrap_or_else(|| panic!("no instruction '{name}' in '{computation}'"))
}

#[allow(dead_code)]
pub fn entry(module: &Module) -> Handle<Computation> {
    module.entry().expect("module has an entry")
}

/// ```text
/// ab = abs(param); exp = exp(param); add = add(ab, exp)
/// negate = negate(exp); sub = subtract(add, negate)
/// ```
#[allow(dead_code)]
pub fn last_use_module() -> Module {
    let vec = Shape::array(PrimitiveType::F32, &[42]);
    let mut module = Module::new("last_use");
    let main = module.add_computation("main");
    {
        let mut b = module.builder(main);
        let param = b.parameter(0, vec, "param").unwrap();
        let ab = b.unary(UnaryOp::Abs, param, "ab").unwrap();
        let exp = b.unary(UnaryOp::Exp, param, "exp").unwrap();
        let add = b.binary(BinaryOp::Add, ab, exp, "add").unwrap();
        let negate = b.unary(UnaryOp::Negate, exp, "negate").unwrap();
        b.binary(BinaryOp::Subtract, add, negate, "sub").unwrap();
    }
    module.set_entry(main).unwrap();
    module
}

/// Two copies grouped in a tuple and taken apart again; `d` is the last
/// reader of `p1`.
#[allow(dead_code)]
pub fn aliasing_module() -> Module {
    let vec = Shape::array(PrimitiveType::S32, &[1000]);
    let mut module = Module::new("test_aliasing_module");
    let root = module.add_computation("root");
    {
        let mut b = module.builder(root);
        let param = b.parameter(0, vec, "param").unwrap();
        let p0 = b.copy(param, "p0").unwrap();
        let p1 = b.copy(param, "p1").unwrap();
        let t = b.tuple(vec![p0, p1], "t").unwrap();
        let a = b.get_tuple_element(t, 0, "a").unwrap();
        let bb = b.get_tuple_element(t, 1, "b").unwrap();
        let c = b.binary(BinaryOp::Add, a, bb, "c").unwrap();
        let d = b.binary(BinaryOp::Add, c, bb, "d").unwrap();
        let e = b.binary(BinaryOp::Add, c, c, "e").unwrap();
        let f = b.binary(BinaryOp::Add, e, e, "f").unwrap();
        b.tuple(vec![d, e, f], "result").unwrap();
    }
    module.set_entry(root).unwrap();
    module
}

/// A while loop over a pair of scalars with a comparing condition and an
/// identity body.
#[allow(dead_code)]
pub fn while_tuple_module() -> Module {
    let scalar = Shape::scalar(PrimitiveType::F32);
    let pair = Shape::tuple(vec![scalar.clone(), scalar.clone()]);
    let mut module = Module::new("multi_computation");

    let cond = module.add_computation("WhileCond");
    {
        let mut b = module.builder(cond);
        let p = b.parameter(0, pair.clone(), "cond_param").unwrap();
        let iter = b.get_tuple_element(p, 0, "cond_iter").unwrap();
        let data = b.get_tuple_element(p, 1, "cond_data").unwrap();
        b.compare(ComparisonDirection::Lt, iter, data, "cond_lt")
            .unwrap();
    }
    let body = module.add_computation("WhileBody");
    module
        .builder(body)
        .parameter(0, pair.clone(), "body_param")
        .unwrap();

    let main = module.add_computation("MultiComputation");
    {
        let mut b = module.builder(main);
        let iter = b.parameter(0, scalar.clone(), "param_iter").unwrap();
        let data = b.parameter(1, scalar, "param_data").unwrap();
        let tuple = b.tuple(vec![iter, data], "tuple").unwrap();
        b.while_loop(pair, cond, body, tuple, "while").unwrap();
    }
    module.set_entry(main).unwrap();
    module
}

/// `transpose(matrix) + broadcast(while(...))` where the loop's condition
/// needs 17 bytes and its body 16.
#[allow(dead_code)]
pub fn subcomputation_module() -> Module {
    let r1 = Shape::array(PrimitiveType::F32, &[4]);
    let r2 = Shape::array(PrimitiveType::F32, &[2, 4]);
    let row = Shape::array(PrimitiveType::F32, &[1, 4]);
    let mut module = Module::new("subcomputations");

    let cond = module.add_computation("WhileCond");
    {
        let mut b = module.builder(cond);
        let p = b.parameter(0, r1.clone(), "cond_param").unwrap();
        let zero = b.constant(row.clone(), "zero_vector").unwrap();
        b.compare(ComparisonDirection::Ne, p, zero, "not_equal")
            .unwrap();
    }
    let body = module.add_computation("WhileBody");
    {
        let mut b = module.builder(body);
        let p = b.parameter(0, r1.clone(), "body_param").unwrap();
        let one = b.constant(row.clone(), "one_vector").unwrap();
        b.binary(BinaryOp::Subtract, p, one, "subtract").unwrap();
    }

    let main = module.add_computation("SubcomputationsNotAccounted");
    {
        let mut b = module.builder(main);
        let init = b.constant(row, "while_init").unwrap();
        let lp = b.while_loop(r1, cond, body, init, "while").unwrap();
        let bcast = b.broadcast(r2.clone(), lp, vec![0], "bcast").unwrap();
        let matrix = b.constant(r2.clone(), "matrix").unwrap();
        let transpose = b.transpose(r2, matrix, vec![0, 1], "transpose").unwrap();
        b.binary(BinaryOp::Add, transpose, bcast, "add").unwrap();
    }
    module.set_entry(main).unwrap();
    module
}

/// One step of a randomly generated computation. Operand fields are
/// reduced modulo the number of values built so far.
#[allow(dead_code)]
#[derive(Clone, Debug)]
pub enum NodeSpec {
    Unary(usize),
    Binary(usize, usize),
    Copy(usize),
    /// Tuple of two values, then one element taken back out.
    Pair(usize, usize, bool),
    /// Call of a fixed helper computation.
    Call(usize),
}

#[allow(dead_code)]
pub fn node_spec() -> impl Strategy<Value = NodeSpec> {
    prop_oneof![
        any::<usize>().prop_map(NodeSpec::Unary),
        (any::<usize>(), any::<usize>()).prop_map(|(a, b)| NodeSpec::Binary(a, b)),
        any::<usize>().prop_map(NodeSpec::Copy),
        (any::<usize>(), any::<usize>(), any::<bool>())
            .prop_map(|(a, b, first)| NodeSpec::Pair(a, b, first)),
        any::<usize>().prop_map(NodeSpec::Call),
    ]
}

/// Parameter count, vector lengths per parameter, and the node list.
#[allow(dead_code)]
pub fn dag_spec() -> impl Strategy<Value = (Vec<u64>, Vec<NodeSpec>)> {
    (
        prop::collection::vec(1u64..16, 1..4),
        prop::collection::vec(node_spec(), 1..24),
    )
}

/// Builds a module from generated parameters and nodes: helper computations
/// negating a vector, and an entry computation whose root is the last node.
#[allow(dead_code)]
pub fn build_dag(params: &[u64], nodes: &[NodeSpec]) -> Module {
    let mut module = Module::new("generated");
    let mut helpers = std::collections::HashMap::new();
    for &len in params {
        if helpers.contains_key(&len) {
            continue;
        }
        let shape = Shape::array(PrimitiveType::F32, &[len]);
        let helper = module.add_computation(format!("negate_{len}"));
        {
            let mut b = module.builder(helper);
            let p = b.parameter(0, shape, "p").unwrap();
            b.unary(UnaryOp::Negate, p, "neg").unwrap();
        }
        helpers.insert(len, helper);
    }

    let main = module.add_computation("main");
    {
        let mut b = module.builder(main);
        let mut values: Vec<(Handle<Instruction>, u64)> = Vec::new();
        for (i, &len) in params.iter().enumerate() {
            let shape = Shape::array(PrimitiveType::F32, &[len]);
            values.push((b.parameter(i, shape, format!("p{i}")).unwrap(), len));
        }
        for (i, node) in nodes.iter().enumerate() {
            let pick = |k: usize| values[k % values.len()];
            let value = match *node {
                NodeSpec::Unary(a) => {
                    let (a, len) = pick(a);
                    (b.unary(UnaryOp::Exp, a, format!("n{i}")).unwrap(), len)
                }
                NodeSpec::Binary(x, y) => {
                    let (x, len) = pick(x);
                    // Binary ops need equal shapes; fall back to x itself.
                    let (y, y_len) = pick(y);
                    let y = if y_len == len { y } else { x };
                    (b.binary(BinaryOp::Add, x, y, format!("n{i}")).unwrap(), len)
                }
                NodeSpec::Copy(a) => {
                    let (a, len) = pick(a);
                    (b.copy(a, format!("n{i}")).unwrap(), len)
                }
                NodeSpec::Pair(x, y, first) => {
                    let (x, x_len) = pick(x);
                    let (y, y_len) = pick(y);
                    let t = b.tuple(vec![x, y], format!("t{i}")).unwrap();
                    let (index, len) = if first { (0, x_len) } else { (1, y_len) };
                    (
                        b.get_tuple_element(t, index, format!("n{i}")).unwrap(),
                        len,
                    )
                }
                NodeSpec::Call(a) => {
                    let (a, len) = pick(a);
                    let shape = Shape::array(PrimitiveType::F32, &[len]);
                    (
                        b.call(shape, helpers[&len], vec![a], format!("n{i}"))
                            .unwrap(),
                        len,
                    )
                }
            };
            values.push(value);
        }
    }
    module.set_entry(main).unwrap();
    module
}
