/// Tests for jumps, loops and the stack and collection instructions they are usually combined
/// with.
use std::rc::Rc;

use byterun::{CodeBuilder, CompareOp, Engine, Fault, FaultKind, NoLimitTracker, NoPrint, Opcode, Value};

fn run_counted(b: CodeBuilder) -> (Result<Value, Fault>, u64) {
    let mut engine = Engine::with_tracker(NoLimitTracker, NoPrint);
    let result = engine.run(Rc::new(b.build().unwrap()), None);
    (result, engine.step_count())
}

fn run(b: CodeBuilder) -> Result<Value, Fault> {
    run_counted(b).0
}

fn ints(values: &[i64]) -> Value {
    Value::tuple(values.iter().copied().map(Value::Int).collect())
}

#[test]
fn for_loop_over_three_items() {
    let mut b = CodeBuilder::new("<module>");
    let top = b.new_label();
    let end = b.new_label();
    b.load_const(Value::Int(0))
        .emit_name(Opcode::StoreName, "total")
        .load_const(ints(&[1, 2, 3]))
        .emit(Opcode::GetIter)
        .bind(top)
        .emit_jump(Opcode::ForIter, end)
        .emit_name(Opcode::StoreName, "x")
        .emit_name(Opcode::LoadName, "total")
        .emit_name(Opcode::LoadName, "x")
        .emit(Opcode::InplaceAdd)
        .emit_name(Opcode::StoreName, "total")
        .emit_jump(Opcode::JumpAbsolute, top)
        .bind(end)
        .emit_name(Opcode::LoadName, "total")
        .emit(Opcode::ReturnValue);

    let (result, steps) = run_counted(b);
    assert!(matches!(result, Ok(Value::Int(6))));
    // prelude 4, three iterations of 7, the exhausting FOR_ITER, then load and return
    assert_eq!(steps, 4 + 3 * 7 + 1 + 2);
}

#[test]
fn exhausted_iterator_is_popped() {
    let mut b = CodeBuilder::new("<module>");
    let end = b.new_label();
    b.load_const(ints(&[]))
        .emit(Opcode::GetIter)
        .emit_jump(Opcode::ForIter, end)
        .bind(end)
        .emit(Opcode::PopTop);
    let fault = run(b).unwrap_err();
    assert_eq!(fault.kind(), FaultKind::StackUnderflow);
}

#[test]
fn for_iter_converts_an_iterable_in_place() {
    // no GET_ITER: FOR_ITER wraps the range itself
    let mut b = CodeBuilder::new("<module>");
    let top = b.new_label();
    let end = b.new_label();
    b.emit_arg(Opcode::BuildList, 0)
        .emit_name(Opcode::StoreName, "out")
        .emit_name(Opcode::LoadName, "range")
        .load_const(Value::Int(3))
        .emit_arg(Opcode::CallFunction, 1)
        .bind(top)
        .emit_jump(Opcode::ForIter, end)
        .emit_name(Opcode::LoadName, "out")
        .emit(Opcode::RotTwo)
        .emit_name(Opcode::LoadMethod, "append")
        .emit(Opcode::RotTwo)
        .emit_arg(Opcode::CallMethod, 1)
        .emit(Opcode::PopTop)
        .emit_jump(Opcode::JumpAbsolute, top)
        .bind(end)
        .emit_name(Opcode::LoadName, "out")
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_repr(), "[0, 1, 2]");
}

#[test]
fn iterating_a_non_iterable() {
    let mut b = CodeBuilder::new("<module>");
    b.load_const(Value::Int(3)).emit(Opcode::GetIter);
    let fault = run(b).unwrap_err();
    assert_eq!(fault.kind(), FaultKind::OperatorError);
    assert_eq!(fault.summary(), "TypeError: 'int' object is not iterable");
}

#[test]
fn short_circuit_jumps() {
    // `0 or "b"`, `5 or "b"`, `0 and "b"`, `5 and "b"`
    let mut b = CodeBuilder::new("<module>");
    for (first, op) in [
        (0, Opcode::JumpIfTrueOrPop),
        (5, Opcode::JumpIfTrueOrPop),
        (0, Opcode::JumpIfFalseOrPop),
        (5, Opcode::JumpIfFalseOrPop),
    ] {
        let end = b.new_label();
        b.load_const(Value::Int(first))
            .emit_jump(op, end)
            .load_const(Value::str("b"))
            .bind(end);
    }
    b.emit_arg(Opcode::BuildTuple, 4).emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_repr(), "('b', 5, 0, 'b')");
}

#[test]
fn if_else_with_pop_jumps() {
    let mut b = CodeBuilder::new("<module>");
    let otherwise = b.new_label();
    let end = b.new_label();
    b.load_const(Value::Int(2))
        .load_const(Value::Int(3))
        .emit_arg(Opcode::CompareOp, CompareOp::Gt as u16)
        .emit_jump(Opcode::PopJumpIfFalse, otherwise)
        .load_const(Value::str("bigger"))
        .emit_jump(Opcode::JumpForward, end)
        .bind(otherwise)
        .load_const(Value::str("smaller"))
        .bind(end)
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_str(), "smaller");

    let mut b = CodeBuilder::new("<module>");
    let skip = b.new_label();
    b.load_const(Value::list(vec![Value::Int(1)]))
        .emit_jump(Opcode::PopJumpIfTrue, skip)
        .load_const(Value::str("empty"))
        .emit(Opcode::ReturnValue)
        .bind(skip)
        .load_const(Value::str("full"))
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_str(), "full");
}

#[test]
fn running_off_the_end_returns_none() {
    let mut b = CodeBuilder::new("<module>");
    let end = b.new_label();
    b.emit_jump(Opcode::JumpAbsolute, end).emit(Opcode::Nop).bind(end);
    let (result, steps) = run_counted(b);
    assert!(matches!(result, Ok(Value::None)));
    assert_eq!(steps, 1);
}

#[test]
fn stack_shuffles() {
    let mut b = CodeBuilder::new("<module>");
    b.load_const(Value::Int(1))
        .load_const(Value::Int(2))
        .load_const(Value::Int(3))
        .emit(Opcode::RotThree)
        .emit(Opcode::DupTopTwo)
        .emit(Opcode::RotTwo)
        .emit_arg(Opcode::BuildTuple, 5)
        .emit(Opcode::ReturnValue);
    // [1, 2, 3] -> [3, 1, 2] -> [3, 1, 2, 1, 2] -> [3, 1, 2, 2, 1]
    assert_eq!(run(b).unwrap().py_repr(), "(3, 1, 2, 2, 1)");
}

#[test]
fn collection_builders() {
    let mut b = CodeBuilder::new("<module>");
    b.load_const(Value::Int(1))
        .load_const(Value::Int(2))
        .load_const(Value::Int(1))
        .emit_arg(Opcode::BuildSet, 3)
        .load_const(Value::str("a"))
        .load_const(Value::Int(1))
        .load_const(Value::str("b"))
        .load_const(Value::Int(2))
        .emit_arg(Opcode::BuildMap, 2)
        .load_const(Value::Int(3))
        .load_const(Value::str("c"))
        .emit(Opcode::StoreMap)
        .emit_arg(Opcode::BuildTuple, 2)
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_repr(), "({1, 2}, {'a': 1, 'b': 2, 'c': 3})");
}

#[test]
fn list_append_builds_a_comprehension() {
    // [x * x for x in (1, 2, 3)]
    let mut b = CodeBuilder::new("<module>");
    let top = b.new_label();
    let end = b.new_label();
    b.emit_arg(Opcode::BuildList, 0)
        .load_const(ints(&[1, 2, 3]))
        .emit(Opcode::GetIter)
        .bind(top)
        .emit_jump(Opcode::ForIter, end)
        .emit(Opcode::DupTop)
        .emit(Opcode::BinaryMultiply)
        .emit_arg(Opcode::ListAppend, 2)
        .emit_jump(Opcode::JumpAbsolute, top)
        .bind(end)
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_repr(), "[1, 4, 9]");
}

#[test]
fn unpack_sequence() {
    let mut b = CodeBuilder::new("<module>");
    b.load_const(ints(&[1, 2]))
        .emit_arg(Opcode::UnpackSequence, 2)
        .emit_name(Opcode::StoreName, "a")
        .emit_name(Opcode::StoreName, "b")
        .emit_name(Opcode::LoadName, "b")
        .emit_name(Opcode::LoadName, "a")
        .emit_arg(Opcode::BuildTuple, 2)
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_repr(), "(2, 1)");

    let mut b = CodeBuilder::new("<module>");
    b.load_const(ints(&[1, 2, 3])).emit_arg(Opcode::UnpackSequence, 2);
    let fault = run(b).unwrap_err();
    assert_eq!(fault.kind(), FaultKind::OperatorError);
    assert_eq!(fault.summary(), "ValueError: too many values to unpack (expected 2)");

    let mut b = CodeBuilder::new("<module>");
    b.load_const(Value::str("a")).emit_arg(Opcode::UnpackSequence, 2);
    let fault = run(b).unwrap_err();
    assert_eq!(
        fault.summary(),
        "ValueError: not enough values to unpack (expected 2, got 1)"
    );
}

#[test]
fn subscripts() {
    let mut b = CodeBuilder::new("<module>");
    b.load_const(ints(&[10, 20, 30]))
        .emit_arg(Opcode::BuildList, 0)
        .emit(Opcode::DupTop)
        .emit_name(Opcode::StoreName, "xs")
        .emit_name(Opcode::LoadMethod, "extend")
        .emit(Opcode::RotTwo)
        .emit_arg(Opcode::CallMethod, 1)
        .emit(Opcode::PopTop)
        // xs[0] = 99
        .load_const(Value::Int(99))
        .emit_name(Opcode::LoadName, "xs")
        .load_const(Value::Int(0))
        .emit(Opcode::StoreSubscr)
        // del xs[1]
        .emit_name(Opcode::LoadName, "xs")
        .load_const(Value::Int(1))
        .emit(Opcode::DeleteSubscr)
        // xs[-1]
        .emit_name(Opcode::LoadName, "xs")
        .load_const(Value::Int(-1))
        .emit(Opcode::BinarySubscr)
        .emit_name(Opcode::LoadName, "xs")
        .emit_arg(Opcode::BuildTuple, 2)
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_repr(), "(30, [99, 30])");

    let mut b = CodeBuilder::new("<module>");
    b.emit_arg(Opcode::BuildMap, 0)
        .load_const(Value::str("missing"))
        .emit(Opcode::BinarySubscr);
    let fault = run(b).unwrap_err();
    assert_eq!(fault.summary(), "KeyError: 'missing'");
}

#[test]
fn assignment_aliases() {
    let mut b = CodeBuilder::new("<module>");
    b.emit_arg(Opcode::BuildList, 0)
        .emit_name(Opcode::StoreName, "a")
        .emit_name(Opcode::LoadName, "a")
        .emit_name(Opcode::StoreName, "b")
        .emit_name(Opcode::LoadName, "b")
        .emit_name(Opcode::LoadMethod, "append")
        .load_const(Value::Int(1))
        .emit_arg(Opcode::CallMethod, 1)
        .emit(Opcode::PopTop)
        .emit_name(Opcode::LoadName, "a")
        .emit_name(Opcode::LoadName, "a")
        .emit_name(Opcode::LoadName, "b")
        .emit_arg(Opcode::CompareOp, CompareOp::Is as u16)
        .emit_arg(Opcode::BuildTuple, 2)
        .emit(Opcode::ReturnValue);
    assert_eq!(run(b).unwrap().py_repr(), "([1], True)");
}

#[test]
fn comparisons() {
    let cases = [
        (CompareOp::Lt, Value::Int(1), Value::Float(1.5), "True"),
        (CompareOp::Eq, Value::Int(1), Value::Float(1.0), "True"),
        (CompareOp::In, Value::Int(2), ints(&[1, 2]), "True"),
        (CompareOp::NotIn, Value::str("z"), Value::str("abc"), "True"),
        (CompareOp::Ge, Value::str("a"), Value::str("b"), "False"),
    ];
    for (op, lhs, rhs, expected) in cases {
        let mut b = CodeBuilder::new("<module>");
        b.load_const(lhs)
            .load_const(rhs)
            .emit_arg(Opcode::CompareOp, op as u16)
            .emit(Opcode::ReturnValue);
        assert_eq!(run(b).unwrap().py_repr(), expected, "{op:?}");
    }

    let mut b = CodeBuilder::new("<module>");
    b.load_const(Value::Int(1))
        .load_const(Value::str("a"))
        .emit_arg(Opcode::CompareOp, CompareOp::Lt as u16);
    let fault = run(b).unwrap_err();
    assert_eq!(
        fault.summary(),
        "TypeError: '<' not supported between instances of 'int' and 'str'"
    );
}
