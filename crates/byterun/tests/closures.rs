/// Tests for cells and closures: sharing between a function and the closures it creates,
/// isolation through default snapshots, and unbound cells.
use std::rc::Rc;

use byterun::{
    Code, CodeBuilder, Engine, Fault, FaultKind, Function, MakeFunctionFlags, Namespace, NoLimitTracker, NoPrint,
    Opcode, Value,
};

fn engine() -> Engine<NoLimitTracker, NoPrint> {
    Engine::with_tracker(NoLimitTracker, NoPrint)
}

fn code(b: CodeBuilder) -> Value {
    Value::Code(Rc::new(b.build().unwrap()))
}

/// Emits `<callee>()` for a local function and leaves the result on the stack.
fn call_local(b: &mut CodeBuilder, name: &str) {
    b.emit_local(Opcode::LoadFast, name).emit_arg(Opcode::CallFunction, 0);
}

/// Module that defines `outer` from `outer_code` and returns `outer()`.
fn run_outer(outer_code: Code) -> Result<Value, Fault> {
    let mut b = CodeBuilder::new("<module>");
    b.load_const(Value::Code(Rc::new(outer_code)))
        .load_const(Value::str("outer"))
        .emit_arg(Opcode::MakeFunction, 0)
        .emit_arg(Opcode::CallFunction, 0)
        .emit(Opcode::ReturnValue);
    engine().run(Rc::new(b.build().unwrap()), None)
}

fn reader(name: &str) -> CodeBuilder {
    let mut inner = CodeBuilder::new(name).freevars(&["x"]);
    inner.emit_deref(Opcode::LoadDeref, "x").emit(Opcode::ReturnValue);
    inner
}

#[test]
fn closure_sees_later_writes_to_the_cell() {
    let mut outer = CodeBuilder::new("outer").cellvars(&["x"]);
    outer
        .load_const(Value::Int(0))
        .emit_deref(Opcode::StoreDeref, "x")
        .emit_deref(Opcode::LoadClosure, "x")
        .emit_arg(Opcode::BuildTuple, 1)
        .load_const(code(reader("inner")))
        .load_const(Value::str("outer.<locals>.inner"))
        .emit_arg(Opcode::MakeFunction, MakeFunctionFlags::CLOSURE)
        .emit_local(Opcode::StoreFast, "inner");
    call_local(&mut outer, "inner");
    outer.load_const(Value::Int(1)).emit_deref(Opcode::StoreDeref, "x");
    call_local(&mut outer, "inner");
    outer.emit_arg(Opcode::BuildTuple, 2).emit(Opcode::ReturnValue);

    let result = run_outer(outer.build().unwrap()).unwrap();
    assert_eq!(result.py_repr(), "(0, 1)");
}

#[test]
fn defaults_snapshot_the_value() {
    let mut inner = CodeBuilder::new("inner").params(&["x"]);
    inner.emit_local(Opcode::LoadFast, "x").emit(Opcode::ReturnValue);

    let mut outer = CodeBuilder::new("outer");
    outer
        .load_const(Value::Int(0))
        .emit_local(Opcode::StoreFast, "x")
        .emit_local(Opcode::LoadFast, "x")
        .emit_arg(Opcode::BuildTuple, 1)
        .load_const(code(inner))
        .load_const(Value::str("outer.<locals>.inner"))
        .emit_arg(Opcode::MakeFunction, MakeFunctionFlags::DEFAULTS)
        .emit_local(Opcode::StoreFast, "inner");
    call_local(&mut outer, "inner");
    outer.load_const(Value::Int(1)).emit_local(Opcode::StoreFast, "x");
    call_local(&mut outer, "inner");
    outer.emit_arg(Opcode::BuildTuple, 2).emit(Opcode::ReturnValue);

    let result = run_outer(outer.build().unwrap()).unwrap();
    assert_eq!(result.py_repr(), "(0, 0)");
}

/// `make_counter` returns a closure incrementing a shared `count` cell.
fn counter_module() -> CodeBuilder {
    let mut incr = CodeBuilder::new("incr").freevars(&["count"]);
    incr.emit_deref(Opcode::LoadDeref, "count")
        .load_const(Value::Int(1))
        .emit(Opcode::InplaceAdd)
        .emit(Opcode::DupTop)
        .emit_deref(Opcode::StoreDeref, "count")
        .emit(Opcode::ReturnValue);

    let mut make = CodeBuilder::new("make_counter").cellvars(&["count"]);
    make.load_const(Value::Int(0))
        .emit_deref(Opcode::StoreDeref, "count")
        .emit_deref(Opcode::LoadClosure, "count")
        .emit_arg(Opcode::BuildTuple, 1)
        .load_const(code(incr))
        .load_const(Value::str("make_counter.<locals>.incr"))
        .emit_arg(Opcode::MakeFunction, MakeFunctionFlags::CLOSURE)
        .emit(Opcode::ReturnValue);

    let mut b = CodeBuilder::new("<module>");
    b.load_const(code(make))
        .load_const(Value::str("make_counter"))
        .emit_arg(Opcode::MakeFunction, 0)
        .emit_name(Opcode::StoreName, "make_counter");
    b
}

#[test]
fn each_call_gets_fresh_cells() {
    let globals = Namespace::new().into_scope();
    let mut engine = engine();
    engine
        .run(Rc::new(counter_module().build().unwrap()), Some(globals.clone()))
        .unwrap();
    let make = globals.borrow().get("make_counter").cloned().unwrap();

    let a = engine.invoke(&make, vec![], vec![]).unwrap();
    let b = engine.invoke(&make, vec![], vec![]).unwrap();
    let mut calls = Vec::new();
    for counter in [&a, &a, &b, &a] {
        calls.push(engine.invoke(counter, vec![], vec![]).unwrap().py_repr());
    }
    assert_eq!(calls, ["1", "2", "1", "3"]);
    assert_eq!(engine.depth(), 0);
}

#[test]
fn cell_parameter_initialised_from_argument() {
    let mut outer = CodeBuilder::new("outer").params(&["x"]).cellvars(&["x"]);
    outer
        .emit_deref(Opcode::LoadClosure, "x")
        .emit_arg(Opcode::BuildTuple, 1)
        .load_const(code(reader("inner")))
        .load_const(Value::str("outer.<locals>.inner"))
        .emit_arg(Opcode::MakeFunction, MakeFunctionFlags::CLOSURE)
        .emit_arg(Opcode::CallFunction, 0)
        .emit(Opcode::ReturnValue);

    let outer = Function::new(Rc::new(outer.build().unwrap()), "outer", Namespace::new().into_scope()).unwrap();
    let result = Rc::new(outer).invoke(&mut engine(), vec![Value::Int(5)], vec![]).unwrap();
    assert!(matches!(result, Value::Int(5)));
}

#[test]
fn unbound_free_variable() {
    let mut outer = CodeBuilder::new("outer").cellvars(&["x"]);
    outer
        .emit_deref(Opcode::LoadClosure, "x")
        .emit_arg(Opcode::BuildTuple, 1)
        .load_const(code(reader("inner")))
        .load_const(Value::str("outer.<locals>.inner"))
        .emit_arg(Opcode::MakeFunction, MakeFunctionFlags::CLOSURE)
        .emit_arg(Opcode::CallFunction, 0)
        .emit(Opcode::ReturnValue);

    let fault = run_outer(outer.build().unwrap()).unwrap_err();
    assert_eq!(fault.kind(), FaultKind::UndefinedName);
    assert_eq!(
        fault.message(),
        Some("free variable 'x' referenced before assignment in enclosing scope")
    );
    assert_eq!(fault.frame_names(), ["outer.<locals>.inner", "outer", "<module>"]);
}

#[test]
fn deleted_cell_is_unbound() {
    let mut outer = CodeBuilder::new("outer").cellvars(&["x"]);
    outer
        .load_const(Value::Int(1))
        .emit_deref(Opcode::StoreDeref, "x")
        .emit_deref(Opcode::DeleteDeref, "x")
        .emit_deref(Opcode::LoadDeref, "x")
        .emit(Opcode::ReturnValue);
    let fault = run_outer(outer.build().unwrap()).unwrap_err();
    assert_eq!(fault.kind(), FaultKind::UnboundLocal);
    assert_eq!(fault.message(), Some("local variable 'x' referenced before assignment"));
}

#[test]
fn closure_count_must_match_freevars() {
    let mut outer = CodeBuilder::new("outer");
    outer
        .emit_arg(Opcode::BuildTuple, 0)
        .load_const(code(reader("inner")))
        .load_const(Value::str("inner"))
        .emit_arg(Opcode::MakeFunction, MakeFunctionFlags::CLOSURE)
        .emit(Opcode::ReturnValue);
    let fault = run_outer(outer.build().unwrap()).unwrap_err();
    assert_eq!(fault.kind(), FaultKind::InvalidCode);
    assert!(fault.kind().is_defect());
}

#[test]
fn functions_keep_their_defining_globals() {
    let mut get = CodeBuilder::new("get");
    get.emit_name(Opcode::LoadGlobal, "setting").emit(Opcode::ReturnValue);
    let mut defining = Namespace::new();
    defining.set("setting", Value::str("theirs"));
    let func = Value::Function(Rc::new(
        Function::new(Rc::new(get.build().unwrap()), "get", defining.into_scope()).unwrap(),
    ));

    // called from a module whose own `setting` differs
    let mut b = CodeBuilder::new("<module>");
    b.load_const(Value::str("ours"))
        .emit_name(Opcode::StoreName, "setting")
        .load_const(func)
        .emit_arg(Opcode::CallFunction, 0)
        .emit(Opcode::ReturnValue);
    let result = engine().run(Rc::new(b.build().unwrap()), None).unwrap();
    assert_eq!(result.py_str(), "theirs");
}
