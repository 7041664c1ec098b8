/// Property tests: identical code, globals and builtins always produce the same result, output and
/// step count, whether the run completes or faults.
use std::rc::Rc;

use byterun::{CodeBuilder, CollectStringPrint, Engine, Fault, NoLimitTracker, Opcode, Value};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Push(i64),
    Binary(Opcode),
    Store(u8),
    Load(u8),
    Print,
    Dup,
    /// `for _ in range(n): print(n)`
    Loop(u8),
}

const NAMES: [&str; 3] = ["a", "b", "c"];

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (-50i64..50).prop_map(Step::Push),
        prop_oneof![
            Just(Opcode::BinaryAdd),
            Just(Opcode::BinarySubtract),
            Just(Opcode::BinaryMultiply),
            Just(Opcode::BinaryFloorDivide),
            Just(Opcode::BinaryTrueDivide),
            Just(Opcode::BinaryModulo),
            Just(Opcode::BinaryXor),
        ]
        .prop_map(Step::Binary),
        (0u8..3).prop_map(Step::Store),
        (0u8..3).prop_map(Step::Load),
        Just(Step::Print),
        Just(Step::Dup),
        (0u8..5).prop_map(Step::Loop),
    ]
}

fn assemble(steps: &[Step]) -> CodeBuilder {
    let mut b = CodeBuilder::new("<module>");
    for step in steps {
        match step {
            Step::Push(i) => {
                b.load_const(Value::Int(*i));
            }
            Step::Binary(op) => {
                b.emit(*op);
            }
            Step::Store(n) => {
                b.emit_name(Opcode::StoreName, NAMES[usize::from(*n)]);
            }
            Step::Load(n) => {
                b.emit_name(Opcode::LoadName, NAMES[usize::from(*n)]);
            }
            Step::Print => {
                b.emit(Opcode::PrintItem).emit(Opcode::PrintNewline);
            }
            Step::Dup => {
                b.emit(Opcode::DupTop);
            }
            Step::Loop(n) => {
                let top = b.new_label();
                let end = b.new_label();
                b.emit_name(Opcode::LoadName, "range")
                    .load_const(Value::Int(i64::from(*n)))
                    .emit_arg(Opcode::CallFunction, 1)
                    .emit(Opcode::GetIter)
                    .bind(top)
                    .emit_jump(Opcode::ForIter, end)
                    .emit(Opcode::PrintItem)
                    .emit(Opcode::PrintNewline)
                    .emit_jump(Opcode::JumpAbsolute, top)
                    .bind(end);
            }
        }
    }
    b.load_const(Value::None).emit(Opcode::ReturnValue);
    b
}

type Outcome = (Result<String, Fault>, String, u64);

fn execute(steps: &[Step]) -> Outcome {
    let code = Rc::new(assemble(steps).build().unwrap());
    let mut engine = Engine::with_tracker(NoLimitTracker, CollectStringPrint::new());
    let result = engine.run(code, None).map(|value| value.py_repr());
    let output = engine.print_writer().output().to_owned();
    (result, output, engine.step_count())
}

proptest! {
    #[test]
    fn runs_are_deterministic(steps in prop::collection::vec(step(), 0..40)) {
        let first = execute(&steps);
        let second = execute(&steps);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn engine_is_reusable_after_a_fault(steps in prop::collection::vec(step(), 0..40)) {
        let code = Rc::new(assemble(&steps).build().unwrap());
        let mut engine = Engine::with_tracker(NoLimitTracker, CollectStringPrint::new());
        let first = engine.run(Rc::clone(&code), None).map(|value| value.py_repr());
        let first_output = engine.print_writer_mut().take();
        prop_assert_eq!(engine.depth(), 0);
        let second = engine.run(code, None).map(|value| value.py_repr());
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_output, engine.print_writer().output());
    }
}
