//! Public interface for running bytecode.
use std::rc::Rc;

use log::debug;

use crate::{
    args::ArgValues,
    builtins::{BuiltinLookup, Builtins, BuiltinsModule},
    bytecode::{vm::Vm, Code},
    exception_public::Fault,
    io::{PrintWriter, StdPrint},
    namespace::{Namespace, Scope},
    resource::{NoLimitTracker, ResourceTracker},
    value::Value,
};

/// Primary interface for executing code objects.
///
/// An engine owns the call stack, the resource tracker, the print writer and the builtin
/// namespace. Each [`Engine::run`] or [`Engine::invoke`] drives the dispatch loop until the entry
/// frame returns or a fault has unwound it; the engine is then idle again and can be reused.
///
/// # Example
/// ```
/// use std::rc::Rc;
/// use byterun::{CodeBuilder, Engine, Opcode, Value};
///
/// let mut b = CodeBuilder::new("<module>");
/// b.load_const(Value::Int(40)).load_const(Value::Int(2)).emit(Opcode::BinaryAdd).emit(Opcode::ReturnValue);
/// let code = Rc::new(b.build().unwrap());
///
/// let mut engine = Engine::new();
/// let result = engine.run(code, None).unwrap();
/// assert!(matches!(result, Value::Int(42)));
/// ```
pub struct Engine<T: ResourceTracker = NoLimitTracker, P: PrintWriter = StdPrint> {
    vm: Vm<T, P>,
    last_fault: Option<Fault>,
    return_value: Option<Value>,
}

impl Engine {
    /// Engine with no limits beyond the default recursion depth, printing to stdout, with the
    /// standard builtins.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tracker(NoLimitTracker, StdPrint)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ResourceTracker, P: PrintWriter> Engine<T, P> {
    /// Engine with the given tracker and print writer, and the standard builtins.
    pub fn with_tracker(tracker: T, print: P) -> Self {
        Self {
            vm: Vm::new(tracker, print, Rc::new(Builtins::standard())),
            last_fault: None,
            return_value: None,
        }
    }

    /// Replaces the builtin namespace consulted by frames created from now on.
    #[must_use]
    pub fn with_builtins(mut self, builtins: impl BuiltinLookup + 'static) -> Self {
        self.vm.set_builtins(Rc::new(builtins));
        self
    }

    /// Fresh module globals: `__builtins__`, `__name__ = "__main__"`, `__doc__` and `__package__`.
    #[must_use]
    pub fn new_globals(&self) -> Scope {
        let mut globals = Namespace::new();
        globals.set("__builtins__", Value::host(BuiltinsModule(Rc::clone(self.vm.builtins()))));
        globals.set("__name__", Value::str("__main__"));
        globals.set("__doc__", Value::None);
        globals.set("__package__", Value::None);
        globals.into_scope()
    }

    /// Executes module-level code.
    ///
    /// Without `globals` a fresh scope from [`Engine::new_globals`] is used. The result is the
    /// value of the module's `RETURN_VALUE`, or `None` if the code runs off its end.
    ///
    /// # Errors
    /// Returns the [`Fault`] that unwound the module frame; it is also kept in
    /// [`Engine::last_fault`].
    pub fn run(&mut self, code: Rc<Code>, globals: Option<Scope>) -> Result<Value, Fault> {
        let globals = globals.unwrap_or_else(|| self.new_globals());
        debug!("run {} (depth {})", code.name(), self.vm.depth());
        let result = self.vm.run_module(code, globals);
        self.finish(result)
    }

    /// Calls `callable` with positional and keyword arguments and runs it to completion.
    ///
    /// # Errors
    /// Returns the [`Fault`] that unwound the call; it is also kept in [`Engine::last_fault`].
    pub fn invoke(
        &mut self,
        callable: &Value,
        args: Vec<Value>,
        kwargs: Vec<(Rc<str>, Value)>,
    ) -> Result<Value, Fault> {
        debug!("invoke {} (depth {})", callable.py_repr(), self.vm.depth());
        let result = self.vm.invoke(callable.clone(), ArgValues::new(args, kwargs));
        self.finish(result)
    }

    fn finish(&mut self, result: Result<Value, Fault>) -> Result<Value, Fault> {
        match &result {
            Ok(value) => {
                debug!("finished after {} steps", self.vm.steps());
                self.last_fault = None;
                self.return_value = Some(value.clone());
            }
            Err(fault) => {
                debug!("faulted after {} steps: {}", self.vm.steps(), fault.summary());
                self.last_fault = Some(fault.clone());
                self.return_value = None;
            }
        }
        result
    }

    /// Instructions decoded over the engine's lifetime.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.vm.steps()
    }

    /// The fault that ended the most recent run or invoke, if it faulted.
    #[must_use]
    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    /// The result of the most recent run or invoke, if it completed.
    #[must_use]
    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    /// Current call-stack depth; zero whenever the engine is idle.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.vm.depth()
    }

    #[must_use]
    pub fn print_writer(&self) -> &P {
        self.vm.print()
    }

    pub fn print_writer_mut(&mut self) -> &mut P {
        self.vm.print_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{CodeBuilder, Opcode},
        exception_public::FaultKind,
        io::CollectStringPrint,
    };

    fn engine() -> Engine<NoLimitTracker, CollectStringPrint> {
        Engine::with_tracker(NoLimitTracker, CollectStringPrint::new())
    }

    #[test]
    fn default_globals() {
        let mut b = CodeBuilder::new("<module>");
        b.emit_name(Opcode::LoadName, "__name__").emit(Opcode::ReturnValue);
        let mut engine = engine();
        let result = engine.run(Rc::new(b.build().unwrap()), None).unwrap();
        assert_eq!(result.py_str(), "__main__");
        assert_eq!(engine.return_value().map(Value::py_str).as_deref(), Some("__main__"));

        let globals = engine.new_globals();
        let builtins = globals.borrow().get("__builtins__").cloned().unwrap();
        assert_eq!(builtins.py_repr(), "<module 'builtins'>");
    }

    #[test]
    fn fault_is_recorded_and_cleared() {
        let mut b = CodeBuilder::new("<module>");
        b.emit_name(Opcode::LoadName, "missing");
        let failing = Rc::new(b.build().unwrap());
        let ok = Rc::new(CodeBuilder::new("<module>").build().unwrap());

        let mut engine = engine();
        let fault = engine.run(failing, None).unwrap_err();
        assert_eq!(fault.kind(), FaultKind::UndefinedName);
        assert_eq!(engine.last_fault(), Some(&fault));
        assert!(engine.return_value().is_none());
        assert_eq!(engine.depth(), 0);

        assert!(matches!(engine.run(ok, None), Ok(Value::None)));
        assert!(engine.last_fault().is_none());
    }

    #[test]
    fn custom_builtins() {
        let mut builtins = Builtins::empty();
        builtins.insert("answer", Value::Int(42));
        let mut b = CodeBuilder::new("<module>");
        b.emit_name(Opcode::LoadGlobal, "answer").emit(Opcode::ReturnValue);
        let mut engine = engine().with_builtins(builtins);
        assert!(matches!(engine.run(Rc::new(b.build().unwrap()), None), Ok(Value::Int(42))));
    }
}
