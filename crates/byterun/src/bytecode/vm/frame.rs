//! Activation records.

use std::rc::Rc;

use crate::{
    builtins::BuiltinLookup,
    bytecode::Code,
    cell::Cell,
    exception_private::{RunError, RunResult},
    function::Function,
    namespace::{local_key, Namespace, Scope},
    value::Value,
};

/// One level of the call stack.
///
/// The caller link is implicit: it is the frame below this one in the engine's frame vector.
pub(crate) struct Frame {
    /// Code being executed.
    pub code: Rc<Code>,
    /// Name reported in tracebacks: the function's display name, or the code name at module level.
    pub name: Rc<str>,
    pub globals: Scope,
    /// At module level this is the same scope as `globals`.
    pub locals: Scope,
    pub builtins: Rc<dyn BuiltinLookup>,
    /// Cell bindings indexed by the deref operand: cellvars first, then freevars.
    pub cells: Vec<Cell>,
    /// Offset of the next instruction.
    pub ip: usize,
    /// Offset of the instruction being executed, for tracebacks.
    pub instruction_ip: usize,
    /// Start of this frame's region of the shared operand stack.
    pub stack_base: usize,
}

impl Frame {
    /// Frame for module-level code: locals are the globals.
    pub fn module(code: Rc<Code>, globals: Scope, builtins: Rc<dyn BuiltinLookup>, stack_base: usize) -> RunResult<Self> {
        if !code.freevars().is_empty() {
            return Err(RunError::invalid_code(format!(
                "module code {} cannot have free variables",
                code.name()
            )));
        }
        let cells = code.cellvars().iter().map(|_| Cell::empty()).collect();
        Ok(Self {
            name: code.name_rc().clone(),
            locals: globals.clone(),
            globals,
            builtins,
            cells,
            code,
            ip: 0,
            instruction_ip: 0,
            stack_base,
        })
    }

    /// Frame for a call of `func` with already bound parameters.
    ///
    /// A parameter that is also a cell variable lives only in its cell, initialised with the
    /// argument.
    pub fn function(
        func: &Function,
        bound: Vec<(Rc<str>, Value)>,
        builtins: Rc<dyn BuiltinLookup>,
        stack_base: usize,
    ) -> Self {
        let code = Rc::clone(func.code());
        let mut cells: Vec<Cell> = code.cellvars().iter().map(|_| Cell::empty()).collect();
        let mut locals = Namespace::new();
        for (name, value) in bound {
            match code.cellvars().iter().position(|cell| *cell == name) {
                Some(index) => cells[index].set(value),
                None => locals.set(local_key(&name), value),
            }
        }
        cells.extend(func.closure().iter().map(|(_, cell)| cell.clone()));
        Self {
            name: func.name_rc().clone(),
            globals: func.globals().clone(),
            locals: locals.into_scope(),
            builtins,
            cells,
            code,
            ip: 0,
            instruction_ip: 0,
            stack_base,
        }
    }

    pub fn is_module(&self) -> bool {
        Rc::ptr_eq(&self.locals, &self.globals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builtins::Builtins,
        bytecode::{CodeBuilder, Opcode},
    };

    #[test]
    fn cell_parameters_skip_locals() {
        let mut b = CodeBuilder::new("outer").params(&["x", "y"]).cellvars(&["x"]);
        b.emit(Opcode::Nop);
        let code = Rc::new(b.build().unwrap());
        let func = Function::new(code, "outer", Namespace::new().into_scope()).unwrap();
        let bound = vec![("x".into(), Value::Int(1)), ("y".into(), Value::Int(2))];
        let frame = Frame::function(&func, bound, Rc::new(Builtins::empty()), 0);
        assert!(matches!(frame.cells[0].get(), Some(Value::Int(1))));
        assert!(!frame.locals.borrow().contains("x"));
        assert!(frame.locals.borrow().contains("y"));
        assert!(!frame.is_module());
    }

    #[test]
    fn module_frame_shares_globals() {
        let code = Rc::new(CodeBuilder::new("<module>").build().unwrap());
        let globals = Namespace::new().into_scope();
        let frame = Frame::module(code, globals, Rc::new(Builtins::empty()), 0).unwrap();
        assert!(frame.is_module());
        assert_eq!(&*frame.name, "<module>");
    }
}
