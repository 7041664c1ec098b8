//! User-defined functions created by `MAKE_FUNCTION`.

use std::{fmt, rc::Rc};

use crate::{
    bytecode::Code,
    cell::Cell,
    exception_private::{RunError, RunResult},
    exception_public::Fault,
    io::PrintWriter,
    namespace::Scope,
    resource::ResourceTracker,
    run::Engine,
    value::Value,
};

/// A callable pairing a code object with the state captured when it was defined.
///
/// Defaults are snapshotted at definition time. Free variables map to the cells supplied by the
/// defining frame, in the order of the code's `freevars`; those cells are shared, so writes made
/// by the defining frame after the function was created are visible inside it.
pub struct Function {
    code: Rc<Code>,
    name: Rc<str>,
    defaults: Vec<Value>,
    kw_defaults: Vec<(Rc<str>, Value)>,
    closure: Vec<(Rc<str>, Cell)>,
    globals: Scope,
}

impl Function {
    /// Creates a function without defaults or closure.
    ///
    /// Fails if the code has free variables; use [`Function::with_closure`] for those.
    pub fn new(code: Rc<Code>, name: impl Into<Rc<str>>, globals: Scope) -> RunResult<Self> {
        Self::with_closure(code, name, globals, Vec::new())
    }

    /// Creates a function whose free variables are bound to `cells`, positionally.
    pub fn with_closure(code: Rc<Code>, name: impl Into<Rc<str>>, globals: Scope, cells: Vec<Cell>) -> RunResult<Self> {
        let freevars = code.freevars();
        if cells.len() != freevars.len() {
            return Err(RunError::invalid_code(format!(
                "code object {} has {} free variables but {} cells were supplied",
                code.name(),
                freevars.len(),
                cells.len()
            )));
        }
        let closure = freevars.iter().cloned().zip(cells).collect();
        Ok(Self {
            name: name.into(),
            closure,
            code,
            defaults: Vec::new(),
            kw_defaults: Vec::new(),
            globals,
        })
    }

    /// Sets the positional defaults, right-aligned against the positional parameters.
    #[must_use]
    pub fn with_defaults(mut self, defaults: Vec<Value>) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sets the keyword-only defaults.
    #[must_use]
    pub fn with_kw_defaults(mut self, kw_defaults: Vec<(Rc<str>, Value)>) -> Self {
        self.kw_defaults = kw_defaults;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> &Rc<str> {
        &self.name
    }

    #[must_use]
    pub fn code(&self) -> &Rc<Code> {
        &self.code
    }

    #[must_use]
    pub fn defaults(&self) -> &[Value] {
        &self.defaults
    }

    #[must_use]
    pub fn kw_defaults(&self) -> &[(Rc<str>, Value)] {
        &self.kw_defaults
    }

    /// Free-variable name → captured cell, in declaration order.
    #[must_use]
    pub fn closure(&self) -> &[(Rc<str>, Cell)] {
        &self.closure
    }

    /// The globals of the module that defined the function.
    #[must_use]
    pub fn globals(&self) -> &Scope {
        &self.globals
    }

    /// `__defaults__`: a tuple, or `None` without defaults.
    pub(crate) fn defaults_value(&self) -> Value {
        if self.defaults.is_empty() {
            Value::None
        } else {
            Value::tuple(self.defaults.clone())
        }
    }

    /// Calls the function on `engine`; shorthand for [`Engine::invoke`].
    pub fn invoke<T: ResourceTracker, P: PrintWriter>(
        self: &Rc<Self>,
        engine: &mut Engine<T, P>,
        args: Vec<Value>,
        kwargs: Vec<(Rc<str>, Value)>,
    ) -> Result<Value, Fault> {
        engine.invoke(&Value::Function(Rc::clone(self)), args, kwargs)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // globals may contain the function itself
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("code", &self.code.name())
            .field("defaults", &self.defaults)
            .field("kw_defaults", &self.kw_defaults)
            .field("closure", &self.closure)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bytecode::{CodeBuilder, Opcode},
        exception_public::FaultKind,
        namespace::Namespace,
    };

    fn closure_code() -> Rc<Code> {
        let mut b = CodeBuilder::new("inner").freevars(&["x"]);
        b.emit_deref(Opcode::LoadDeref, "x").emit(Opcode::ReturnValue);
        Rc::new(b.build().unwrap())
    }

    #[test]
    fn closure_cell_count_must_match_freevars() {
        let globals = Namespace::new().into_scope();
        let err = Function::new(closure_code(), "inner", globals.clone()).unwrap_err();
        assert_eq!(err.kind(), FaultKind::InvalidCode);

        let cell = Cell::new(Value::Int(1));
        let func = Function::with_closure(closure_code(), "inner", globals, vec![cell.clone()]).unwrap();
        assert_eq!(&*func.closure()[0].0, "x");
        assert!(func.closure()[0].1.ptr_eq(&cell));
    }

    #[test]
    fn defaults_value() {
        let code = Rc::new(CodeBuilder::new("f").params(&["a"]).build().unwrap());
        let func = Function::new(code, "f", Namespace::new().into_scope()).unwrap();
        assert!(matches!(func.defaults_value(), Value::None));
        let func = func.with_defaults(vec![Value::Int(1)]);
        assert_eq!(func.defaults_value().py_repr(), "(1,)");
    }
}
