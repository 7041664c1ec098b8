//! Function call helpers for the VM.

use std::rc::Rc;

use super::{Frame, Vm};
use crate::{
    args::ArgValues,
    bytecode::op::MakeFunctionFlags,
    cell::Cell,
    exception_private::{RunError, RunResult},
    function::Function,
    io::PrintWriter,
    resource::ResourceTracker,
    signature::Signature,
    types::{iter::collect_iterable, ExcInstance},
    value::Value,
};

/// Result of calling a value.
///
/// Native calls return a value immediately; user functions push a frame and continue in the VM
/// loop, where `RETURN_VALUE` delivers their result to the caller's stack.
pub(super) enum CallResult {
    /// Push this value onto the stack.
    Value(Value),
    /// A frame was pushed.
    FramePushed,
}

impl<T: ResourceTracker, P: PrintWriter> Vm<T, P> {
    /// Calls a callable value with the given arguments.
    pub(super) fn call_value(&mut self, callable: Value, args: ArgValues) -> RunResult<CallResult> {
        match callable {
            Value::Function(func) => {
                self.push_function_frame(&func, args)?;
                Ok(CallResult::FramePushed)
            }
            Value::Native(native) => native.call(&mut self.print, args).map(CallResult::Value),
            Value::BoundMethod(method) => method.call(args).map(CallResult::Value),
            Value::ExcClass(class) => {
                args.check_no_kwargs(class.name())?;
                let inst = ExcInstance::new(class, args.positional);
                Ok(CallResult::Value(Value::Exception(Rc::new(inst))))
            }
            Value::Host(object) => object.call(args).map(CallResult::Value),
            other => Err(RunError::not_callable(other.type_name())),
        }
    }

    /// Calls `callable`, pushing the result unless a frame took over.
    pub(super) fn call_and_push(&mut self, callable: Value, args: ArgValues) -> RunResult<()> {
        if let CallResult::Value(value) = self.call_value(callable, args)? {
            self.push(value);
        }
        Ok(())
    }

    /// Binds arguments and pushes a frame for a user function.
    fn push_function_frame(&mut self, func: &Rc<Function>, args: ArgValues) -> RunResult<()> {
        let bound = Signature::of(func.code()).bind(func.name(), args, func.defaults(), func.kw_defaults())?;
        let frame = Frame::function(func, bound, Rc::clone(&self.builtins), self.stack.len());
        self.push_frame(frame)
    }

    /// `CALL_FUNCTION_KW argc`: [callable, args..., kwvalues..., names] where `names` is a tuple
    /// naming the trailing `len(names)` values.
    pub(super) fn call_function_kw(&mut self, argc: usize) -> RunResult<()> {
        let names = match self.pop()? {
            Value::Tuple(names) => names,
            other => {
                return Err(RunError::invalid_code(format!(
                    "CALL_FUNCTION_KW names must be a tuple, not '{}'",
                    other.type_name()
                )))
            }
        };
        if names.len() > argc {
            return Err(RunError::invalid_code(format!(
                "CALL_FUNCTION_KW has {} names for {argc} arguments",
                names.len()
            )));
        }
        let mut positional = self.pop_n(argc)?;
        let values = positional.split_off(argc - names.len());
        let keywords = names
            .iter()
            .zip(values)
            .map(|(name, value)| match name {
                Value::Str(name) => Ok((Rc::clone(name), value)),
                other => Err(RunError::invalid_code(format!(
                    "keyword name must be a str, not '{}'",
                    other.type_name()
                ))),
            })
            .collect::<RunResult<Vec<_>>>()?;
        let callable = self.pop()?;
        self.call_and_push(callable, ArgValues::new(positional, keywords))
    }

    /// `CALL_FUNCTION_EX flags`: [callable, args, kwargs?]; bit 0 of `flags` says a kwargs dict is
    /// present.
    pub(super) fn call_function_ex(&mut self, flags: usize) -> RunResult<()> {
        let keywords = if flags & 0x01 != 0 {
            match self.pop()? {
                Value::Dict(dict) => dict.borrow().str_keyed_pairs("keywords")?,
                other => {
                    return Err(RunError::type_error(format!(
                        "argument after ** must be a mapping, not {}",
                        other.type_name()
                    )))
                }
            }
        } else {
            Vec::new()
        };
        let args = self.pop()?;
        let positional = collect_iterable(&args).map_err(|_| {
            RunError::type_error(format!(
                "argument after * must be an iterable, not {}",
                args.type_name()
            ))
        })?;
        let callable = self.pop()?;
        self.call_and_push(callable, ArgValues::new(positional, keywords))
    }

    /// `MAKE_FUNCTION flags`: pops the qualified name and the code, then the optional parts
    /// selected by `flags` in descending bit order.
    pub(super) fn make_function(&mut self, flags: usize) -> RunResult<()> {
        let name = match self.pop()? {
            Value::Str(name) => name,
            other => {
                return Err(RunError::invalid_code(format!(
                    "MAKE_FUNCTION name must be a str, not '{}'",
                    other.type_name()
                )))
            }
        };
        let code = match self.pop()? {
            Value::Code(code) => code,
            other => {
                return Err(RunError::invalid_code(format!(
                    "MAKE_FUNCTION expected a code object, not '{}'",
                    other.type_name()
                )))
            }
        };
        let has = |bit: u16| flags & usize::from(bit) != 0;

        let cells = if has(MakeFunctionFlags::CLOSURE) {
            self.pop_closure()?
        } else {
            Vec::new()
        };
        if has(MakeFunctionFlags::ANNOTATIONS) {
            self.pop()?;
        }
        let kw_defaults = if has(MakeFunctionFlags::KW_DEFAULTS) {
            match self.pop()? {
                Value::Dict(dict) => dict.borrow().str_keyed_pairs("keyword-only defaults")?,
                other => {
                    return Err(RunError::invalid_code(format!(
                        "keyword-only defaults must be a dict, not '{}'",
                        other.type_name()
                    )))
                }
            }
        } else {
            Vec::new()
        };
        let defaults = if has(MakeFunctionFlags::DEFAULTS) {
            match self.pop()? {
                Value::Tuple(items) => items.to_vec(),
                other => {
                    return Err(RunError::invalid_code(format!(
                        "defaults must be a tuple, not '{}'",
                        other.type_name()
                    )))
                }
            }
        } else {
            Vec::new()
        };

        let globals = self.frame()?.globals.clone();
        let func = Function::with_closure(code, name, globals, cells)?
            .with_defaults(defaults)
            .with_kw_defaults(kw_defaults);
        self.push(Value::Function(Rc::new(func)));
        Ok(())
    }

    /// Pops the closure tuple built from `LOAD_CLOSURE` cells.
    fn pop_closure(&mut self) -> RunResult<Vec<Cell>> {
        let items = match self.pop()? {
            Value::Tuple(items) => items,
            other => {
                return Err(RunError::invalid_code(format!(
                    "closure must be a tuple of cells, not '{}'",
                    other.type_name()
                )))
            }
        };
        items
            .iter()
            .map(|item| match item {
                Value::Cell(cell) => Ok(cell.clone()),
                other => Err(RunError::invalid_code(format!(
                    "closure item must be a cell, not '{}'",
                    other.type_name()
                ))),
            })
            .collect()
    }
}
