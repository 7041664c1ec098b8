//! Bytecode virtual machine.
//!
//! The VM uses a stack-based execution model: one operand stack shared by all frames (each frame
//! owns the region above its `stack_base`) and an explicit call stack of frames. A call pushes a
//! frame and the same loop continues in it; a return pops the frame and pushes the result on the
//! caller's region. Recursion in the executed program never recurses in Rust.

mod binary;
mod call;
mod collections;
mod compare;
mod exceptions;
mod frame;

use std::rc::Rc;

use call::CallResult;
pub(crate) use frame::Frame;
use log::trace;

use crate::{
    args::ArgValues,
    builtins::BuiltinLookup,
    bytecode::{
        code::{Code, Instruction},
        op::Opcode,
    },
    exception_private::{RunError, RunResult},
    exception_public::Fault,
    io::PrintWriter,
    namespace::{local_key, Scope},
    resource::ResourceTracker,
    types::{
        method::{delete_attr, load_attr, store_attr},
        ValueIter,
    },
    value::Value,
};

/// Outcome of one instruction.
enum Step {
    Continue,
    /// The active frame returned.
    Return(Value),
}

/// The bytecode virtual machine.
pub(crate) struct Vm<T: ResourceTracker, P: PrintWriter> {
    /// Operand stack - values being computed.
    stack: Vec<Value>,
    /// Call stack - the last frame is active.
    frames: Vec<Frame>,
    tracker: T,
    print: P,
    builtins: Rc<dyn BuiltinLookup>,
    /// Instructions decoded since the VM was created.
    steps: u64,
}

impl<T: ResourceTracker, P: PrintWriter> Vm<T, P> {
    pub fn new(tracker: T, print: P, builtins: Rc<dyn BuiltinLookup>) -> Self {
        Self {
            stack: Vec::with_capacity(64),
            frames: Vec::with_capacity(16),
            tracker,
            print,
            builtins,
            steps: 0,
        }
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn print(&self) -> &P {
        &self.print
    }

    pub fn print_mut(&mut self) -> &mut P {
        &mut self.print
    }

    pub fn builtins(&self) -> &Rc<dyn BuiltinLookup> {
        &self.builtins
    }

    pub fn set_builtins(&mut self, builtins: Rc<dyn BuiltinLookup>) {
        self.builtins = builtins;
    }

    /// Runs module-level code until it returns or faults.
    pub fn run_module(&mut self, code: Rc<Code>, globals: Scope) -> Result<Value, Fault> {
        let base = self.frames.len();
        let pushed = Frame::module(code, globals, Rc::clone(&self.builtins), self.stack.len())
            .and_then(|frame| self.push_frame(frame));
        match pushed {
            Ok(()) => self.execute(base),
            Err(err) => Err(self.unwind(err, base)),
        }
    }

    /// Calls `callable` from the host and runs it to completion.
    pub fn invoke(&mut self, callable: Value, args: ArgValues) -> Result<Value, Fault> {
        let base = self.frames.len();
        match self.call_value(callable, args) {
            Ok(CallResult::Value(value)) => Ok(value),
            Ok(CallResult::FramePushed) => self.execute(base),
            Err(err) => Err(self.unwind(err, base)),
        }
    }

    /// Main execution loop.
    ///
    /// Runs until the frame sitting at index `base` returns; a fault unwinds every frame down to
    /// and including that one.
    fn execute(&mut self, base: usize) -> Result<Value, Fault> {
        loop {
            match self.step() {
                Ok(Step::Continue) => {}
                Ok(Step::Return(value)) => {
                    self.pop_frame();
                    if self.frames.len() <= base {
                        return Ok(value);
                    }
                    self.push(value);
                }
                Err(err) => return Err(self.unwind(err, base)),
            }
        }
    }

    /// Fetches, decodes and executes one instruction of the active frame.
    fn step(&mut self) -> RunResult<Step> {
        let frame = self.frame_mut()?;
        if frame.ip >= frame.code.bytes().len() {
            // running off the end returns None
            return Ok(Step::Return(Value::None));
        }
        let code = Rc::clone(&frame.code);
        let instr = code.decode(frame.ip)?;
        frame.instruction_ip = frame.ip;
        frame.ip = instr.next;

        self.steps += 1;
        self.tracker.on_step(self.steps)?;
        self.dispatch(&code, instr)
    }

    fn dispatch(&mut self, code: &Code, instr: Instruction) -> RunResult<Step> {
        let Instruction { opcode, arg, .. } = instr;
        match opcode {
            // ============================================================
            // Stack Operations
            // ============================================================
            Opcode::Nop => {}
            Opcode::PopTop => {
                self.pop()?;
            }
            Opcode::DupTop => {
                let value = self.peek()?.clone();
                self.push(value);
            }
            Opcode::DupTopTwo => {
                let top = self.pop_n(2)?;
                self.stack.extend(top.iter().cloned());
                self.stack.extend(top);
            }
            Opcode::RotTwo => {
                // [a, b] -> [b, a]
                let mut top = self.pop_n(2)?;
                top.swap(0, 1);
                self.stack.extend(top);
            }
            Opcode::RotThree => {
                // [a, b, c] -> [c, a, b]
                let mut top = self.pop_n(3)?;
                top.rotate_right(1);
                self.stack.extend(top);
            }
            Opcode::LoadConst => self.push(code.consts()[arg].clone()),

            // ============================================================
            // Names
            // ============================================================
            Opcode::LoadName => {
                let name = &code.names()[arg];
                let value = self.load_name(name)?;
                self.push(value);
            }
            Opcode::StoreName => {
                let value = self.pop()?;
                self.frame()?.locals.borrow_mut().set(code.names()[arg].clone(), value);
            }
            Opcode::DeleteName => {
                let name = &code.names()[arg];
                if self.frame()?.locals.borrow_mut().remove(name).is_none() {
                    return Err(RunError::undefined_name(name));
                }
            }
            Opcode::LoadGlobal => {
                let name = &code.names()[arg];
                let value = self.load_global(name)?;
                self.push(value);
            }
            Opcode::StoreGlobal => {
                let value = self.pop()?;
                self.frame()?.globals.borrow_mut().set(code.names()[arg].clone(), value);
            }
            Opcode::DeleteGlobal => {
                let name = &code.names()[arg];
                if self.frame()?.globals.borrow_mut().remove(name).is_none() {
                    return Err(RunError::undefined_name(name));
                }
            }
            Opcode::LoadFast => {
                let name = &code.varnames()[arg];
                let value = self.frame()?.locals.borrow().get(&local_key(name)).cloned();
                match value {
                    Some(value) => self.push(value),
                    None => return Err(RunError::unbound_local(name)),
                }
            }
            Opcode::StoreFast => {
                let value = self.pop()?;
                let key = local_key(&code.varnames()[arg]);
                self.frame()?.locals.borrow_mut().set(key, value);
            }
            Opcode::DeleteFast => {
                let name = &code.varnames()[arg];
                if self.frame()?.locals.borrow_mut().remove(&local_key(name)).is_none() {
                    return Err(RunError::unbound_local(name));
                }
            }

            // ============================================================
            // Cells
            // ============================================================
            Opcode::LoadDeref => {
                let value = self.frame()?.cells[arg].get();
                match value {
                    Some(value) => self.push(value),
                    None => return Err(empty_cell_error(code, arg)),
                }
            }
            Opcode::StoreDeref => {
                let value = self.pop()?;
                self.frame()?.cells[arg].set(value);
            }
            Opcode::DeleteDeref => {
                if !self.frame()?.cells[arg].clear() {
                    return Err(empty_cell_error(code, arg));
                }
            }
            Opcode::LoadClosure => {
                let cell = self.frame()?.cells[arg].clone();
                self.push(Value::Cell(cell));
            }

            // ============================================================
            // Operators
            // ============================================================
            Opcode::UnaryNot | Opcode::UnaryNegative | Opcode::UnaryPositive | Opcode::UnaryInvert => {
                self.unary(opcode)?;
            }
            Opcode::BinaryAdd
            | Opcode::BinarySubtract
            | Opcode::BinaryMultiply
            | Opcode::BinaryFloorDivide
            | Opcode::BinaryTrueDivide
            | Opcode::BinaryModulo
            | Opcode::BinaryPower
            | Opcode::BinaryLshift
            | Opcode::BinaryRshift
            | Opcode::BinaryAnd
            | Opcode::BinaryOr
            | Opcode::BinaryXor
            | Opcode::BinarySubscr => self.binary(opcode)?,
            Opcode::InplaceAdd
            | Opcode::InplaceSubtract
            | Opcode::InplaceMultiply
            | Opcode::InplaceFloorDivide
            | Opcode::InplaceTrueDivide
            | Opcode::InplaceModulo
            | Opcode::InplacePower
            | Opcode::InplaceLshift
            | Opcode::InplaceRshift
            | Opcode::InplaceAnd
            | Opcode::InplaceOr
            | Opcode::InplaceXor => self.inplace(opcode)?,
            Opcode::CompareOp => self.compare(arg)?,

            // ============================================================
            // Collections
            // ============================================================
            Opcode::BuildList => self.build_list(arg)?,
            Opcode::BuildTuple => self.build_tuple(arg)?,
            Opcode::BuildSet => self.build_set(arg)?,
            Opcode::BuildMap => self.build_map(arg)?,
            Opcode::StoreMap => self.store_map()?,
            Opcode::ListAppend => self.list_append(arg)?,
            Opcode::UnpackSequence => self.unpack_sequence(arg)?,
            Opcode::StoreSubscr => self.store_subscr()?,
            Opcode::DeleteSubscr => self.delete_subscr()?,

            // ============================================================
            // Attributes
            // ============================================================
            Opcode::LoadAttr | Opcode::LoadMethod => {
                let obj = self.pop()?;
                let value = load_attr(&obj, &code.names()[arg])?;
                self.push(value);
            }
            Opcode::StoreAttr => {
                // TOS.name = TOS1
                let obj = self.pop()?;
                let value = self.pop()?;
                store_attr(&obj, &code.names()[arg], value)?;
            }
            Opcode::DeleteAttr => {
                let obj = self.pop()?;
                delete_attr(&obj, &code.names()[arg])?;
            }

            // ============================================================
            // Functions
            // ============================================================
            Opcode::MakeFunction => self.make_function(arg)?,
            Opcode::CallFunction | Opcode::CallMethod => {
                let args = self.pop_n(arg)?;
                let callable = self.pop()?;
                self.call_and_push(callable, ArgValues::positional(args))?;
            }
            Opcode::CallFunctionKw => self.call_function_kw(arg)?,
            Opcode::CallFunctionEx => self.call_function_ex(arg)?,
            Opcode::ReturnValue => return Ok(Step::Return(self.pop()?)),

            // ============================================================
            // Control Flow
            // ============================================================
            Opcode::JumpForward | Opcode::JumpAbsolute => self.jump(arg)?,
            Opcode::PopJumpIfTrue => {
                if self.pop()?.py_bool() {
                    self.jump(arg)?;
                }
            }
            Opcode::PopJumpIfFalse => {
                if !self.pop()?.py_bool() {
                    self.jump(arg)?;
                }
            }
            Opcode::JumpIfTrueOrPop => {
                if self.peek()?.py_bool() {
                    self.jump(arg)?;
                } else {
                    self.pop()?;
                }
            }
            Opcode::JumpIfFalseOrPop => {
                if self.peek()?.py_bool() {
                    self.pop()?;
                } else {
                    self.jump(arg)?;
                }
            }

            // ============================================================
            // Iteration
            // ============================================================
            Opcode::GetIter => {
                let value = self.pop()?;
                self.push(ValueIter::iter_value(value)?);
            }
            Opcode::ForIter => self.for_iter(arg)?,

            // ============================================================
            // Imports and output
            // ============================================================
            Opcode::LoadBuildClass => {
                let build_class = self.builtin_hook("__build_class__")?;
                self.push(build_class);
            }
            Opcode::ImportName => self.import_name(&code.names()[arg])?,
            Opcode::ImportFrom => {
                let module = self.peek()?.clone();
                let value = load_attr(&module, &code.names()[arg])?;
                self.push(value);
            }
            Opcode::PrintItem => {
                let value = self.pop()?;
                self.print.stdout_write(value.py_str().into());
            }
            Opcode::PrintNewline => self.print.stdout_push('\n'),

            Opcode::RaiseVarargs => return Err(self.raise_varargs(arg)?),
        }
        Ok(Step::Continue)
    }

    // ========================================================================
    // Stack Operations
    // ========================================================================

    /// Pushes a value onto the operand stack.
    #[inline]
    pub(super) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Size of the active frame's stack region.
    fn stack_depth(&self) -> RunResult<usize> {
        let base = self.frame()?.stack_base;
        Ok(self.stack.len().saturating_sub(base))
    }

    fn underflow(&self) -> RunError {
        let name = self.frames.last().map_or("<no frame>", |frame| &*frame.name);
        RunError::stack_underflow(name)
    }

    /// Pops a value from the active frame's stack region.
    pub(super) fn pop(&mut self) -> RunResult<Value> {
        if self.stack_depth()? == 0 {
            return Err(self.underflow());
        }
        self.stack.pop().ok_or_else(|| self.underflow())
    }

    /// Peeks at the top of the active frame's stack region.
    pub(super) fn peek(&self) -> RunResult<&Value> {
        if self.stack_depth()? == 0 {
            return Err(self.underflow());
        }
        self.stack.last().ok_or_else(|| self.underflow())
    }

    /// Pops `n` values; the first popped is the last in the returned vector.
    pub(super) fn pop_n(&mut self, n: usize) -> RunResult<Vec<Value>> {
        if self.stack_depth()? < n {
            return Err(self.underflow());
        }
        let start = self.stack.len() - n;
        Ok(self.stack.drain(start..).collect())
    }

    // ========================================================================
    // Frame Operations
    // ========================================================================

    pub(super) fn frame(&self) -> RunResult<&Frame> {
        self.frames.last().ok_or_else(|| RunError::invalid_code("no active frame"))
    }

    fn frame_mut(&mut self) -> RunResult<&mut Frame> {
        self.frames.last_mut().ok_or_else(|| RunError::invalid_code("no active frame"))
    }

    /// Pushes a frame, enforcing the recursion limit.
    pub(super) fn push_frame(&mut self, frame: Frame) -> RunResult<()> {
        self.tracker.check_recursion_depth(self.frames.len() + 1)?;
        trace!("push frame {} (depth {})", frame.name, self.frames.len() + 1);
        self.frames.push(frame);
        Ok(())
    }

    /// Pops the active frame and discards its stack region.
    pub(super) fn pop_frame(&mut self) -> Option<Frame> {
        let frame = self.frames.pop()?;
        self.stack.truncate(frame.stack_base);
        trace!("pop frame {} (depth {})", frame.name, self.frames.len());
        Some(frame)
    }

    fn jump(&mut self, target: usize) -> RunResult<()> {
        self.frame_mut()?.ip = target;
        Ok(())
    }

    // ========================================================================
    // Variable Operations
    // ========================================================================

    /// Locals, then globals, then builtins.
    fn load_name(&self, name: &str) -> RunResult<Value> {
        let frame = self.frame()?;
        if !frame.is_module() {
            if let Some(value) = frame.locals.borrow().get(name) {
                return Ok(value.clone());
            }
        }
        self.load_global(name)
    }

    /// Globals, then builtins.
    fn load_global(&self, name: &str) -> RunResult<Value> {
        let frame = self.frame()?;
        if let Some(value) = frame.globals.borrow().get(name) {
            return Ok(value.clone());
        }
        frame.builtins.lookup(name).ok_or_else(|| RunError::undefined_name(name))
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// Advances the iterator on TOS, converting an iterable in place first.
    fn for_iter(&mut self, exit: usize) -> RunResult<()> {
        let iter = match self.peek()?.clone() {
            Value::Iterator(iter) => iter,
            iterable => {
                self.pop()?;
                let iter = ValueIter::iter_value(iterable)?;
                self.push(iter.clone());
                match iter {
                    Value::Iterator(iter) => iter,
                    other => return Err(RunError::not_iterable(other.type_name())),
                }
            }
        };
        let next = iter.borrow_mut().next_value()?;
        match next {
            Some(value) => self.push(value),
            None => {
                self.pop()?;
                self.jump(exit)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Imports
    // ========================================================================

    /// `IMPORT_NAME`: TOS is the fromlist, TOS1 the level; calls `__import__(name, fromlist, level)`.
    fn import_name(&mut self, name: &Rc<str>) -> RunResult<()> {
        let fromlist = self.pop()?;
        let level = self.pop()?;
        let import = self.builtin_hook("__import__")?;
        let args = ArgValues::positional(vec![Value::Str(Rc::clone(name)), fromlist, level]);
        self.call_and_push(import, args)
    }

    /// A builtin the engine relies on but does not define itself, such as `__import__`.
    fn builtin_hook(&self, name: &str) -> RunResult<Value> {
        self.frame()?
            .builtins
            .lookup(name)
            .ok_or_else(|| RunError::undefined_name(name))
    }
}

/// Error for reading or deleting an empty cell.
fn empty_cell_error(code: &Code, index: usize) -> RunError {
    let (name, is_free) = code.cell_name(index);
    if is_free {
        RunError::unbound_free(name)
    } else {
        RunError::unbound_local(name)
    }
}
