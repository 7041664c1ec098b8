//! Stack-based execution engine for compiled Python-style bytecode.
//!
//! Code objects come from a compiler (or [`CodeBuilder`] in tests and hosts) and are validated
//! once when constructed. [`Engine`] runs them on an explicit frame stack with Python scoping:
//! locals, module globals and a pluggable builtin namespace, plus cells shared between a function
//! and the closures it creates. Every error unwinds to the entry point as a [`Fault`] carrying a
//! traceback, innermost frame first.
//!
//! ```
//! use std::rc::Rc;
//! use byterun::{CodeBuilder, Engine, FaultKind, Opcode, Value};
//!
//! let mut b = CodeBuilder::new("<module>");
//! b.load_const(Value::Int(1)).load_const(Value::Int(0)).emit(Opcode::BinaryTrueDivide);
//! let code = Rc::new(b.build().unwrap());
//!
//! let fault = Engine::new().run(code, None).unwrap_err();
//! assert_eq!(fault.kind(), FaultKind::OperatorError);
//! assert_eq!(fault.exc_type(), "ZeroDivisionError");
//! ```
mod args;
mod builtins;
mod bytecode;
mod cell;
mod exception_private;
mod exception_public;
mod function;
mod host;
mod io;
mod namespace;
mod ops;
mod resource;
mod run;
mod signature;
mod types;
mod value;

pub use crate::{
    args::ArgValues,
    builtins::{BuiltinFunction, BuiltinLookup, Builtins, NativeFunction},
    bytecode::{
        BinaryOp, Code, CodeBuilder, CodeError, CodeFlags, CodeParts, CompareOp, InvalidOpcodeError, Label,
        MakeFunctionFlags, Opcode, OperandKind, UnaryOp,
    },
    cell::Cell,
    exception_private::{RunError, RunResult, SimpleException},
    exception_public::{Fault, FaultKind, TraceEntry},
    function::Function,
    host::HostObject,
    io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint},
    namespace::{Namespace, Scope},
    resource::{
        LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker, DEFAULT_MAX_RECURSION_DEPTH,
    },
    run::Engine,
    signature::Signature,
    types::{BoundMethod, Dict, ExcClass, ExcInstance, Range, Set, ValueIter},
    value::Value,
};
