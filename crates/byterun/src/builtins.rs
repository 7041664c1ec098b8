//! The builtin namespace: native functions and the standard exception classes.
//!
//! Name resolution consults builtins last, through the [`BuiltinLookup`] trait. [`Builtins`] is
//! the default implementation; hosts may supply their own lookup to add or hide names.

mod print;
mod range;

use std::{fmt, rc::Rc, str::FromStr};

use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    args::ArgValues,
    exception_private::{RunError, RunResult},
    host::HostObject,
    io::PrintWriter,
    namespace::Namespace,
    types::ExcClass,
    value::Value,
};

/// Source of builtin names.
pub trait BuiltinLookup: fmt::Debug {
    /// Returns the builtin bound to `name`, if any.
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// Native functions available in every standard builtin namespace.
///
/// Uses strum derives for `Display` and `FromStr`; variants serialize to lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum BuiltinFunction {
    Len,
    Print,
    Range,
    Repr,
    Str,
}

impl BuiltinFunction {
    fn call(self, print: &mut dyn PrintWriter, args: ArgValues) -> RunResult<Value> {
        match self {
            Self::Len => {
                let value = args.get_one_arg("len")?;
                let len = match &value {
                    Value::Str(s) => s.chars().count(),
                    Value::Tuple(items) => items.len(),
                    Value::List(items) => items.borrow().len(),
                    Value::Dict(dict) => dict.borrow().len(),
                    Value::Set(set) => set.borrow().len(),
                    Value::Range(range) => range.len(),
                    other => {
                        return Err(RunError::type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )))
                    }
                };
                i64::try_from(len)
                    .map(Value::Int)
                    .map_err(|_| RunError::overflow("length does not fit in an int"))
            }
            Self::Print => print::builtin_print(print, args),
            Self::Range => range::builtin_range(args),
            Self::Repr => Ok(Value::str(args.get_one_arg("repr")?.py_repr())),
            Self::Str => {
                args.check_no_kwargs("str")?;
                match args.positional.as_slice() {
                    [] => Ok(Value::str("")),
                    [Value::Str(s)] => Ok(Value::Str(s.clone())),
                    [value] => Ok(Value::str(value.py_str())),
                    _ => Err(RunError::call_error(format!(
                        "str() takes at most 1 argument ({} given)",
                        args.positional.len()
                    ))),
                }
            }
        }
    }
}

/// Host-supplied native function body.
pub type NativeFn = dyn Fn(&mut dyn PrintWriter, ArgValues) -> RunResult<Value>;

enum NativeKind {
    Builtin(BuiltinFunction),
    Host(Box<NativeFn>),
}

/// A callable implemented in Rust. Runs synchronously, without a frame.
pub struct NativeFunction {
    name: Rc<str>,
    kind: NativeKind,
}

impl NativeFunction {
    /// Wraps a host closure.
    pub fn new(
        name: impl Into<Rc<str>>,
        func: impl Fn(&mut dyn PrintWriter, ArgValues) -> RunResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NativeKind::Host(Box::new(func)),
        }
    }

    fn builtin(function: BuiltinFunction) -> Self {
        Self {
            name: function.to_string().into(),
            kind: NativeKind::Builtin(function),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, print: &mut dyn PrintWriter, args: ArgValues) -> RunResult<Value> {
        match &self.kind {
            NativeKind::Builtin(function) => function.call(print, args),
            NativeKind::Host(func) => func(print, args),
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Standard exception classes as `(name, base)`; every base precedes its subclasses.
const EXCEPTION_CLASSES: &[(&str, Option<&str>)] = &[
    ("BaseException", None),
    ("Exception", Some("BaseException")),
    ("ValueError", Some("Exception")),
    ("TypeError", Some("Exception")),
    ("LookupError", Some("Exception")),
    ("KeyError", Some("LookupError")),
    ("IndexError", Some("LookupError")),
    ("ZeroDivisionError", Some("Exception")),
    ("RuntimeError", Some("Exception")),
    ("NameError", Some("Exception")),
    ("StopIteration", Some("Exception")),
];

/// Default builtin namespace backed by an ordered name → value map.
#[derive(Debug, Default, Clone)]
pub struct Builtins(Namespace);

impl Builtins {
    /// An empty namespace: every builtin lookup fails.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// `len`, `print`, `range`, `repr`, `str` and the standard exception classes.
    #[must_use]
    pub fn standard() -> Self {
        let mut builtins = Self::empty();
        for function in BuiltinFunction::iter() {
            builtins.insert(function.to_string(), Value::Native(Rc::new(NativeFunction::builtin(function))));
        }
        let mut classes: Vec<Rc<ExcClass>> = Vec::with_capacity(EXCEPTION_CLASSES.len());
        for (name, base) in EXCEPTION_CLASSES {
            let base = base.and_then(|base| classes.iter().find(|c| c.name() == base).cloned());
            let class = ExcClass::new(*name, base);
            builtins.insert(*name, Value::ExcClass(class.clone()));
            classes.push(class);
        }
        builtins
    }

    /// Binds `name`, replacing any previous binding.
    pub fn insert(&mut self, name: impl Into<Rc<str>>, value: Value) {
        self.0.set(name, value);
    }

    /// Binds a host closure as a native function called `name`.
    pub fn insert_native(
        &mut self,
        name: &str,
        func: impl Fn(&mut dyn PrintWriter, ArgValues) -> RunResult<Value> + 'static,
    ) {
        self.insert(name, Value::Native(Rc::new(NativeFunction::new(name, func))));
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }
}

impl BuiltinLookup for Builtins {
    fn lookup(&self, name: &str) -> Option<Value> {
        self.0.get(name).cloned()
    }
}

/// The value bound to `__builtins__` in default module globals.
///
/// Attribute access reads through to the builtin lookup, so `__builtins__.len` is `len`.
#[derive(Debug)]
pub(crate) struct BuiltinsModule(pub Rc<dyn BuiltinLookup>);

impl HostObject for BuiltinsModule {
    fn type_name(&self) -> &str {
        "module"
    }

    fn repr(&self) -> String {
        "<module 'builtins'>".to_owned()
    }

    fn get_attr(&self, name: &str) -> Option<Value> {
        self.0.lookup(name)
    }
}

impl FromStr for NativeFunction {
    type Err = strum::ParseError;

    /// Looks up a standard native function by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinFunction::from_str(s).map(Self::builtin)
    }
}
