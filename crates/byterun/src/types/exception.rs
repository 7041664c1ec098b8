//! Exception classes and instances raised by program code.

use std::{fmt, rc::Rc};

use crate::value::Value;

/// An exception class with single inheritance.
#[derive(Debug)]
pub struct ExcClass {
    name: Rc<str>,
    base: Option<Rc<ExcClass>>,
}

impl ExcClass {
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>, base: Option<Rc<Self>>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            base,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn base(&self) -> Option<&Rc<Self>> {
        self.base.as_ref()
    }

    /// True if `self` is `other` or derives from it.
    #[must_use]
    pub fn is_subclass_of(&self, other: &Self) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.base.as_deref();
        }
        false
    }
}

/// An instantiated exception: its class and constructor arguments.
#[derive(Debug)]
pub struct ExcInstance {
    class: Rc<ExcClass>,
    args: Vec<Value>,
}

impl ExcInstance {
    #[must_use]
    pub fn new(class: Rc<ExcClass>, args: Vec<Value>) -> Self {
        Self { class, args }
    }

    #[must_use]
    pub fn class(&self) -> &Rc<ExcClass> {
        &self.class
    }

    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Text shown after the type name: nothing for no arguments, `str(arg)` for one, the
    /// argument tuple otherwise.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self.args.as_slice() {
            [] => None,
            [arg] => Some(arg.py_str()),
            args => Some(Value::tuple(args.to_vec()).py_repr()),
        }
    }
}

impl fmt::Display for ExcInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.message() {
            Some(msg) => write!(f, "{}: {msg}", self.class.name),
            None => f.write_str(&self.class.name),
        }
    }
}
