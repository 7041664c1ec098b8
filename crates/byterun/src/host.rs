//! Opaque host objects.

use std::fmt;

use crate::{
    args::ArgValues,
    exception_private::{RunError, RunResult},
    value::Value,
};

/// A value owned by the embedding host.
///
/// The engine moves host objects through stacks and scopes without interpreting them; attribute
/// access, method calls and direct calls are delegated here. Every hook has a default that behaves
/// like a plain object with no attributes.
pub trait HostObject: fmt::Debug {
    /// Type name used in error messages and the default `repr`.
    fn type_name(&self) -> &str;

    fn repr(&self) -> String {
        format!("<{} object>", self.type_name())
    }

    fn py_bool(&self) -> bool {
        true
    }

    /// Returns the attribute `name`, or `None` if it does not exist.
    fn get_attr(&self, _name: &str) -> Option<Value> {
        None
    }

    fn set_attr(&self, name: &str, _value: Value) -> RunResult<()> {
        Err(RunError::attribute_error(self.type_name(), name))
    }

    fn del_attr(&self, name: &str) -> RunResult<()> {
        Err(RunError::attribute_error(self.type_name(), name))
    }

    /// Calls the object itself.
    fn call(&self, _args: ArgValues) -> RunResult<Value> {
        Err(RunError::not_callable(self.type_name()))
    }
}
