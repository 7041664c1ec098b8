//! Argument binding.
//!
//! A signature is read straight off a code object. Parameters are laid out at the front of
//! `varnames` in this order:
//! ```text
//! [positional-or-keyword][keyword-only][*args?][**kwargs?]
//! ```
//! Defaults are supplied by the function: positional defaults are right-aligned against the
//! positional parameters, keyword-only defaults are looked up by name.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    bytecode::Code,
    exception_private::{RunError, RunResult},
    types::Dict,
    value::Value,
};

/// Parameter view of a code object.
#[derive(Debug, Clone, Copy)]
pub struct Signature<'a> {
    positional: &'a [Rc<str>],
    kwonly: &'a [Rc<str>],
    var_args: Option<&'a Rc<str>>,
    var_kwargs: Option<&'a Rc<str>>,
}

impl<'a> Signature<'a> {
    #[must_use]
    pub fn of(code: &'a Code) -> Self {
        Self {
            positional: code.positional_names(),
            kwonly: code.kwonly_names(),
            var_args: code.varargs_name(),
            var_kwargs: code.varkw_name(),
        }
    }

    /// Binds a call's arguments to parameter names.
    ///
    /// Returns one `(name, value)` pair per parameter, in parameter order.
    pub fn bind(
        &self,
        func_name: &str,
        args: ArgValues,
        defaults: &[Value],
        kw_defaults: &[(Rc<str>, Value)],
    ) -> RunResult<Vec<(Rc<str>, Value)>> {
        let ArgValues { positional, keywords } = args;
        let pos_params = self.positional.len();
        let named_params = pos_params + self.kwonly.len();

        let given = positional.len();
        if self.var_args.is_none() && given > pos_params {
            return Err(self.too_many_positional(func_name, given, defaults.len()));
        }

        let mut slots: Vec<Option<Value>> = vec![None; named_params];
        let mut pos_iter = positional.into_iter();
        for slot in slots.iter_mut().take(pos_params) {
            match pos_iter.next() {
                Some(value) => *slot = Some(value),
                None => break,
            }
        }
        let excess: Vec<Value> = pos_iter.collect();

        let mut extra_kwargs = Dict::new();
        for (key, value) in keywords {
            let index = self
                .positional
                .iter()
                .chain(self.kwonly)
                .position(|param| *param == key);
            match index {
                Some(index) => {
                    if slots[index].is_some() {
                        return Err(RunError::call_error(format!(
                            "{func_name}() got multiple values for argument '{key}'"
                        )));
                    }
                    slots[index] = Some(value);
                }
                None if self.var_kwargs.is_some() => {
                    let key = Value::Str(key);
                    if extra_kwargs.contains(&key)? {
                        return Err(RunError::call_error(format!(
                            "{func_name}() got multiple values for keyword argument {}",
                            key.py_repr()
                        )));
                    }
                    extra_kwargs.set(key, value)?;
                }
                None => {
                    return Err(RunError::call_error(format!(
                        "{func_name}() got an unexpected keyword argument '{key}'"
                    )))
                }
            }
        }

        // positional defaults cover the last `defaults.len()` positional parameters
        let first_default = pos_params.saturating_sub(defaults.len());
        let mut missing = Vec::new();
        for (i, slot) in slots.iter_mut().enumerate().take(pos_params) {
            if slot.is_none() {
                match i.checked_sub(first_default).and_then(|d| defaults.get(d)) {
                    Some(default) => *slot = Some(default.clone()),
                    None => missing.push(&self.positional[i]),
                }
            }
        }
        if !missing.is_empty() {
            return Err(missing_error(func_name, "positional", &missing));
        }

        let mut missing = Vec::new();
        for (name, slot) in self.kwonly.iter().zip(&mut slots[pos_params..]) {
            if slot.is_none() {
                match kw_defaults.iter().find(|(k, _)| k == name) {
                    Some((_, default)) => *slot = Some(default.clone()),
                    None => missing.push(name),
                }
            }
        }
        if !missing.is_empty() {
            return Err(missing_error(func_name, "keyword-only", &missing));
        }

        let mut bound: Vec<(Rc<str>, Value)> = self
            .positional
            .iter()
            .chain(self.kwonly)
            .cloned()
            .zip(slots.into_iter().map(|slot| slot.unwrap_or(Value::None)))
            .collect();
        if let Some(name) = self.var_args {
            bound.push((name.clone(), Value::tuple(excess)));
        }
        if let Some(name) = self.var_kwargs {
            bound.push((name.clone(), Value::dict(extra_kwargs)));
        }
        Ok(bound)
    }

    fn too_many_positional(&self, func_name: &str, given: usize, default_count: usize) -> RunError {
        let max = self.positional.len();
        let min = max.saturating_sub(default_count);
        let takes = if min == max {
            format!("{max} positional argument{}", plural(max))
        } else {
            format!("from {min} to {max} positional arguments")
        };
        let was = if given == 1 { "was" } else { "were" };
        RunError::call_error(format!("{func_name}() takes {takes} but {given} {was} given"))
    }
}

fn missing_error(func_name: &str, kind: &str, missing: &[&Rc<str>]) -> RunError {
    let quoted: Vec<String> = missing.iter().map(|name| format!("'{name}'")).collect();
    let names = match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{first} and {second}"),
        [init @ .., last] => format!("{}, and {last}", init.join(", ")),
    };
    RunError::call_error(format!(
        "{func_name}() missing {} required {kind} argument{}: {names}",
        missing.len(),
        plural(missing.len())
    ))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
