use std::rc::Rc;

use crate::{
    exception_private::{RunError, RunResult},
    value::Value,
};

/// Arguments of a call: positional values followed by named ones.
///
/// Keyword order is the order written at the call site; names are not yet checked against any
/// signature.
#[derive(Debug, Default, Clone)]
pub struct ArgValues {
    pub positional: Vec<Value>,
    pub keywords: Vec<(Rc<str>, Value)>,
}

impl ArgValues {
    #[must_use]
    pub fn new(positional: Vec<Value>, keywords: Vec<(Rc<str>, Value)>) -> Self {
        Self { positional, keywords }
    }

    #[must_use]
    pub fn positional(positional: Vec<Value>) -> Self {
        Self {
            positional,
            keywords: Vec::new(),
        }
    }

    /// Total number of arguments.
    #[must_use]
    pub fn count(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    /// Fails if any keyword argument was given to a callable that accepts none.
    pub fn check_no_kwargs(&self, name: &str) -> RunResult<()> {
        match self.keywords.first() {
            None => Ok(()),
            Some((key, _)) => Err(RunError::call_error(format!(
                "{name}() got an unexpected keyword argument '{key}'"
            ))),
        }
    }

    /// Checks that zero arguments were passed.
    pub fn check_zero_args(&self, name: &str) -> RunResult<()> {
        self.check_no_kwargs(name)?;
        if self.positional.is_empty() {
            Ok(())
        } else {
            Err(RunError::call_error(format!(
                "{name}() takes no arguments ({} given)",
                self.positional.len()
            )))
        }
    }

    /// Checks that exactly one positional argument was passed, returning it.
    pub fn get_one_arg(self, name: &str) -> RunResult<Value> {
        self.check_no_kwargs(name)?;
        let mut positional = self.positional;
        if positional.len() == 1 {
            if let Some(value) = positional.pop() {
                return Ok(value);
            }
        }
        Err(arg_count_error(name, "exactly one argument", positional.len()))
    }

    /// Checks that one or two positional arguments were passed.
    pub fn get_one_two_args(self, name: &str) -> RunResult<(Value, Option<Value>)> {
        self.check_no_kwargs(name)?;
        let count = self.positional.len();
        let mut iter = self.positional.into_iter();
        match (iter.next(), iter.next(), iter.next()) {
            (Some(a), b, None) => Ok((a, b)),
            _ => Err(arg_count_error(name, "1 or 2 arguments", count)),
        }
    }

    /// Checks that between one and three positional arguments were passed.
    pub fn get_one_to_three_args(self, name: &str) -> RunResult<(Value, Option<Value>, Option<Value>)> {
        self.check_no_kwargs(name)?;
        let count = self.positional.len();
        let mut iter = self.positional.into_iter();
        match (iter.next(), iter.next(), iter.next(), iter.next()) {
            (Some(a), b, c, None) => Ok((a, b, c)),
            _ => Err(arg_count_error(name, "1 to 3 arguments", count)),
        }
    }

    /// Removes and returns the keyword argument called `key`, if present.
    pub fn take_keyword(&mut self, key: &str) -> Option<Value> {
        let index = self.keywords.iter().position(|(k, _)| &**k == key)?;
        Some(self.keywords.remove(index).1)
    }
}

fn arg_count_error(name: &str, expected: &str, given: usize) -> RunError {
    RunError::call_error(format!("{name}() takes {expected} ({given} given)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arity_helpers() {
        let args = ArgValues::positional(vec![Value::Int(1)]);
        assert!(matches!(args.get_one_arg("f"), Ok(Value::Int(1))));

        let args = ArgValues::positional(vec![Value::Int(1), Value::Int(2)]);
        let err = args.get_one_arg("len").unwrap_err();
        assert_eq!(err.to_string(), "TypeError: len() takes exactly one argument (2 given)");

        let args = ArgValues::new(vec![], vec![("x".into(), Value::None)]);
        assert!(args.check_zero_args("f").is_err());
    }

    #[test]
    fn take_keyword_removes_entry() {
        let mut args = ArgValues::new(vec![], vec![("sep".into(), Value::str("-")), ("end".into(), Value::None)]);
        assert!(args.take_keyword("sep").is_some());
        assert!(args.take_keyword("sep").is_none());
        assert_eq!(args.keywords.len(), 1);
    }
}
