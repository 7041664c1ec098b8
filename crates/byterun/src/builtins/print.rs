//! Implementation of the print() builtin function.

use crate::{
    args::ArgValues,
    exception_private::{RunError, RunResult},
    io::PrintWriter,
    value::Value,
};

/// Implementation of the print() builtin function.
///
/// Supports the `sep` (default `" "`) and `end` (default `"\n"`) keyword arguments; both accept
/// `None` for the default. `flush` is accepted and ignored.
pub(super) fn builtin_print(print: &mut dyn PrintWriter, mut args: ArgValues) -> RunResult<Value> {
    let sep = string_kwarg(args.take_keyword("sep"), "sep")?;
    let end = string_kwarg(args.take_keyword("end"), "end")?;
    args.take_keyword("flush");
    if let Some((key, _)) = args.keywords.first() {
        return Err(RunError::call_error(format!(
            "'{key}' is an invalid keyword argument for print()"
        )));
    }

    let mut iter = args.positional.iter();
    if let Some(value) = iter.next() {
        print.stdout_write(value.py_str().into());
        for value in iter {
            match &sep {
                Some(sep) => print.stdout_write(sep.as_str().into()),
                None => print.stdout_push(' '),
            }
            print.stdout_write(value.py_str().into());
        }
    }
    match end {
        Some(end) => print.stdout_write(end.into()),
        None => print.stdout_push('\n'),
    }
    Ok(Value::None)
}

fn string_kwarg(value: Option<Value>, name: &str) -> RunResult<Option<String>> {
    match value {
        None | Some(Value::None) => Ok(None),
        Some(Value::Str(s)) => Ok(Some(s.to_string())),
        Some(other) => Err(RunError::type_error(format!(
            "{name} must be None or a string, not {}",
            other.type_name()
        ))),
    }
}
