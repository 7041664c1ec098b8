//! Implementation of the range() builtin function.

use crate::{
    args::ArgValues,
    exception_private::{RunError, RunResult},
    types::Range,
    value::Value,
};

/// `range(stop)`, `range(start, stop)` or `range(start, stop, step)`.
pub(super) fn builtin_range(args: ArgValues) -> RunResult<Value> {
    let (first, second, third) = args.get_one_to_three_args("range")?;
    let range = match (first, second, third) {
        (stop, None, _) => Range::from_stop(int_arg(&stop)?),
        (start, Some(stop), step) => {
            let step = match step {
                Some(step) => int_arg(&step)?,
                None => 1,
            };
            Range::new(int_arg(&start)?, int_arg(&stop)?, step)?
        }
    };
    Ok(Value::Range(range))
}

fn int_arg(value: &Value) -> RunResult<i64> {
    value.as_int().ok_or_else(|| {
        RunError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(args: &[i64]) -> RunResult<Value> {
        builtin_range(ArgValues::positional(args.iter().copied().map(Value::Int).collect()))
    }

    #[test]
    fn arities() {
        assert_eq!(range(&[3]).unwrap().py_repr(), "range(0, 3)");
        assert_eq!(range(&[1, 3]).unwrap().py_repr(), "range(1, 3)");
        assert_eq!(range(&[5, 0, -2]).unwrap().py_repr(), "range(5, 0, -2)");
        assert_eq!(range(&[0, 1, 0]).unwrap_err().exception().exc_type(), "ValueError");
        assert!(range(&[]).is_err());
    }

    #[test]
    fn rejects_floats() {
        let err = builtin_range(ArgValues::positional(vec![Value::Float(1.5)])).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: 'float' object cannot be interpreted as an integer");
    }
}
