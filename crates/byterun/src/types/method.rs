//! Attribute access on built-in values and the small method set they expose.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    exception_private::{RunError, RunResult},
    types::iter::collect_iterable,
    value::Value,
};

/// A built-in method bound to its receiver, e.g. `xs.append`.
#[derive(Debug)]
pub struct BoundMethod {
    receiver: Value,
    name: Rc<str>,
}

impl BoundMethod {
    #[must_use]
    pub fn receiver(&self) -> &Value {
        &self.receiver
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the method on its receiver.
    pub fn call(&self, args: ArgValues) -> RunResult<Value> {
        match &self.receiver {
            Value::List(list) => match &*self.name {
                "append" => {
                    let item = args.get_one_arg("append")?;
                    list.borrow_mut().push(item);
                    Ok(Value::None)
                }
                "extend" => {
                    // collect before borrowing: `xs.extend(xs)` reads the receiver
                    let items = collect_iterable(&args.get_one_arg("extend")?)?;
                    list.borrow_mut().extend(items);
                    Ok(Value::None)
                }
                "pop" => {
                    args.check_no_kwargs("pop")?;
                    let index = match args.positional.as_slice() {
                        [] => None,
                        [index] => Some(index_arg(index)?),
                        _ => return Err(RunError::call_error("pop() takes at most 1 argument")),
                    };
                    let mut list = list.borrow_mut();
                    if list.is_empty() {
                        return Err(RunError::index_error("pop from empty list"));
                    }
                    let index = match index {
                        None => list.len() - 1,
                        Some(i) => normalize_index(i, list.len())
                            .ok_or_else(|| RunError::index_error("pop index out of range"))?,
                    };
                    Ok(list.remove(index))
                }
                _ => Err(self.missing()),
            },
            Value::Dict(dict) => {
                let dict = dict.borrow();
                match &*self.name {
                    "get" => {
                        let (key, default) = args.get_one_two_args("get")?;
                        Ok(dict.get(&key)?.or(default).unwrap_or(Value::None))
                    }
                    "keys" => {
                        args.check_zero_args("keys")?;
                        Ok(Value::list(dict.keys()))
                    }
                    "values" => {
                        args.check_zero_args("values")?;
                        Ok(Value::list(dict.values()))
                    }
                    "items" => {
                        args.check_zero_args("items")?;
                        Ok(Value::list(dict.items()))
                    }
                    _ => Err(self.missing()),
                }
            }
            Value::Str(s) => match &*self.name {
                "upper" => {
                    args.check_zero_args("upper")?;
                    Ok(Value::str(s.to_uppercase()))
                }
                "lower" => {
                    args.check_zero_args("lower")?;
                    Ok(Value::str(s.to_lowercase()))
                }
                "join" => {
                    let items = collect_iterable(&args.get_one_arg("join")?)?;
                    let mut parts = Vec::with_capacity(items.len());
                    for (i, item) in items.iter().enumerate() {
                        match item {
                            Value::Str(part) => parts.push(part.clone()),
                            other => {
                                return Err(RunError::type_error(format!(
                                    "sequence item {i}: expected str instance, {} found",
                                    other.type_name()
                                )))
                            }
                        }
                    }
                    Ok(Value::str(parts.join(s)))
                }
                _ => Err(self.missing()),
            },
            _ => Err(self.missing()),
        }
    }

    fn missing(&self) -> RunError {
        RunError::attribute_error(self.receiver.type_name(), &self.name)
    }
}

const LIST_METHODS: &[&str] = &["append", "extend", "pop"];
const DICT_METHODS: &[&str] = &["get", "keys", "values", "items"];
const STR_METHODS: &[&str] = &["upper", "lower", "join"];

/// `obj.name` for any value.
pub(crate) fn load_attr(obj: &Value, name: &str) -> RunResult<Value> {
    let methods = match obj {
        Value::List(_) => LIST_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Str(_) => STR_METHODS,
        _ => &[],
    };
    if methods.contains(&name) {
        return Ok(Value::BoundMethod(Rc::new(BoundMethod {
            receiver: obj.clone(),
            name: name.into(),
        })));
    }
    let found = match (obj, name) {
        (Value::Exception(exc), "args") => Some(Value::tuple(exc.args().to_vec())),
        (Value::Exception(exc), "__class__") => Some(Value::ExcClass(exc.class().clone())),
        (Value::ExcClass(class), "__name__") => Some(Value::str(class.name())),
        (Value::ExcClass(class), "__base__") => Some(class.base().map_or(Value::None, |b| Value::ExcClass(b.clone()))),
        (Value::Function(func), "__name__") => Some(Value::str(func.name())),
        (Value::Function(func), "__defaults__") => Some(func.defaults_value()),
        (Value::Function(func), "__code__") => Some(Value::Code(func.code().clone())),
        (Value::Native(native), "__name__") => Some(Value::str(native.name())),
        (Value::Code(code), "co_name") => Some(Value::str(code.name())),
        (Value::Range(range), "start") => Some(Value::Int(range.start)),
        (Value::Range(range), "stop") => Some(Value::Int(range.stop)),
        (Value::Range(range), "step") => Some(Value::Int(range.step)),
        (Value::Host(host), _) => host.get_attr(name),
        _ => None,
    };
    found.ok_or_else(|| RunError::attribute_error(obj.type_name(), name))
}

/// `obj.name = value`.
pub(crate) fn store_attr(obj: &Value, name: &str, value: Value) -> RunResult<()> {
    match obj {
        Value::Host(host) => host.set_attr(name, value),
        other => Err(RunError::attribute_error(other.type_name(), name)),
    }
}

/// `del obj.name`.
pub(crate) fn delete_attr(obj: &Value, name: &str) -> RunResult<()> {
    match obj {
        Value::Host(host) => host.del_attr(name),
        other => Err(RunError::attribute_error(other.type_name(), name)),
    }
}

fn index_arg(value: &Value) -> RunResult<i64> {
    value.as_int().ok_or_else(|| {
        RunError::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            value.type_name()
        ))
    })
}

/// Resolves a possibly negative index against a sequence length.
pub(crate) fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    if (0..len).contains(&index) {
        usize::try_from(index).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dict;

    fn call(receiver: &Value, name: &str, args: Vec<Value>) -> RunResult<Value> {
        match load_attr(receiver, name)? {
            Value::BoundMethod(method) => method.call(ArgValues::positional(args)),
            other => panic!("expected bound method, got {other:?}"),
        }
    }

    #[test]
    fn list_methods_mutate_receiver() {
        let list = Value::list(vec![Value::Int(1)]);
        call(&list, "append", vec![Value::Int(2)]).unwrap();
        call(&list, "extend", vec![Value::tuple(vec![Value::Int(3)])]).unwrap();
        assert_eq!(list.py_repr(), "[1, 2, 3]");
        assert!(matches!(call(&list, "pop", vec![Value::Int(0)]), Ok(Value::Int(1))));
        assert!(matches!(call(&list, "pop", vec![]), Ok(Value::Int(3))));
        assert_eq!(list.py_repr(), "[2]");
    }

    #[test]
    fn dict_get_with_default() {
        let dict = Value::dict(Dict::from_pairs([(Value::str("a"), Value::Int(1))]).unwrap());
        assert!(matches!(call(&dict, "get", vec![Value::str("a")]), Ok(Value::Int(1))));
        assert!(matches!(call(&dict, "get", vec![Value::str("b")]), Ok(Value::None)));
        assert!(matches!(
            call(&dict, "get", vec![Value::str("b"), Value::Int(9)]),
            Ok(Value::Int(9))
        ));
    }

    #[test]
    fn str_join_requires_strings() {
        let sep = Value::str(", ");
        let joined = call(&sep, "join", vec![Value::list(vec![Value::str("a"), Value::str("b")])]).unwrap();
        assert_eq!(joined.py_str(), "a, b");
        let err = call(&sep, "join", vec![Value::list(vec![Value::Int(1)])]).unwrap_err();
        assert_eq!(err.exception().exc_type(), "TypeError");
    }

    #[test]
    fn unknown_attribute() {
        let err = load_attr(&Value::Int(1), "real").unwrap_err();
        assert_eq!(err.to_string(), "AttributeError: 'int' object has no attribute 'real'");
    }

    #[test]
    fn negative_indices() {
        assert_eq!(normalize_index(-1, 3), Some(2));
        assert_eq!(normalize_index(3, 3), None);
        assert_eq!(normalize_index(-4, 3), None);
    }
}
