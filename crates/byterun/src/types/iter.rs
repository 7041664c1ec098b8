//! Iteration state for `GET_ITER` / `FOR_ITER`.
//!
//! State is index based: each call to [`ValueIter::next_value`] re-reads the source, so a list
//! that grows during a loop yields the new items (as in the modeled language), while dicts and
//! sets detect size changes and fail instead.

use std::{cell::RefCell, rc::Rc};

use crate::{
    exception_private::{RunError, RunResult},
    types::{Dict, Range, Set},
    value::Value,
};

/// Iterator over a built-in iterable.
#[derive(Debug)]
pub struct ValueIter {
    index: usize,
    source: IterSource,
}

#[derive(Debug)]
enum IterSource {
    List(Rc<RefCell<Vec<Value>>>),
    Tuple(Rc<[Value]>),
    /// Byte offset into the string is kept in `ValueIter::index`.
    Str(Rc<str>),
    Range(Range),
    DictKeys { dict: Rc<RefCell<Dict>>, len: usize },
    Set { set: Rc<RefCell<Set>>, len: usize },
}

impl ValueIter {
    /// Creates an iterator for `value`, or fails with `TypeError` if it is not iterable.
    ///
    /// Iterator values are handled by the caller: iterating an iterator yields itself.
    pub fn new(value: &Value) -> RunResult<Self> {
        let source = match value {
            Value::List(list) => IterSource::List(list.clone()),
            Value::Tuple(items) => IterSource::Tuple(items.clone()),
            Value::Str(s) => IterSource::Str(s.clone()),
            Value::Range(range) => IterSource::Range(*range),
            Value::Dict(dict) => IterSource::DictKeys {
                len: dict.borrow().len(),
                dict: dict.clone(),
            },
            Value::Set(set) => IterSource::Set {
                len: set.borrow().len(),
                set: set.clone(),
            },
            other => return Err(RunError::not_iterable(other.type_name())),
        };
        Ok(Self { index: 0, source })
    }

    /// Returns an iterator value for `value`: iterators are returned as-is, iterables are wrapped.
    pub fn iter_value(value: Value) -> RunResult<Value> {
        match value {
            Value::Iterator(_) => Ok(value),
            other => Ok(Value::Iterator(Rc::new(RefCell::new(Self::new(&other)?)))),
        }
    }

    /// Advances the iterator; `Ok(None)` signals exhaustion.
    pub fn next_value(&mut self) -> RunResult<Option<Value>> {
        let item = match &self.source {
            IterSource::List(list) => list.borrow().get(self.index).cloned(),
            IterSource::Tuple(items) => items.get(self.index).cloned(),
            IterSource::Str(s) => {
                let Some(c) = s.get(self.index..).and_then(|rest| rest.chars().next()) else {
                    return Ok(None);
                };
                self.index += c.len_utf8();
                return Ok(Some(Value::str(c.to_string())));
            }
            IterSource::Range(range) => range.get(self.index).map(Value::Int),
            IterSource::DictKeys { dict, len } => {
                let dict = dict.borrow();
                if dict.len() != *len {
                    return Err(changed_size("dictionary"));
                }
                let key = dict.entry_at(self.index).map(|(k, _)| k.clone());
                key
            }
            IterSource::Set { set, len } => {
                let set = set.borrow();
                if set.len() != *len {
                    return Err(changed_size("set"));
                }
                let item = set.item_at(self.index).cloned();
                item
            }
        };
        if item.is_some() {
            self.index += 1;
        }
        Ok(item)
    }

    /// Drains the remaining items into a vector.
    pub fn collect_values(mut self) -> RunResult<Vec<Value>> {
        let mut out = Vec::new();
        while let Some(item) = self.next_value()? {
            out.push(item);
        }
        Ok(out)
    }
}

fn changed_size(what: &str) -> RunError {
    RunError::runtime_error(format!("{what} changed size during iteration"))
}

/// Materialises any iterable (including a live iterator) into a vector.
pub(crate) fn collect_iterable(value: &Value) -> RunResult<Vec<Value>> {
    match value {
        Value::List(list) => Ok(list.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        Value::Iterator(iter) => {
            let mut iter = iter.borrow_mut();
            let mut out = Vec::new();
            while let Some(item) = iter.next_value()? {
                out.push(item);
            }
            Ok(out)
        }
        other => ValueIter::new(other)?.collect_values(),
    }
}
