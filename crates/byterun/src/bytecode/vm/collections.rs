//! Collection building and subscript helpers for the VM.

use super::Vm;
use crate::{
    exception_private::{RunError, RunResult},
    io::PrintWriter,
    resource::ResourceTracker,
    types::{iter::collect_iterable, Dict, Set},
    value::Value,
};

impl<T: ResourceTracker, P: PrintWriter> Vm<T, P> {
    /// Builds a list from the top n stack items.
    pub(super) fn build_list(&mut self, count: usize) -> RunResult<()> {
        let items = self.pop_n(count)?;
        self.push(Value::list(items));
        Ok(())
    }

    /// Builds a tuple from the top n stack items.
    pub(super) fn build_tuple(&mut self, count: usize) -> RunResult<()> {
        let items = self.pop_n(count)?;
        self.push(Value::tuple(items));
        Ok(())
    }

    /// Builds a set from the top n stack items; later duplicates are dropped.
    pub(super) fn build_set(&mut self, count: usize) -> RunResult<()> {
        let items = self.pop_n(count)?;
        let set = Set::from_values(items)?;
        self.push(Value::set(set));
        Ok(())
    }

    /// Builds a dict from the top 2n stack items, pushed as key, value pairs.
    pub(super) fn build_map(&mut self, count: usize) -> RunResult<()> {
        let len = count
            .checked_mul(2)
            .ok_or_else(|| RunError::invalid_code("BUILD_MAP count overflows"))?;
        let items = self.pop_n(len)?;
        let mut iter = items.into_iter();
        let mut dict = Dict::new();
        while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
            dict.set(key, value)?;
        }
        self.push(Value::dict(dict));
        Ok(())
    }

    /// `STORE_MAP`: [map, value, key] -> [map].
    pub(super) fn store_map(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let value = self.pop()?;
        match self.peek()? {
            Value::Dict(dict) => dict.borrow_mut().set(key, value),
            other => Err(RunError::invalid_code(format!(
                "STORE_MAP target is '{}', not a dict",
                other.type_name()
            ))),
        }
    }

    /// `LIST_APPEND n`: pops a value and appends it to the list n slots down (1 = the new TOS).
    pub(super) fn list_append(&mut self, depth: usize) -> RunResult<()> {
        let value = self.pop()?;
        let base = self.frame()?.stack_base;
        let index = self
            .stack
            .len()
            .checked_sub(depth)
            .filter(|index| depth > 0 && *index >= base)
            .ok_or_else(|| self.underflow())?;
        match &self.stack[index] {
            Value::List(list) => {
                list.borrow_mut().push(value);
                Ok(())
            }
            other => Err(RunError::invalid_code(format!(
                "LIST_APPEND target is '{}', not a list",
                other.type_name()
            ))),
        }
    }

    /// Pops an iterable of exactly n items and pushes them so the first item ends on top.
    pub(super) fn unpack_sequence(&mut self, count: usize) -> RunResult<()> {
        let seq = self.pop()?;
        let items = collect_iterable(&seq)?;
        if items.len() < count {
            return Err(RunError::value_error(format!(
                "not enough values to unpack (expected {count}, got {})",
                items.len()
            )));
        }
        if items.len() > count {
            return Err(RunError::value_error(format!(
                "too many values to unpack (expected {count})"
            )));
        }
        self.stack.extend(items.into_iter().rev());
        Ok(())
    }

    /// `STORE_SUBSCR`: [value, obj, key] -> [] after `obj[key] = value`.
    pub(super) fn store_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let obj = self.pop()?;
        let value = self.pop()?;
        obj.setitem(key, value)
    }

    /// `DELETE_SUBSCR`: [obj, key] -> [].
    pub(super) fn delete_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let obj = self.pop()?;
        obj.delitem(&key)
    }
}
