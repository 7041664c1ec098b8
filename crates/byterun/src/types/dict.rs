use std::rc::Rc;

use ahash::AHashSet;
use indexmap::IndexMap;

use crate::{
    exception_private::{RunError, RunResult},
    value::{HashKey, Value},
};

/// Insertion-ordered mapping.
///
/// Entries are keyed by the hashable projection of the key ([`HashKey`]) and keep the original
/// key value alongside the mapped value, so `d[1]` and `d[True]` address the same entry while
/// iteration still yields the key object that was first inserted.
#[derive(Debug, Default, Clone)]
pub struct Dict(IndexMap<HashKey, (Value, Value), ahash::RandomState>);

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dict from pairs; later duplicates overwrite earlier values.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (Value, Value)>) -> RunResult<Self> {
        let mut dict = Self::new();
        for (key, value) in pairs {
            dict.set(key, value)?;
        }
        Ok(dict)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Looks up `key`; fails only if the key is unhashable.
    pub fn get(&self, key: &Value) -> RunResult<Option<Value>> {
        let hash_key = HashKey::from_value(key)?;
        Ok(self.0.get(&hash_key).map(|(_, v)| v.clone()))
    }

    /// Looks up a string key.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<Value> {
        self.0.get(&HashKey::Str(key.into())).map(|(_, v)| v.clone())
    }

    pub fn contains(&self, key: &Value) -> RunResult<bool> {
        Ok(self.0.contains_key(&HashKey::from_value(key)?))
    }

    /// Inserts or replaces the value for `key`. An existing entry keeps its original key object
    /// and position.
    pub fn set(&mut self, key: Value, value: Value) -> RunResult<()> {
        let hash_key = HashKey::from_value(&key)?;
        match self.0.get_mut(&hash_key) {
            Some(entry) => entry.1 = value,
            None => {
                self.0.insert(hash_key, (key, value));
            }
        }
        Ok(())
    }

    /// Removes `key`, returning its value. Remaining entries keep their order.
    pub fn remove(&mut self, key: &Value) -> RunResult<Option<Value>> {
        let hash_key = HashKey::from_value(key)?;
        Ok(self.0.shift_remove(&hash_key).map(|(_, v)| v))
    }

    /// Copies every entry of `other` into `self` (`dict |= other`).
    pub fn update(&mut self, other: &Self) {
        for (hash_key, (key, value)) in &other.0 {
            match self.0.get_mut(hash_key) {
                Some(entry) => entry.1 = value.clone(),
                None => {
                    self.0.insert(hash_key.clone(), (key.clone(), value.clone()));
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.0.values().map(|(k, v)| (k, v))
    }

    /// The entry at insertion position `index`.
    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<(&Value, &Value)> {
        self.0.get_index(index).map(|(_, (k, v))| (k, v))
    }

    pub fn keys(&self) -> Vec<Value> {
        self.0.values().map(|(k, _)| k.clone()).collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.values().map(|(_, v)| v.clone()).collect()
    }

    /// `(key, value)` tuples in insertion order.
    pub fn items(&self) -> Vec<Value> {
        self.0
            .values()
            .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
            .collect()
    }

    /// Entries as `(name, value)` pairs, requiring every key to be a string.
    ///
    /// Used where a dict stands for keyword arguments; `what` names the dict in the error.
    pub fn str_keyed_pairs(&self, what: &str) -> RunResult<Vec<(Rc<str>, Value)>> {
        self.iter()
            .map(|(key, value)| match key {
                Value::Str(name) => Ok((name.clone(), value.clone())),
                other => Err(RunError::type_error(format!(
                    "{what} keys must be strings, not {}",
                    other.type_name()
                ))),
            })
            .collect()
    }

    pub(crate) fn py_eq(&self, other: &Self, in_progress: &mut AHashSet<(usize, usize)>) -> bool {
        self.len() == other.len()
            && self.0.iter().all(|(hash_key, (_, value))| {
                other
                    .0
                    .get(hash_key)
                    .is_some_and(|(_, other_value)| value.eq_guarded(other_value, in_progress))
            })
    }
}
