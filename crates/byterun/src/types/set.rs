use indexmap::IndexMap;

use crate::{
    exception_private::RunResult,
    value::{HashKey, Value},
};

/// Insertion-ordered set of hashable values.
#[derive(Debug, Default, Clone)]
pub struct Set(IndexMap<HashKey, Value, ahash::RandomState>);

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = Value>) -> RunResult<Self> {
        let mut set = Self::new();
        for value in values {
            set.add(value)?;
        }
        Ok(set)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn add(&mut self, value: Value) -> RunResult<()> {
        let key = HashKey::from_value(&value)?;
        self.0.entry(key).or_insert(value);
        Ok(())
    }

    pub fn contains(&self, value: &Value) -> RunResult<bool> {
        Ok(self.0.contains_key(&HashKey::from_value(value)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.0.values()
    }

    /// The item at insertion position `index`.
    #[must_use]
    pub fn item_at(&self, index: usize) -> Option<&Value> {
        self.0.get_index(index).map(|(_, v)| v)
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut out = self.clone();
        out.union_update(other);
        out
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self(self.0.iter().filter(|(k, _)| other.0.contains_key(*k)).map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.iter().filter(|(k, _)| !other.0.contains_key(*k)).map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    pub fn symmetric_difference(&self, other: &Self) -> Self {
        let mut out = self.difference(other);
        out.0.extend(other.difference(self).0);
        out
    }

    pub fn union_update(&mut self, other: &Self) {
        for (key, value) in &other.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    pub(crate) fn py_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.0.keys().all(|k| other.0.contains_key(k))
    }
}
