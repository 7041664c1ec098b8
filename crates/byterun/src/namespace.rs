use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

/// A scope shared between frames: module globals, or a function's private locals.
pub type Scope = Rc<RefCell<Namespace>>;

/// Ordered name → value mapping backing a scope.
///
/// Insertion order is preserved so that iteration (e.g. when a host inspects globals after a run)
/// is deterministic.
#[derive(Debug, Default, Clone)]
pub struct Namespace(IndexMap<Rc<str>, Value, ahash::RandomState>);

impl Namespace {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the namespace into a shareable [`Scope`].
    #[must_use]
    pub fn into_scope(self) -> Scope {
        Rc::new(RefCell::new(self))
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<Rc<str>>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Removes a binding, returning the old value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.shift_remove(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Rc<str>, &Value)> {
        self.0.iter()
    }
}

impl<K: Into<Rc<str>>> FromIterator<(K, Value)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Key under which a fast local is stored.
///
/// Implicit comprehension arguments are named `.0`, `.1`, ...; they are kept as `implicit0`,
/// `implicit1`, ... so they can be addressed like any other name.
pub(crate) fn local_key(name: &Rc<str>) -> Rc<str> {
    match name.strip_prefix('.') {
        Some(rest) => format!("implicit{rest}").into(),
        None => name.clone(),
    }
}
