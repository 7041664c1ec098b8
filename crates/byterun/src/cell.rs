//! Closure cells.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::value::Value;

/// Shared mutable single-value slot used for closed-over variables.
///
/// Cloning a `Cell` clones the handle, not the slot: every clone observes writes made through any
/// other. A cell starts empty when the variable it backs has not been assigned yet.
#[derive(Clone, Default)]
pub struct Cell(Rc<RefCell<Option<Value>>>);

impl Cell {
    /// Creates an unassigned cell.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(value: Value) -> Self {
        Self(Rc::new(RefCell::new(Some(value))))
    }

    /// Returns the current content, or `None` if the cell is empty.
    #[must_use]
    pub fn get(&self) -> Option<Value> {
        self.0.borrow().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.borrow_mut() = Some(value);
    }

    /// Empties the cell, returning whether it held a value.
    pub fn clear(&self) -> bool {
        self.0.borrow_mut().take().is_some()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_none()
    }

    /// True if both handles refer to the same slot.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the slot may (indirectly) contain this cell, so never recurse into it
        if self.is_empty() {
            f.write_str("Cell(<empty>)")
        } else {
            f.write_str("Cell(..)")
        }
    }
}
