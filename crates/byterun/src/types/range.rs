//! Lazily evaluated integer ranges.

use std::fmt;

use crate::exception_private::{RunError, RunResult};

/// Immutable arithmetic progression produced by the `range` builtin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: i64,
    pub stop: i64,
    pub step: i64,
}

impl Range {
    /// Creates a range, rejecting a zero step.
    pub fn new(start: i64, stop: i64, step: i64) -> RunResult<Self> {
        if step == 0 {
            return Err(RunError::value_error("range() arg 3 must not be zero"));
        }
        Ok(Self { start, stop, step })
    }

    #[must_use]
    pub fn from_stop(stop: i64) -> Self {
        Self { start: 0, stop, step: 1 }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        let (lo, hi, step) = if self.step > 0 {
            (i128::from(self.start), i128::from(self.stop), i128::from(self.step))
        } else {
            (i128::from(self.stop), i128::from(self.start), -i128::from(self.step))
        };
        if lo >= hi {
            0
        } else {
            usize::try_from((hi - lo - 1) / step + 1).unwrap_or(usize::MAX)
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index` (already normalised to `0..len`).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<i64> {
        if index >= self.len() {
            return None;
        }
        let offset = i64::try_from(index).ok()?.checked_mul(self.step)?;
        self.start.checked_add(offset)
    }

    #[must_use]
    pub fn contains(&self, value: i64) -> bool {
        let in_bounds = if self.step > 0 {
            value >= self.start && value < self.stop
        } else {
            value <= self.start && value > self.stop
        };
        in_bounds && (i128::from(value) - i128::from(self.start)) % i128::from(self.step) == 0
    }

    /// Two ranges are equal when they produce the same sequence.
    pub(crate) fn py_eq(&self, other: &Self) -> bool {
        let len = self.len();
        len == other.len() && (len == 0 || (self.start == other.start && (len == 1 || self.step == other.step)))
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "range({}, {})", self.start, self.stop)
        } else {
            write!(f, "range({}, {}, {})", self.start, self.stop, self.step)
        }
    }
}
