//! Arithmetic, subscript, comparison and unary primitives on [`Value`].
//!
//! Integers are 64-bit; results that do not fit raise `OverflowError` instead of being promoted.
//! Division and modulo follow floor semantics (`-7 // 2 == -4`, `-7 % 2 == 1`).

use std::{cmp::Ordering, rc::Rc};

use crate::{
    bytecode::{BinaryOp, CompareOp, UnaryOp},
    exception_private::{RunError, RunResult},
    types::{iter::collect_iterable, method::normalize_index, Range},
    value::{Number, Value},
};

const INT_OVERFLOW: &str = "integer result out of range";

/// Largest result, in bytes, that sequence repetition may allocate.
const MAX_REPEAT_BYTES: usize = 1 << 31;

impl Value {
    /// Applies a binary operator producing a new value.
    pub fn binary_op(&self, op: BinaryOp, rhs: &Self) -> RunResult<Self> {
        if op == BinaryOp::Subscr {
            return self.getitem(rhs);
        }
        if let (Some(a), Some(b)) = (self.as_number(), rhs.as_number()) {
            // bool op bool stays bool for the bitwise operators
            if let (Self::Bool(x), Self::Bool(y)) = (self, rhs) {
                match op {
                    BinaryOp::And => return Ok(Self::Bool(x & y)),
                    BinaryOp::Or => return Ok(Self::Bool(x | y)),
                    BinaryOp::Xor => return Ok(Self::Bool(x ^ y)),
                    _ => {}
                }
            }
            if let Some(result) = numeric_op(op, a, b)? {
                return Ok(result);
            }
            return Err(self.binary_type_error(op, rhs));
        }
        let result = match (op, self, rhs) {
            (BinaryOp::Add, Self::Str(a), Self::Str(b)) => Some(Self::str(format!("{a}{b}"))),
            (BinaryOp::Add, Self::Tuple(a), Self::Tuple(b)) => Some(Self::tuple(a.iter().chain(b.iter()).cloned().collect())),
            (BinaryOp::Add, Self::List(a), Self::List(b)) => {
                let mut items = a.borrow().clone();
                items.extend(b.borrow().iter().cloned());
                Some(Self::list(items))
            }
            (BinaryOp::Mul, seq, count) | (BinaryOp::Mul, count, seq) if count.as_int().is_some() => {
                let n = count.as_int().unwrap_or_default();
                repeat(seq, n)?
            }
            (BinaryOp::Sub, Self::Set(a), Self::Set(b)) => Some(Self::set(a.borrow().difference(&b.borrow()))),
            (BinaryOp::And, Self::Set(a), Self::Set(b)) => Some(Self::set(a.borrow().intersection(&b.borrow()))),
            (BinaryOp::Or, Self::Set(a), Self::Set(b)) => Some(Self::set(a.borrow().union(&b.borrow()))),
            (BinaryOp::Xor, Self::Set(a), Self::Set(b)) => {
                Some(Self::set(a.borrow().symmetric_difference(&b.borrow())))
            }
            (BinaryOp::Or, Self::Dict(a), Self::Dict(b)) => {
                let mut merged = a.borrow().clone();
                merged.update(&b.borrow());
                Some(Self::dict(merged))
            }
            _ => None,
        };
        result.ok_or_else(|| self.binary_type_error(op, rhs))
    }

    /// Applies an in-place operator.
    ///
    /// Mutable targets (list `+=`/`*=`, dict `|=`, set `|= &= ^= -=`) are updated and the same
    /// object is returned; anything else falls back to [`Value::binary_op`].
    pub fn inplace_op(&self, op: BinaryOp, rhs: &Self) -> RunResult<Self> {
        match (op, self, rhs) {
            (BinaryOp::Add, Self::List(list), other) => {
                let items = collect_iterable(other)?;
                list.borrow_mut().extend(items);
                Ok(self.clone())
            }
            (BinaryOp::Mul, Self::List(list), count) if count.as_int().is_some() => {
                let n = count.as_int().unwrap_or_default();
                let repeated = repeat_items(&list.borrow(), n)?;
                *list.borrow_mut() = repeated;
                Ok(self.clone())
            }
            (BinaryOp::Or, Self::Dict(a), Self::Dict(b)) => {
                let other = b.borrow().clone();
                a.borrow_mut().update(&other);
                Ok(self.clone())
            }
            (BinaryOp::Or | BinaryOp::And | BinaryOp::Xor | BinaryOp::Sub, Self::Set(a), Self::Set(b)) => {
                let updated = {
                    let (a, b) = (a.borrow(), b.borrow());
                    match op {
                        BinaryOp::Or => a.union(&b),
                        BinaryOp::And => a.intersection(&b),
                        BinaryOp::Xor => a.symmetric_difference(&b),
                        _ => a.difference(&b),
                    }
                };
                *a.borrow_mut() = updated;
                Ok(self.clone())
            }
            _ => self.binary_op(op, rhs),
        }
    }

    /// `self[index]`.
    pub fn getitem(&self, index: &Self) -> RunResult<Self> {
        match self {
            Self::List(items) => {
                let items = items.borrow();
                let i = sequence_index(self, index, items.len())?;
                Ok(items[i].clone())
            }
            Self::Tuple(items) => {
                let i = sequence_index(self, index, items.len())?;
                Ok(items[i].clone())
            }
            Self::Str(s) => {
                let count = s.chars().count();
                let i = sequence_index(self, index, count)?;
                Ok(s.chars().nth(i).map_or(Self::None, |c| Self::str(c.to_string())))
            }
            Self::Range(range) => {
                let i = sequence_index(self, index, range.len())?;
                range.get(i).map(Self::Int).ok_or_else(|| RunError::index_error("range object index out of range"))
            }
            Self::Dict(dict) => {
                let found = dict.borrow().get(index)?;
                found.ok_or_else(|| RunError::key_error(index.py_repr()))
            }
            other => Err(RunError::type_error(format!(
                "'{}' object is not subscriptable",
                other.type_name()
            ))),
        }
    }

    /// `self[index] = value`.
    pub fn setitem(&self, index: Self, value: Self) -> RunResult<()> {
        match self {
            Self::List(items) => {
                let len = items.borrow().len();
                let i = sequence_index(self, &index, len)?;
                items.borrow_mut()[i] = value;
                Ok(())
            }
            Self::Dict(dict) => dict.borrow_mut().set(index, value),
            other => Err(RunError::type_error(format!(
                "'{}' object does not support item assignment",
                other.type_name()
            ))),
        }
    }

    /// `del self[index]`.
    pub fn delitem(&self, index: &Self) -> RunResult<()> {
        match self {
            Self::List(items) => {
                let len = items.borrow().len();
                let i = sequence_index(self, index, len)?;
                items.borrow_mut().remove(i);
                Ok(())
            }
            Self::Dict(dict) => match dict.borrow_mut().remove(index)? {
                Some(_) => Ok(()),
                None => Err(RunError::key_error(index.py_repr())),
            },
            other => Err(RunError::type_error(format!(
                "'{}' object does not support item deletion",
                other.type_name()
            ))),
        }
    }

    /// `item in self`.
    pub fn contains(&self, item: &Self) -> RunResult<bool> {
        match self {
            Self::List(items) => Ok(items.borrow().iter().any(|v| v.py_eq(item))),
            Self::Tuple(items) => Ok(items.iter().any(|v| v.py_eq(item))),
            Self::Str(haystack) => match item {
                Self::Str(needle) => Ok(haystack.contains(&**needle)),
                other => Err(RunError::type_error(format!(
                    "'in <string>' requires string as left operand, not {}",
                    other.type_name()
                ))),
            },
            Self::Dict(dict) => dict.borrow().contains(item),
            Self::Set(set) => set.borrow().contains(item),
            Self::Range(range) => Ok(match item {
                Self::Float(f) => range_contains_float(range, *f),
                other => other.as_int().is_some_and(|i| range.contains(i)),
            }),
            Self::Iterator(iter) => {
                let mut iter = iter.borrow_mut();
                while let Some(v) = iter.next_value()? {
                    if v.py_eq(item) {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            other => Err(RunError::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Applies one entry of the comparison table.
    pub fn compare_op(&self, op: CompareOp, rhs: &Self) -> RunResult<Self> {
        let result = match op {
            CompareOp::Eq => self.py_eq(rhs),
            CompareOp::Ne => !self.py_eq(rhs),
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                let ordering = self
                    .py_cmp(rhs)
                    .ok_or_else(|| RunError::compare_type_error(op.symbol(), self.type_name(), rhs.type_name()))?;
                match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }
            }
            CompareOp::In => rhs.contains(self)?,
            CompareOp::NotIn => !rhs.contains(self)?,
            CompareOp::Is => self.is(rhs),
            CompareOp::IsNot => !self.is(rhs),
            CompareOp::ExcMatch => self.exception_matches(rhs)?,
        };
        Ok(Self::Bool(result))
    }

    /// Exception-kind match: `self` is an exception class or instance, `classes` a class or a
    /// tuple of classes.
    fn exception_matches(&self, classes: &Self) -> RunResult<bool> {
        let class = match self {
            Self::ExcClass(class) => class.clone(),
            Self::Exception(exc) => exc.class().clone(),
            other => {
                return Err(RunError::type_error(format!(
                    "'{}' is not an exception class",
                    other.type_name()
                )))
            }
        };
        let matches_one = |candidate: &Self| match candidate {
            Self::ExcClass(target) => Ok(class.is_subclass_of(target)),
            _ => Err(RunError::type_error(
                "catching classes that do not inherit from BaseException is not allowed",
            )),
        };
        match classes {
            Self::Tuple(items) => {
                for item in items.iter() {
                    if matches_one(item)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            single => matches_one(single),
        }
    }

    /// Applies a unary operator.
    pub fn unary_op(&self, op: UnaryOp) -> RunResult<Self> {
        let result = match (op, self) {
            (UnaryOp::Not, value) => Some(Self::Bool(!value.py_bool())),
            (UnaryOp::Neg, Self::Float(f)) => Some(Self::Float(-f)),
            (UnaryOp::Neg, value) => match value.as_int() {
                Some(i) => Some(Self::Int(i.checked_neg().ok_or_else(|| RunError::overflow(INT_OVERFLOW))?)),
                None => None,
            },
            (UnaryOp::Pos, Self::Float(f)) => Some(Self::Float(*f)),
            (UnaryOp::Pos, value) => value.as_int().map(Self::Int),
            (UnaryOp::Invert, value) => value.as_int().map(|i| Self::Int(!i)),
        };
        result.ok_or_else(|| {
            let symbol = match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Invert | UnaryOp::Not => "~",
            };
            RunError::unary_type_error(symbol, self.type_name())
        })
    }

    fn binary_type_error(&self, op: BinaryOp, rhs: &Self) -> RunError {
        RunError::binary_type_error(op.symbol(), self.type_name(), rhs.type_name())
    }
}

fn numeric_op(op: BinaryOp, a: Number, b: Number) -> RunResult<Option<Value>> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => int_op(op, x, y),
        _ => float_op(op, a.to_f64(), b.to_f64()),
    }
}

#[allow(clippy::cast_precision_loss)]
fn int_op(op: BinaryOp, x: i64, y: i64) -> RunResult<Option<Value>> {
    let overflow = || RunError::overflow(INT_OVERFLOW);
    let value = match op {
        BinaryOp::Add => x.checked_add(y).ok_or_else(overflow)?,
        BinaryOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
        BinaryOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
        BinaryOp::TrueDiv => {
            if y == 0 {
                return Err(RunError::zero_division("division by zero"));
            }
            return Ok(Some(Value::Float(x as f64 / y as f64)));
        }
        BinaryOp::FloorDiv => {
            if y == 0 {
                return Err(RunError::zero_division("integer division or modulo by zero"));
            }
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if (x % y != 0) && ((x < 0) != (y < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinaryOp::Mod => {
            if y == 0 {
                return Err(RunError::zero_division("integer division or modulo by zero"));
            }
            let r = x.checked_rem(y).unwrap_or(0);
            if r != 0 && ((r < 0) != (y < 0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if y < 0 {
                return float_op(op, x as f64, y as f64);
            }
            match (x, u32::try_from(y)) {
                (_, Ok(exp)) => x.checked_pow(exp).ok_or_else(overflow)?,
                (0 | 1, Err(_)) => x,
                (-1, Err(_)) if y % 2 == 0 => 1,
                (-1, Err(_)) => -1,
                (_, Err(_)) => return Err(overflow()),
            }
        }
        BinaryOp::LShift => {
            if y < 0 {
                return Err(RunError::value_error("negative shift count"));
            }
            if x == 0 {
                0
            } else {
                let shift = u32::try_from(y).ok().filter(|s| *s < 64).ok_or_else(overflow)?;
                let shifted = x << shift;
                if shifted >> shift != x {
                    return Err(overflow());
                }
                shifted
            }
        }
        BinaryOp::RShift => {
            if y < 0 {
                return Err(RunError::value_error("negative shift count"));
            }
            x >> y.min(63)
        }
        BinaryOp::And => x & y,
        BinaryOp::Or => x | y,
        BinaryOp::Xor => x ^ y,
        BinaryOp::Subscr => return Ok(None),
    };
    Ok(Some(Value::Int(value)))
}

fn float_op(op: BinaryOp, x: f64, y: f64) -> RunResult<Option<Value>> {
    let value = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::TrueDiv => {
            if y == 0.0 {
                return Err(RunError::zero_division("float division by zero"));
            }
            x / y
        }
        BinaryOp::FloorDiv => {
            if y == 0.0 {
                return Err(RunError::zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinaryOp::Mod => {
            if y == 0.0 {
                return Err(RunError::zero_division("float modulo"));
            }
            let r = x % y;
            if r != 0.0 && ((r < 0.0) != (y < 0.0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if x == 0.0 && y < 0.0 {
                return Err(RunError::zero_division("0.0 cannot be raised to a negative power"));
            }
            x.powf(y)
        }
        _ => return Ok(None),
    };
    Ok(Some(Value::Float(value)))
}

fn repeat(seq: &Value, n: i64) -> RunResult<Option<Value>> {
    Ok(match seq {
        Value::Str(s) => {
            let count = repeat_count(s.len(), 1, n)?;
            Some(Value::str(s.repeat(count)))
        }
        Value::List(items) => Some(Value::list(repeat_items(&items.borrow(), n)?)),
        Value::Tuple(items) => Some(Value::Tuple(Rc::from(repeat_items(items, n)?))),
        _ => None,
    })
}

fn repeat_items(items: &[Value], n: i64) -> RunResult<Vec<Value>> {
    let count = repeat_count(items.len(), size_of::<Value>(), n)?;
    Ok(items.iter().cloned().cycle().take(items.len() * count).collect())
}

/// Clamps a negative count to zero and rejects results larger than [`MAX_REPEAT_BYTES`].
fn repeat_count(len: usize, item_size: usize, n: i64) -> RunResult<usize> {
    if len == 0 {
        return Ok(0);
    }
    let count = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
    let fits = len
        .checked_mul(count)
        .and_then(|items| items.checked_mul(item_size))
        .is_some_and(|bytes| bytes <= MAX_REPEAT_BYTES);
    if fits {
        Ok(count)
    } else {
        Err(RunError::overflow("repeated sequence is too long"))
    }
}

fn sequence_index(seq: &Value, index: &Value, len: usize) -> RunResult<usize> {
    let Some(i) = index.as_int() else {
        return Err(RunError::type_error(format!(
            "{} indices must be integers, not {}",
            seq.type_name(),
            index.type_name()
        )));
    };
    normalize_index(i, len).ok_or_else(|| RunError::index_error(format!("{} index out of range", seq.type_name())))
}

#[allow(clippy::cast_possible_truncation)]
fn range_contains_float(range: &Range, f: f64) -> bool {
    f.fract() == 0.0 && range.contains(f as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(i: i64) -> Value {
        Value::Int(i)
    }

    #[test]
    fn floor_semantics() {
        assert!(matches!(int(-7).binary_op(BinaryOp::FloorDiv, &int(2)), Ok(Value::Int(-4))));
        assert!(matches!(int(-7).binary_op(BinaryOp::Mod, &int(2)), Ok(Value::Int(1))));
        assert!(matches!(int(7).binary_op(BinaryOp::Mod, &int(-2)), Ok(Value::Int(-1))));
        assert!(matches!(int(7).binary_op(BinaryOp::TrueDiv, &int(2)), Ok(Value::Float(f)) if f == 3.5));
    }

    #[test]
    fn zero_division_and_overflow() {
        let err = int(1).binary_op(BinaryOp::FloorDiv, &int(0)).unwrap_err();
        assert_eq!(err.exception().exc_type(), "ZeroDivisionError");
        let err = int(i64::MAX).binary_op(BinaryOp::Add, &int(1)).unwrap_err();
        assert_eq!(err.exception().exc_type(), "OverflowError");
        assert!(matches!(int(2).binary_op(BinaryOp::Pow, &int(-1)), Ok(Value::Float(f)) if f == 0.5));
    }

    #[test]
    fn pow_with_huge_exponent() {
        let huge = int(1 << 40);
        assert!(matches!(int(1).binary_op(BinaryOp::Pow, &huge), Ok(Value::Int(1))));
        assert!(matches!(int(0).binary_op(BinaryOp::Pow, &huge), Ok(Value::Int(0))));
        assert!(matches!(int(-1).binary_op(BinaryOp::Pow, &huge), Ok(Value::Int(1))));
        assert!(matches!(int(-1).binary_op(BinaryOp::Pow, &int((1 << 40) + 1)), Ok(Value::Int(-1))));
        let err = int(2).binary_op(BinaryOp::Pow, &huge).unwrap_err();
        assert_eq!(err.exception().exc_type(), "OverflowError");
    }

    #[test]
    fn oversized_repetition_is_an_overflow_error() {
        for seq in [Value::str("ab"), Value::list(vec![int(1)]), Value::tuple(vec![int(1)])] {
            let err = seq.binary_op(BinaryOp::Mul, &int(i64::MAX)).unwrap_err();
            assert_eq!(err.to_string(), "OverflowError: repeated sequence is too long");
        }
        let list = Value::list(vec![int(1), int(2)]);
        let err = list.inplace_op(BinaryOp::Mul, &int(1 << 40)).unwrap_err();
        assert_eq!(err.exception().exc_type(), "OverflowError");
        assert_eq!(list.py_repr(), "[1, 2]");

        // empty sequences and non-positive counts never allocate
        assert_eq!(Value::str("").binary_op(BinaryOp::Mul, &int(i64::MAX)).unwrap().py_str(), "");
        assert_eq!(int(-3).binary_op(BinaryOp::Mul, &Value::str("ab")).unwrap().py_str(), "");
    }

    #[test]
    fn mixed_type_error() {
        let err = int(1).binary_op(BinaryOp::Add, &Value::str("a")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "TypeError: unsupported operand type(s) for +: 'int' and 'str'"
        );
    }

    #[test]
    fn sequence_ops() {
        let joined = Value::str("ab").binary_op(BinaryOp::Mul, &int(2)).unwrap();
        assert_eq!(joined.py_str(), "abab");
        let list = Value::list(vec![int(1)]);
        let repeated = int(3).binary_op(BinaryOp::Mul, &list).unwrap();
        assert_eq!(repeated.py_repr(), "[1, 1, 1]");
        assert!(matches!(list.getitem(&int(-1)), Ok(Value::Int(1))));
        assert_eq!(list.getitem(&int(5)).unwrap_err().exception().exc_type(), "IndexError");
    }

    #[test]
    fn inplace_add_mutates_list() {
        let list = Value::list(vec![int(1)]);
        let alias = list.clone();
        let result = list.inplace_op(BinaryOp::Add, &Value::tuple(vec![int(2)])).unwrap();
        assert!(result.is(&alias));
        assert_eq!(alias.py_repr(), "[1, 2]");

        let a = int(1);
        let b = a.inplace_op(BinaryOp::Add, &int(1)).unwrap();
        assert!(matches!((a, b), (Value::Int(1), Value::Int(2))));
    }

    #[test]
    fn comparisons() {
        assert!(matches!(int(1).compare_op(CompareOp::Lt, &int(2)), Ok(Value::Bool(true))));
        let list = Value::list(vec![int(1), int(2)]);
        assert!(matches!(int(2).compare_op(CompareOp::In, &list), Ok(Value::Bool(true))));
        assert!(matches!(int(3).compare_op(CompareOp::NotIn, &list), Ok(Value::Bool(true))));
        assert!(int(1).compare_op(CompareOp::Lt, &Value::str("a")).is_err());
    }

    #[test]
    fn unary() {
        assert!(matches!(int(5).unary_op(UnaryOp::Neg), Ok(Value::Int(-5))));
        assert!(matches!(Value::Bool(true).unary_op(UnaryOp::Invert), Ok(Value::Int(-2))));
        assert!(matches!(Value::None.unary_op(UnaryOp::Not), Ok(Value::Bool(true))));
        assert!(Value::str("x").unary_op(UnaryOp::Neg).is_err());
    }
}
