//! Dynamic values flowing through operand stacks, scopes and cells.

use std::{cell::RefCell, cmp::Ordering, fmt, fmt::Write, rc::Rc};

use ahash::AHashSet;

use crate::{
    builtins::NativeFunction,
    bytecode::Code,
    cell::Cell,
    exception_private::{RunError, RunResult},
    function::Function,
    host::HostObject,
    types::{BoundMethod, Dict, ExcClass, ExcInstance, Range, Set, ValueIter},
};

/// Primary value type of the engine.
///
/// Immediate variants (`None`, `Bool`, `Int`, `Float`, `Range`) are stored inline; everything else
/// is reference counted. Cloning a value never copies the underlying object: two clones of a
/// `List` are the same list, which is how assignment and argument passing alias composite values.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Tuple(Rc<[Value]>),
    List(Rc<RefCell<Vec<Value>>>),
    Dict(Rc<RefCell<Dict>>),
    Set(Rc<RefCell<Set>>),
    Range(Range),
    Iterator(Rc<RefCell<ValueIter>>),
    /// A closure cell pushed by `LOAD_CLOSURE` on its way into `MAKE_FUNCTION`.
    Cell(Cell),
    Code(Rc<Code>),
    Function(Rc<Function>),
    Native(Rc<NativeFunction>),
    BoundMethod(Rc<BoundMethod>),
    ExcClass(Rc<ExcClass>),
    Exception(Rc<ExcInstance>),
    /// Opaque host object; the engine only moves it around and delegates attribute access.
    Host(Rc<dyn HostObject>),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    pub fn tuple(items: Vec<Self>) -> Self {
        Self::Tuple(items.into())
    }

    pub fn list(items: Vec<Self>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(dict: Dict) -> Self {
        Self::Dict(Rc::new(RefCell::new(dict)))
    }

    pub fn set(set: Set) -> Self {
        Self::Set(Rc::new(RefCell::new(set)))
    }

    pub fn host(object: impl HostObject + 'static) -> Self {
        Self::Host(Rc::new(object))
    }

    /// Name of the value's type, as reported in error messages.
    #[must_use]
    pub fn type_name(&self) -> &str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Tuple(_) => "tuple",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Set(_) => "set",
            Self::Range(_) => "range",
            Self::Iterator(_) => "iterator",
            Self::Cell(_) => "cell",
            Self::Code(_) => "code",
            Self::Function(_) => "function",
            Self::Native(_) => "builtin_function_or_method",
            Self::BoundMethod(_) => "method",
            Self::ExcClass(_) => "type",
            Self::Exception(exc) => exc.class().name(),
            Self::Host(host) => host.type_name(),
        }
    }

    /// Truthiness as used by conditional jumps and `not`.
    #[must_use]
    pub fn py_bool(&self) -> bool {
        match self {
            Self::None => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Tuple(items) => !items.is_empty(),
            Self::List(items) => !items.borrow().is_empty(),
            Self::Dict(dict) => !dict.borrow().is_empty(),
            Self::Set(set) => !set.borrow().is_empty(),
            Self::Range(range) => range.len() > 0,
            Self::Host(host) => host.py_bool(),
            _ => true,
        }
    }

    /// Identity comparison (`is`).
    ///
    /// Reference-counted values are identical when they share an allocation. Immediates have no
    /// identity of their own and compare by value and type, so `1 is 1` holds but `1 is True`
    /// does not.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Range(a), Self::Range(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => Rc::ptr_eq(a, b),
            (Self::Cell(a), Self::Cell(b)) => a.ptr_eq(b),
            _ => match (self.identity(), other.identity()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Address of the shared allocation for values with identity semantics.
    pub(crate) fn identity(&self) -> Option<usize> {
        fn addr<T: ?Sized>(rc: &Rc<T>) -> usize {
            Rc::as_ptr(rc).cast::<()>() as usize
        }
        match self {
            Self::Str(rc) => Some(addr(rc)),
            Self::Tuple(rc) => Some(addr(rc)),
            Self::List(rc) => Some(addr(rc)),
            Self::Dict(rc) => Some(addr(rc)),
            Self::Set(rc) => Some(addr(rc)),
            Self::Iterator(rc) => Some(addr(rc)),
            Self::Cell(cell) => Some(cell.addr()),
            Self::Code(rc) => Some(addr(rc)),
            Self::Function(rc) => Some(addr(rc)),
            Self::Native(rc) => Some(addr(rc)),
            Self::BoundMethod(rc) => Some(addr(rc)),
            Self::ExcClass(rc) => Some(addr(rc)),
            Self::Exception(rc) => Some(addr(rc)),
            Self::Host(rc) => Some(addr(rc)),
            Self::None | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::Range(_) => None,
        }
    }

    /// Value equality (`==`).
    ///
    /// Numbers compare across `bool`/`int`/`float`; sequences and mappings compare element-wise;
    /// everything else falls back to identity.
    #[must_use]
    pub fn py_eq(&self, other: &Self) -> bool {
        self.eq_guarded(other, &mut AHashSet::new())
    }

    /// Equality that tracks the container pairs currently being compared.
    ///
    /// A pair met again while its comparison is still in progress is treated as equal, so
    /// self-referencing containers terminate.
    pub(crate) fn eq_guarded(&self, other: &Self, in_progress: &mut AHashSet<(usize, usize)>) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.eq(b);
        }
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Tuple(a), Self::Tuple(b)) => seq_eq(a, b, in_progress),
            (Self::List(a), Self::List(b)) => {
                Rc::ptr_eq(a, b)
                    || self.nested_eq(other, in_progress, |seen| seq_eq(&a.borrow(), &b.borrow(), seen))
            }
            (Self::Dict(a), Self::Dict(b)) => {
                Rc::ptr_eq(a, b) || self.nested_eq(other, in_progress, |seen| a.borrow().py_eq(&b.borrow(), seen))
            }
            (Self::Set(a), Self::Set(b)) => Rc::ptr_eq(a, b) || a.borrow().py_eq(&b.borrow()),
            (Self::Range(a), Self::Range(b)) => a.py_eq(b),
            _ => self.is(other),
        }
    }

    fn nested_eq(
        &self,
        other: &Self,
        in_progress: &mut AHashSet<(usize, usize)>,
        compare: impl FnOnce(&mut AHashSet<(usize, usize)>) -> bool,
    ) -> bool {
        let (Some(a), Some(b)) = (self.identity(), other.identity()) else {
            return compare(in_progress);
        };
        if !in_progress.insert((a, b)) {
            return true;
        }
        let eq = compare(in_progress);
        in_progress.remove(&(a, b));
        eq
    }

    /// Ordering used by `<`, `<=`, `>`, `>=`; `None` when the operands are not orderable.
    pub(crate) fn py_cmp(&self, other: &Self) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(b);
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Tuple(a), Self::Tuple(b)) => seq_cmp(a, b),
            (Self::List(a), Self::List(b)) => seq_cmp(&a.borrow(), &b.borrow()),
            _ => None,
        }
    }

    pub(crate) fn as_number(&self) -> Option<Number> {
        match self {
            Self::Bool(b) => Some(Number::Int(i64::from(*b))),
            Self::Int(i) => Some(Number::Int(*i)),
            Self::Float(f) => Some(Number::Float(*f)),
            _ => None,
        }
    }

    /// Integer view used for indices, counts and shifts (`bool` counts as an integer).
    pub(crate) fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// `str()` of the value.
    #[must_use]
    pub fn py_str(&self) -> String {
        match self {
            Self::Str(s) => s.to_string(),
            Self::Exception(exc) => exc.message().unwrap_or_default(),
            _ => self.py_repr(),
        }
    }

    /// `repr()` of the value.
    #[must_use]
    pub fn py_repr(&self) -> String {
        let mut out = String::new();
        // writing to a String cannot fail
        let _ = self.write_repr(&mut out, &mut AHashSet::new());
        out
    }

    /// `seen` holds the identities of the lists and dicts being written; meeting one again
    /// writes `[...]` or `{...}`.
    fn write_repr(&self, f: &mut String, seen: &mut AHashSet<usize>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => f.write_str(&float_repr(*v)),
            Self::Str(s) => write_str_repr(f, s),
            Self::Tuple(items) => {
                f.write_char('(')?;
                write_items(f, items, seen)?;
                if items.len() == 1 {
                    f.write_char(',')?;
                }
                f.write_char(')')
            }
            Self::List(items) => {
                let id = Rc::as_ptr(items).cast::<()>() as usize;
                if !seen.insert(id) {
                    return f.write_str("[...]");
                }
                f.write_char('[')?;
                write_items(f, &items.borrow(), seen)?;
                seen.remove(&id);
                f.write_char(']')
            }
            Self::Dict(dict) => {
                let id = Rc::as_ptr(dict).cast::<()>() as usize;
                if !seen.insert(id) {
                    return f.write_str("{...}");
                }
                f.write_char('{')?;
                for (i, (key, value)) in dict.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    key.write_repr(f, seen)?;
                    f.write_str(": ")?;
                    value.write_repr(f, seen)?;
                }
                seen.remove(&id);
                f.write_char('}')
            }
            Self::Set(set) => {
                let set = set.borrow();
                if set.is_empty() {
                    return f.write_str("set()");
                }
                f.write_char('{')?;
                let items: Vec<Value> = set.iter().cloned().collect();
                write_items(f, &items, seen)?;
                f.write_char('}')
            }
            Self::Range(range) => write!(f, "{range}"),
            Self::Iterator(_) => f.write_str("<iterator object>"),
            Self::Cell(cell) => {
                if cell.is_empty() {
                    f.write_str("<cell: empty>")
                } else {
                    f.write_str("<cell>")
                }
            }
            Self::Code(code) => write!(f, "<code object {}>", code.name()),
            Self::Function(func) => write!(f, "<function {}>", func.name()),
            Self::Native(native) => write!(f, "<built-in function {}>", native.name()),
            Self::BoundMethod(method) => {
                write!(f, "<bound method {}.{}>", method.receiver().type_name(), method.name())
            }
            Self::ExcClass(class) => write!(f, "<class '{}'>", class.name()),
            Self::Exception(exc) => {
                write!(f, "{}(", exc.class().name())?;
                write_items(f, exc.args(), seen)?;
                f.write_char(')')
            }
            Self::Host(host) => f.write_str(&host.repr()),
        }
    }
}

fn write_items(f: &mut String, items: &[Value], seen: &mut AHashSet<usize>) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        item.write_repr(f, seen)?;
    }
    Ok(())
}

fn write_str_repr(f: &mut String, s: &str) -> fmt::Result {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    f.write_char(quote)?;
    for c in s.chars() {
        match c {
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

/// Formats a float the way the modeled language prints it: `1.0`, `0.5`, `1e+16`, `inf`.
pub(crate) fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_owned();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_owned();
    }
    let s = format!("{v:?}");
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => s,
    }
}

fn seq_eq(a: &[Value], b: &[Value], in_progress: &mut AHashSet<(usize, usize)>) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.eq_guarded(y, in_progress))
}

fn seq_cmp(a: &[Value], b: &[Value]) -> Option<Ordering> {
    for (x, y) in a.iter().zip(b) {
        if !x.py_eq(y) {
            return x.py_cmp(y);
        }
    }
    Some(a.len().cmp(&b.len()))
}

/// Numeric view of `bool`/`int`/`float` operands.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        }
    }

    /// Exact equality: an int equals a float only when the float is integral and holds that int.
    fn eq(self, other: Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(i), Self::Float(f)) | (Self::Float(f), Self::Int(i)) => integral_float(f) == Some(i),
        }
    }

    fn partial_cmp(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            (Self::Int(i), Self::Float(f)) => int_float_cmp(i, f),
            (Self::Float(f), Self::Int(i)) => int_float_cmp(i, f).map(Ordering::reverse),
        }
    }
}

/// 2**63 as a float; every finite float below it and at or above its negation fits an `i64`.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// The `i64` a float holds exactly, if any.
#[allow(clippy::cast_possible_truncation)]
fn integral_float(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f)).then(|| f as i64)
}

#[allow(clippy::cast_possible_truncation)]
fn int_float_cmp(i: i64, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    if f >= I64_BOUND {
        return Some(Ordering::Less);
    }
    if f < -I64_BOUND {
        return Some(Ordering::Greater);
    }
    let floor = f.floor() as i64;
    match i.cmp(&floor) {
        Ordering::Equal if f.fract() != 0.0 => Some(Ordering::Less),
        ordering => Some(ordering),
    }
}

/// Hashable projection of a value, used as the key of dicts and sets.
///
/// Keys that compare equal hash equal: `True`, `1` and `1.0` all map to `Int(1)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum HashKey {
    None,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Tuple(Vec<HashKey>),
    Range(i64, i64, i64),
    Identity(usize),
}

impl HashKey {
    pub fn from_value(value: &Value) -> RunResult<Self> {
        Ok(match value {
            Value::None => Self::None,
            Value::Bool(b) => Self::Int(i64::from(*b)),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => float_key(*f),
            Value::Str(s) => Self::Str(s.clone()),
            Value::Tuple(items) => Self::Tuple(items.iter().map(Self::from_value).collect::<RunResult<_>>()?),
            Value::Range(r) => Self::Range(r.start, r.stop, r.step),
            Value::List(_) | Value::Dict(_) | Value::Set(_) => {
                return Err(RunError::unhashable(value.type_name()));
            }
            other => match other.identity() {
                Some(addr) => Self::Identity(addr),
                None => return Err(RunError::unhashable(other.type_name())),
            },
        })
    }
}

fn float_key(f: f64) -> HashKey {
    match integral_float(f) {
        Some(i) => HashKey::Int(i),
        None => HashKey::Float(f.to_bits()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_matches_language_formatting() {
        assert_eq!(Value::Float(1.0).py_repr(), "1.0");
        assert_eq!(Value::Float(1e16).py_repr(), "1e+16");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).py_repr(), "(1,)");
        assert_eq!(Value::str("it's").py_repr(), "\"it's\"");
        assert_eq!(Value::list(vec![Value::None, Value::Bool(true)]).py_repr(), "[None, True]");
        assert_eq!(Value::str("x").py_str(), "x");
    }

    #[test]
    fn numeric_equality_crosses_types() {
        assert!(Value::Int(1).py_eq(&Value::Bool(true)));
        assert!(Value::Float(2.0).py_eq(&Value::Int(2)));
        assert!(!Value::Int(1).is(&Value::Bool(true)));
        assert_eq!(
            HashKey::from_value(&Value::Float(1.0)).unwrap(),
            HashKey::from_value(&Value::Bool(true)).unwrap()
        );
    }

    #[test]
    fn int_float_comparison_is_exact() {
        let big = (1i64 << 53) + 1;
        #[allow(clippy::cast_precision_loss)]
        let rounded = Value::Float((1i64 << 53) as f64);
        assert!(!Value::Int(big).py_eq(&rounded));
        assert_eq!(Value::Int(big).py_cmp(&rounded), Some(Ordering::Greater));
        assert_ne!(HashKey::from_value(&Value::Int(big)).unwrap(), HashKey::from_value(&rounded).unwrap());
        assert!(Value::Int(1 << 53).py_eq(&rounded));
        assert_eq!(Value::Int(2).py_cmp(&Value::Float(2.5)), Some(Ordering::Less));
        assert_eq!(Value::Float(-2.5).py_cmp(&Value::Int(-3)), Some(Ordering::Greater));
        assert_eq!(Value::Int(i64::MAX).py_cmp(&Value::Float(f64::INFINITY)), Some(Ordering::Less));
        assert_eq!(Value::Int(0).py_cmp(&Value::Float(f64::NAN)), None);
    }

    #[test]
    fn self_referencing_containers() {
        let list = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        assert_eq!(list.py_repr(), "[1, [...]]");
        assert_eq!(list.py_str(), "[1, [...]]");

        let other = Value::list(vec![Value::Int(1)]);
        if let Value::List(items) = &other {
            items.borrow_mut().push(other.clone());
        }
        assert!(list.py_eq(&other));

        let dict = Value::dict(Dict::new());
        if let Value::Dict(d) = &dict {
            d.borrow_mut().set(Value::str("me"), dict.clone()).unwrap();
        }
        assert_eq!(dict.py_repr(), "{'me': {...}}");

        // the same list twice is not a cycle
        let shared = Value::list(vec![]);
        let pair = Value::tuple(vec![shared.clone(), shared]);
        assert_eq!(pair.py_repr(), "([], [])");
    }

    #[test]
    fn aliasing_vs_equality() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        let c = Value::list(vec![Value::Int(1)]);
        assert!(a.is(&b));
        assert!(!a.is(&c));
        assert!(a.py_eq(&c));
        assert!(HashKey::from_value(&a).is_err());
    }

    #[test]
    fn tuple_ordering_is_lexicographic() {
        let a = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        let b = Value::tuple(vec![Value::Int(1), Value::Int(3)]);
        assert_eq!(a.py_cmp(&b), Some(Ordering::Less));
        assert_eq!(Value::Int(1).py_cmp(&Value::str("a")), None);
    }
}
