use std::fmt;

use crate::{
    exception_public::{Fault, FaultKind, TraceEntry},
    resource::ResourceError,
};

/// Result type alias for operations that can produce a runtime error.
pub type RunResult<T> = Result<T, RunError>;

/// An exception in flight: kind, exception type name and message.
///
/// Carries no traceback; frames are appended by the VM while it unwinds.
#[derive(Debug, Clone, PartialEq)]
pub struct SimpleException {
    kind: FaultKind,
    exc_type: String,
    message: Option<String>,
}

impl SimpleException {
    pub fn new(kind: FaultKind, exc_type: impl Into<String>, message: Option<String>) -> Self {
        Self {
            kind,
            exc_type: exc_type.into(),
            message,
        }
    }

    pub fn new_msg(kind: FaultKind, exc_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, exc_type, Some(message.into()))
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn exc_type(&self) -> &str {
        &self.exc_type
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub(crate) fn into_fault(self, traceback: Vec<TraceEntry>) -> Fault {
        Fault::new(self.kind, self.exc_type, self.message, traceback)
    }
}

impl fmt::Display for SimpleException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.exc_type),
            None => f.write_str(&self.exc_type),
        }
    }
}

/// Error produced while executing an instruction.
///
/// `Exc` covers every runtime condition of the executing program. `Defect` marks an
/// engine-integrity violation (unsupported opcode, stack underflow, malformed code); it unwinds the
/// same way but can never be confused with a program-level condition.
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    Exc(SimpleException),
    Defect(SimpleException),
}

impl RunError {
    pub fn exception(&self) -> &SimpleException {
        match self {
            Self::Exc(exc) | Self::Defect(exc) => exc,
        }
    }

    pub fn kind(&self) -> FaultKind {
        self.exception().kind()
    }

    pub(crate) fn into_fault(self, traceback: Vec<TraceEntry>) -> Fault {
        match self {
            Self::Exc(exc) | Self::Defect(exc) => exc.into_fault(traceback),
        }
    }

    fn runtime(kind: FaultKind, exc_type: &str, message: String) -> Self {
        Self::Exc(SimpleException::new_msg(kind, exc_type, message))
    }

    fn defect(kind: FaultKind, message: String) -> Self {
        Self::Defect(SimpleException::new_msg(kind, kind.to_string(), message))
    }

    // --- scope resolution ---

    pub(crate) fn undefined_name(name: &str) -> Self {
        Self::runtime(FaultKind::UndefinedName, "NameError", format!("name '{name}' is not defined"))
    }

    pub(crate) fn unbound_local(name: &str) -> Self {
        Self::runtime(
            FaultKind::UnboundLocal,
            "UnboundLocalError",
            format!("local variable '{name}' referenced before assignment"),
        )
    }

    pub(crate) fn unbound_free(name: &str) -> Self {
        Self::runtime(
            FaultKind::UndefinedName,
            "NameError",
            format!("free variable '{name}' referenced before assignment in enclosing scope"),
        )
    }

    // --- calls ---

    pub(crate) fn call_error(message: impl Into<String>) -> Self {
        Self::runtime(FaultKind::CallError, "TypeError", message.into())
    }

    pub(crate) fn not_callable(type_name: &str) -> Self {
        Self::call_error(format!("'{type_name}' object is not callable"))
    }

    pub(crate) fn stack_overflow(limit: usize) -> Self {
        Self::runtime(
            FaultKind::StackOverflow,
            "RecursionError",
            format!("maximum recursion depth exceeded ({limit} frames)"),
        )
    }

    // --- primitives ---

    pub(crate) fn type_error(message: impl Into<String>) -> Self {
        Self::runtime(FaultKind::OperatorError, "TypeError", message.into())
    }

    pub(crate) fn binary_type_error(op: &str, lhs: &str, rhs: &str) -> Self {
        Self::type_error(format!(
            "unsupported operand type(s) for {op}: '{lhs}' and '{rhs}'"
        ))
    }

    pub(crate) fn unary_type_error(op: &str, operand: &str) -> Self {
        Self::type_error(format!("bad operand type for unary {op}: '{operand}'"))
    }

    pub(crate) fn compare_type_error(op: &str, lhs: &str, rhs: &str) -> Self {
        Self::type_error(format!(
            "'{op}' not supported between instances of '{lhs}' and '{rhs}'"
        ))
    }

    pub(crate) fn not_iterable(type_name: &str) -> Self {
        Self::type_error(format!("'{type_name}' object is not iterable"))
    }

    pub(crate) fn zero_division(message: &str) -> Self {
        Self::runtime(FaultKind::OperatorError, "ZeroDivisionError", message.to_owned())
    }

    pub(crate) fn overflow(message: &str) -> Self {
        Self::runtime(FaultKind::OperatorError, "OverflowError", message.to_owned())
    }

    pub(crate) fn value_error(message: impl Into<String>) -> Self {
        Self::runtime(FaultKind::OperatorError, "ValueError", message.into())
    }

    pub(crate) fn index_error(message: impl Into<String>) -> Self {
        Self::runtime(FaultKind::OperatorError, "IndexError", message.into())
    }

    pub(crate) fn key_error(key_repr: String) -> Self {
        Self::runtime(FaultKind::OperatorError, "KeyError", key_repr)
    }

    pub(crate) fn attribute_error(type_name: &str, attr: &str) -> Self {
        Self::runtime(
            FaultKind::OperatorError,
            "AttributeError",
            format!("'{type_name}' object has no attribute '{attr}'"),
        )
    }

    pub(crate) fn runtime_error(message: impl Into<String>) -> Self {
        Self::runtime(FaultKind::OperatorError, "RuntimeError", message.into())
    }

    pub(crate) fn unhashable(type_name: &str) -> Self {
        Self::type_error(format!("unhashable type: '{type_name}'"))
    }

    // --- explicit raise ---

    /// Error raised by host code (native functions, host objects).
    ///
    /// Surfaces as a [`FaultKind::Raised`] fault carrying `exc_type` and `message`.
    pub fn host(exc_type: &str, message: impl Into<String>) -> Self {
        Self::raised(exc_type, Some(message.into()))
    }

    pub(crate) fn raised(exc_type: &str, message: Option<String>) -> Self {
        Self::Exc(SimpleException::new(FaultKind::Raised, exc_type, message))
    }

    // --- engine defects ---

    pub(crate) fn stack_underflow(frame: &str) -> Self {
        Self::defect(FaultKind::StackUnderflow, format!("operand stack underflow in {frame}"))
    }

    pub(crate) fn unsupported_opcode(byte: u8) -> Self {
        Self::defect(FaultKind::UnsupportedOpcode, format!("unsupported opcode byte {byte}"))
    }

    pub(crate) fn invalid_code(message: impl Into<String>) -> Self {
        Self::defect(FaultKind::InvalidCode, message.into())
    }
}

impl From<ResourceError> for RunError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::Recursion { limit, .. } => Self::stack_overflow(limit),
            other => Self::Exc(SimpleException::new_msg(
                FaultKind::Interrupted,
                "Interrupted",
                other.to_string(),
            )),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.exception().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defects_use_kind_as_type_name() {
        let err = RunError::stack_underflow("f");
        assert!(matches!(err, RunError::Defect(_)));
        assert_eq!(err.exception().exc_type(), "StackUnderflow");
        assert!(err.kind().is_defect());
    }

    #[test]
    fn recursion_resource_error_becomes_stack_overflow() {
        let err: RunError = ResourceError::Recursion { limit: 3, depth: 4 }.into();
        assert_eq!(err.kind(), FaultKind::StackOverflow);
        assert_eq!(err.exception().exc_type(), "RecursionError");
    }

    #[test]
    fn step_budget_becomes_interrupted() {
        let err: RunError = ResourceError::Steps { limit: 10, steps: 11 }.into();
        assert_eq!(err.kind(), FaultKind::Interrupted);
        assert!(err.to_string().contains("step limit exceeded"));
    }
}
