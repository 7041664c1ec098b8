//! Public fault type returned to the embedding host.
//!
//! A [`Fault`] is what an unhandled condition becomes once it has unwound every frame of the
//! current `run`/`invoke`: its kind, the exception type name, an optional message and the
//! traceback collected while frames were popped (innermost first).

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// Classification of every condition the engine can surface.
///
/// Runtime conditions (`UndefinedName` through `Interrupted`) are produced by the executing
/// program or by host-imposed limits. The remaining kinds are engine-integrity defects: the code
/// object and the engine disagree, which no program can recover from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum FaultKind {
    /// A name is absent from locals, globals and builtins (load or delete).
    UndefinedName,
    /// A fast local (or cell variable) was read before being assigned on this path.
    UnboundLocal,
    /// Argument binding failed: too many/few arguments or an unexpected keyword.
    CallError,
    /// A binary, unary, in-place, comparison, subscript or attribute primitive failed.
    OperatorError,
    /// The call stack grew past the configured maximum depth.
    StackOverflow,
    /// The program raised an exception explicitly.
    Raised,
    /// The host's resource tracker refused to let execution continue.
    Interrupted,
    /// The decoder met an opcode with no handler.
    UnsupportedOpcode,
    /// An instruction popped more values than its frame had pushed.
    StackUnderflow,
    /// The code object violates a structural invariant (bad jump, bad operand, missing cell).
    InvalidCode,
}

impl FaultKind {
    /// Returns true for engine/codegen mismatches as opposed to runtime conditions.
    #[must_use]
    pub fn is_defect(self) -> bool {
        matches!(self, Self::UnsupportedOpcode | Self::StackUnderflow | Self::InvalidCode)
    }
}

/// One traceback entry: the frame's display name and the offset of the instruction it was
/// executing (for caller frames, the offset of the call instruction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub frame: String,
    pub offset: usize,
}

impl TraceEntry {
    #[must_use]
    pub fn new(frame: impl Into<String>, offset: usize) -> Self {
        Self {
            frame: frame.into(),
            offset,
        }
    }
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in {} at offset {}", self.frame, self.offset)
    }
}

/// Terminal error result of `Engine::run` and `Engine::invoke`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    kind: FaultKind,
    exc_type: String,
    message: Option<String>,
    traceback: Vec<TraceEntry>,
}

impl Fault {
    #[must_use]
    pub fn new(kind: FaultKind, exc_type: impl Into<String>, message: Option<String>, traceback: Vec<TraceEntry>) -> Self {
        Self {
            kind,
            exc_type: exc_type.into(),
            message,
            traceback,
        }
    }

    #[must_use]
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Name of the exception type, e.g. `ZeroDivisionError`, or a user class name for raised
    /// exceptions.
    #[must_use]
    pub fn exc_type(&self) -> &str {
        &self.exc_type
    }

    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Frames the fault passed through while unwinding, innermost first.
    #[must_use]
    pub fn traceback(&self) -> &[TraceEntry] {
        &self.traceback
    }

    /// Frame names of the traceback, innermost first.
    #[must_use]
    pub fn frame_names(&self) -> Vec<&str> {
        self.traceback.iter().map(|entry| entry.frame.as_str()).collect()
    }

    /// One-line summary in the `Type: message` form.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.message {
            Some(msg) if !msg.is_empty() => format!("{}: {msg}", self.exc_type),
            _ => self.exc_type.clone(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.traceback.is_empty() {
            writeln!(f, "Traceback (innermost first):")?;
            for entry in &self.traceback {
                writeln!(f, "  {entry}")?;
            }
        }
        write!(f, "{}", self.summary())
    }
}

impl std::error::Error for Fault {}
