//! Raising and unwinding.
//!
//! The instruction set has no handler blocks, so every error propagates to the entry point: the
//! frames it passes through are popped and recorded in the fault's traceback.

use log::debug;

use super::Vm;
use crate::{
    exception_private::{RunError, RunResult},
    exception_public::{Fault, TraceEntry},
    io::PrintWriter,
    resource::ResourceTracker,
    value::Value,
};

impl<T: ResourceTracker, P: PrintWriter> Vm<T, P> {
    /// `RAISE_VARARGS argc`: returns the error to raise.
    ///
    /// - 0: re-raise, which always fails since nothing can be active.
    /// - 1: raise TOS.
    /// - 2: raise TOS1; the cause on TOS is discarded.
    pub(super) fn raise_varargs(&mut self, argc: usize) -> RunResult<RunError> {
        match argc {
            0 => Ok(RunError::runtime_error("No active exception to reraise")),
            1 => {
                let exc = self.pop()?;
                Ok(make_raise(&exc))
            }
            2 => {
                self.pop()?;
                let exc = self.pop()?;
                Ok(make_raise(&exc))
            }
            _ => Err(RunError::invalid_code(format!("bad RAISE_VARARGS oparg {argc}"))),
        }
    }

    /// Pops every frame above `base`, innermost first, and turns `err` into a fault carrying
    /// their names and current offsets.
    pub(super) fn unwind(&mut self, err: RunError, base: usize) -> Fault {
        let mut traceback = Vec::with_capacity(self.frames.len().saturating_sub(base));
        while self.frames.len() > base {
            if let Some(frame) = self.pop_frame() {
                traceback.push(TraceEntry::new(&*frame.name, frame.instruction_ip));
            }
        }
        let fault = err.into_fault(traceback);
        debug!("execution faulted: {}", fault.summary());
        fault
    }
}

/// Converts a raised value into the error it signals.
fn make_raise(exc: &Value) -> RunError {
    match exc {
        Value::ExcClass(class) => RunError::raised(class.name(), None),
        Value::Exception(inst) => RunError::raised(inst.class().name(), inst.message()),
        _ => RunError::type_error("exceptions must derive from BaseException"),
    }
}
