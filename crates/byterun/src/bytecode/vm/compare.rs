//! `COMPARE_OP` dispatch.

use super::Vm;
use crate::{
    bytecode::op::CompareOp,
    exception_private::{RunError, RunResult},
    io::PrintWriter,
    resource::ResourceTracker,
};

impl<T: ResourceTracker, P: PrintWriter> Vm<T, P> {
    /// Pops b then a and pushes `a <op> b`, where `op` is looked up by the operand.
    pub(super) fn compare(&mut self, arg: usize) -> RunResult<()> {
        let op = u8::try_from(arg)
            .ok()
            .and_then(CompareOp::from_repr)
            .ok_or_else(|| RunError::invalid_code(format!("invalid comparison operand {arg}")))?;
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = lhs.compare_op(op, &rhs)?;
        self.push(result);
        Ok(())
    }
}
