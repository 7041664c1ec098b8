//! Binary, in-place and unary operation helpers for the VM.

use super::Vm;
use crate::{
    bytecode::op::Opcode,
    exception_private::{RunError, RunResult},
    io::PrintWriter,
    resource::ResourceTracker,
};

impl<T: ResourceTracker, P: PrintWriter> Vm<T, P> {
    /// Pops rhs then lhs and pushes `lhs <op> rhs`.
    pub(super) fn binary(&mut self, opcode: Opcode) -> RunResult<()> {
        let op = opcode
            .binary_op()
            .ok_or_else(|| RunError::invalid_code(format!("{opcode} is not a binary operation")))?;
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = lhs.binary_op(op, &rhs)?;
        self.push(result);
        Ok(())
    }

    /// Like [`Vm::binary`], but mutable containers are updated in place and pushed back.
    pub(super) fn inplace(&mut self, opcode: Opcode) -> RunResult<()> {
        let op = opcode
            .inplace_op()
            .ok_or_else(|| RunError::invalid_code(format!("{opcode} is not an in-place operation")))?;
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = lhs.inplace_op(op, &rhs)?;
        self.push(result);
        Ok(())
    }

    pub(super) fn unary(&mut self, opcode: Opcode) -> RunResult<()> {
        let op = opcode
            .unary_op()
            .ok_or_else(|| RunError::invalid_code(format!("{opcode} is not a unary operation")))?;
        let operand = self.pop()?;
        let result = operand.unary_op(op)?;
        self.push(result);
        Ok(())
    }
}
