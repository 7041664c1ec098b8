//! Bytecode representation and the virtual machine that executes it.
//!
//! # Module Structure
//!
//! - `op` - Opcode enum and the operator tables selected by operands
//! - `code` - Validated code objects and instruction decoding
//! - `builder` - CodeBuilder for assembling code objects with labels
//! - `vm` - Virtual machine for bytecode execution

mod builder;
pub(crate) mod code;
pub(crate) mod op;
pub(crate) mod vm;

pub use builder::{CodeBuilder, Label};
pub use code::{Code, CodeError, CodeFlags, CodeParts};
pub use op::{BinaryOp, CompareOp, InvalidOpcodeError, MakeFunctionFlags, Opcode, OperandKind, UnaryOp};
