//! Opcode definitions.
//!
//! Bytecode is stored as raw `Vec<u8>`. The `Opcode` enum is a pure discriminant with no data;
//! operands are fetched separately from the byte stream.
//!
//! # Operand Encoding
//!
//! Every instruction is one opcode byte, followed by a 2-byte little-endian operand when
//! [`Opcode::operand_kind`] is anything but [`OperandKind::None`]. `JumpRel` operands are signed
//! (`i16`) and relative to the start of the next instruction; all other operands are unsigned.

use strum::{Display, FromRepr, IntoStaticStr};

/// Opcode discriminant - just identifies the instruction type.
///
/// With `#[repr(u8)]`, each opcode is exactly 1 byte. Uses `strum::FromRepr` for byte-to-opcode
/// conversion.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr, Display, IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Opcode {
    // === Stack Operations (no operand) ===
    /// No operation.
    Nop,
    /// Discard top of stack.
    PopTop,
    /// Duplicate top of stack.
    DupTop,
    /// Duplicate the top two: [a, b] -> [a, b, a, b].
    DupTopTwo,
    /// Swap top two: [a, b] -> [b, a].
    RotTwo,
    /// Rotate top three: [a, b, c] -> [c, a, b].
    RotThree,

    // === Constants ===
    /// Push constant from pool. Operand: const index.
    LoadConst,

    // === Variables ===
    /// Push name resolved locals -> globals -> builtins. Operand: name index.
    LoadName,
    /// Pop and bind in locals. Operand: name index.
    StoreName,
    /// Remove from locals. Operand: name index.
    DeleteName,
    /// Push name resolved globals -> builtins. Operand: name index.
    LoadGlobal,
    /// Pop and bind in globals. Operand: name index.
    StoreGlobal,
    /// Remove from globals. Operand: name index.
    DeleteGlobal,
    /// Push fast local. Operand: varnames index.
    LoadFast,
    /// Pop and bind fast local. Operand: varnames index.
    StoreFast,
    /// Unbind fast local. Operand: varnames index.
    DeleteFast,
    /// Push the content of a cell. Operand: cell index (cellvars, then freevars).
    LoadDeref,
    /// Pop into a cell. Operand: cell index.
    StoreDeref,
    /// Empty a cell. Operand: cell index.
    DeleteDeref,
    /// Push the cell itself (for `MAKE_FUNCTION` closures). Operand: cell index.
    LoadClosure,

    // === Unary Operations (no operand) ===
    /// Logical not: not a.
    UnaryNot,
    /// Negation: -a.
    UnaryNegative,
    /// Positive: +a.
    UnaryPositive,
    /// Bitwise invert: ~a.
    UnaryInvert,

    // === Binary Operations (no operand) ===
    BinaryAdd,
    BinarySubtract,
    BinaryMultiply,
    BinaryFloorDivide,
    BinaryTrueDivide,
    BinaryModulo,
    BinaryPower,
    BinaryLshift,
    BinaryRshift,
    BinaryAnd,
    BinaryOr,
    BinaryXor,
    /// a[b]: pop index, pop obj, push result.
    BinarySubscr,

    // === In-place Operations (no operand) ===
    InplaceAdd,
    InplaceSubtract,
    InplaceMultiply,
    InplaceFloorDivide,
    InplaceTrueDivide,
    InplaceModulo,
    InplacePower,
    InplaceLshift,
    InplaceRshift,
    InplaceAnd,
    InplaceOr,
    InplaceXor,

    // === Comparison ===
    /// Pop b, pop a, push `a <op> b`. Operand: index into [`CompareOp`].
    CompareOp,

    // === Collections ===
    /// Pop n items, build list. Operand: count.
    BuildList,
    /// Pop n items, build tuple. Operand: count.
    BuildTuple,
    /// Pop n items, build set. Operand: count.
    BuildSet,
    /// Pop n key/value pairs (key pushed first), build dict. Operand: count.
    BuildMap,
    /// [map, value, key] -> [map] after `map[key] = value`.
    StoreMap,
    /// Pop value, append it to the list at stack depth n (1 = new TOS). Operand: n.
    ListAppend,
    /// Pop a sequence of exactly n items, push them so the first ends on top. Operand: n.
    UnpackSequence,
    /// [value, obj, key] -> [] after `obj[key] = value`.
    StoreSubscr,
    /// [obj, key] -> [] after `del obj[key]`.
    DeleteSubscr,

    // === Attributes ===
    /// Pop obj, push obj.attr. Operand: name index.
    LoadAttr,
    /// [value, obj] -> [] after `obj.attr = value`. Operand: name index.
    StoreAttr,
    /// Pop obj, delete obj.attr. Operand: name index.
    DeleteAttr,
    /// Pop obj, push the bound attribute for a following `CALL_METHOD`. Operand: name index.
    LoadMethod,

    // === Functions ===
    /// Create a function object. Operand: flags (see [`MakeFunctionFlags`]).
    MakeFunction,
    /// Push the builtin `__build_class__`, which the host must provide.
    LoadBuildClass,
    /// Call with n positional args: [callable, args...]. Operand: argc.
    CallFunction,
    /// Call with keywords: [callable, args..., kwvalues..., names-tuple]. Operand: argc.
    CallFunctionKw,
    /// Call with an args sequence and optional kwargs dict. Operand: flags (bit 0: kwargs).
    CallFunctionEx,
    /// Call the value produced by `LOAD_METHOD` with n positional args. Operand: argc.
    CallMethod,
    /// Return TOS from the current frame.
    ReturnValue,

    // === Control Flow ===
    /// Unconditional relative jump. Operand: i16 offset.
    JumpForward,
    /// Unconditional jump. Operand: target offset.
    JumpAbsolute,
    /// Pop TOS, jump if truthy. Operand: target offset.
    PopJumpIfTrue,
    /// Pop TOS, jump if falsy. Operand: target offset.
    PopJumpIfFalse,
    /// Jump if TOS truthy (keep), else pop. Operand: target offset.
    JumpIfTrueOrPop,
    /// Jump if TOS falsy (keep), else pop. Operand: target offset.
    JumpIfFalseOrPop,

    // === Iteration ===
    /// Replace TOS with an iterator over it.
    GetIter,
    /// Advance the iterator on TOS or pop it and jump. Operand: i16 offset.
    ForIter,

    // === Imports ===
    /// [level, fromlist] -> [module] via the builtin `__import__`. Operand: name index.
    ImportName,
    /// Push TOS.attr, keeping the module on the stack. Operand: name index.
    ImportFrom,

    // === Output ===
    /// Pop TOS and write `str(TOS)` to the print writer.
    PrintItem,
    /// Write a newline to the print writer.
    PrintNewline,

    // === Exceptions ===
    /// Raise an exception. Operand: argument count (0-2).
    RaiseVarargs,
}

/// How the 2-byte operand of an instruction is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// No operand bytes follow the opcode.
    None,
    /// Index into the constant pool.
    Const,
    /// Index into the name table.
    Name,
    /// Index into the local-variable name table.
    Local,
    /// Index into the cell space (cellvars, then freevars).
    Deref,
    /// Signed offset relative to the next instruction.
    JumpRel,
    /// Absolute instruction offset.
    JumpAbs,
    /// Counts and flags.
    Raw,
}

impl Opcode {
    /// Operand class of the instruction.
    #[must_use]
    pub fn operand_kind(self) -> OperandKind {
        match self {
            Self::LoadConst => OperandKind::Const,
            Self::LoadName
            | Self::StoreName
            | Self::DeleteName
            | Self::LoadGlobal
            | Self::StoreGlobal
            | Self::DeleteGlobal
            | Self::LoadAttr
            | Self::StoreAttr
            | Self::DeleteAttr
            | Self::LoadMethod
            | Self::ImportName
            | Self::ImportFrom => OperandKind::Name,
            Self::LoadFast | Self::StoreFast | Self::DeleteFast => OperandKind::Local,
            Self::LoadDeref | Self::StoreDeref | Self::DeleteDeref | Self::LoadClosure => OperandKind::Deref,
            Self::JumpForward | Self::ForIter => OperandKind::JumpRel,
            Self::JumpAbsolute
            | Self::PopJumpIfTrue
            | Self::PopJumpIfFalse
            | Self::JumpIfTrueOrPop
            | Self::JumpIfFalseOrPop => OperandKind::JumpAbs,
            Self::CompareOp
            | Self::BuildList
            | Self::BuildTuple
            | Self::BuildSet
            | Self::BuildMap
            | Self::ListAppend
            | Self::UnpackSequence
            | Self::MakeFunction
            | Self::CallFunction
            | Self::CallFunctionKw
            | Self::CallFunctionEx
            | Self::CallMethod
            | Self::RaiseVarargs => OperandKind::Raw,
            _ => OperandKind::None,
        }
    }

    /// Encoded size of the instruction in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        if self.operand_kind() == OperandKind::None {
            1
        } else {
            3
        }
    }

    /// Binary operator table.
    #[must_use]
    pub fn binary_op(self) -> Option<BinaryOp> {
        Some(match self {
            Self::BinaryAdd => BinaryOp::Add,
            Self::BinarySubtract => BinaryOp::Sub,
            Self::BinaryMultiply => BinaryOp::Mul,
            Self::BinaryFloorDivide => BinaryOp::FloorDiv,
            Self::BinaryTrueDivide => BinaryOp::TrueDiv,
            Self::BinaryModulo => BinaryOp::Mod,
            Self::BinaryPower => BinaryOp::Pow,
            Self::BinaryLshift => BinaryOp::LShift,
            Self::BinaryRshift => BinaryOp::RShift,
            Self::BinaryAnd => BinaryOp::And,
            Self::BinaryOr => BinaryOp::Or,
            Self::BinaryXor => BinaryOp::Xor,
            Self::BinarySubscr => BinaryOp::Subscr,
            _ => return None,
        })
    }

    /// In-place operator table; same operators as [`Opcode::binary_op`] minus subscript.
    #[must_use]
    pub fn inplace_op(self) -> Option<BinaryOp> {
        Some(match self {
            Self::InplaceAdd => BinaryOp::Add,
            Self::InplaceSubtract => BinaryOp::Sub,
            Self::InplaceMultiply => BinaryOp::Mul,
            Self::InplaceFloorDivide => BinaryOp::FloorDiv,
            Self::InplaceTrueDivide => BinaryOp::TrueDiv,
            Self::InplaceModulo => BinaryOp::Mod,
            Self::InplacePower => BinaryOp::Pow,
            Self::InplaceLshift => BinaryOp::LShift,
            Self::InplaceRshift => BinaryOp::RShift,
            Self::InplaceAnd => BinaryOp::And,
            Self::InplaceOr => BinaryOp::Or,
            Self::InplaceXor => BinaryOp::Xor,
            _ => return None,
        })
    }

    /// Unary operator table.
    #[must_use]
    pub fn unary_op(self) -> Option<UnaryOp> {
        Some(match self {
            Self::UnaryNot => UnaryOp::Not,
            Self::UnaryNegative => UnaryOp::Neg,
            Self::UnaryPositive => UnaryOp::Pos,
            Self::UnaryInvert => UnaryOp::Invert,
            _ => return None,
        })
    }
}

impl TryFrom<u8> for Opcode {
    type Error = InvalidOpcodeError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Self::from_repr(byte).ok_or(InvalidOpcodeError(byte))
    }
}

/// Error returned when attempting to convert an invalid byte to an Opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidOpcodeError(pub u8);

impl std::fmt::Display for InvalidOpcodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid opcode byte: {}", self.0)
    }
}

impl std::error::Error for InvalidOpcodeError {}

/// Operators shared by the binary and in-place families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    FloorDiv,
    TrueDiv,
    Mod,
    Pow,
    LShift,
    RShift,
    And,
    Or,
    Xor,
    Subscr,
}

impl BinaryOp {
    /// Operator symbol used in error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::FloorDiv => "//",
            Self::TrueDiv => "/",
            Self::Mod => "%",
            Self::Pow => "** or pow()",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Subscr => "[]",
        }
    }
}

/// Comparison table, indexed by the `COMPARE_OP` operand.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
    /// Exception-kind match: is the exception (class) on the left a subclass of the right?
    ExcMatch,
}

impl CompareOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::ExcMatch => "exception match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

/// Bits of the `MAKE_FUNCTION` operand, popped in descending bit order after name and code.
pub struct MakeFunctionFlags;

impl MakeFunctionFlags {
    pub const DEFAULTS: u16 = 0x01;
    pub const KW_DEFAULTS: u16 = 0x02;
    pub const ANNOTATIONS: u16 = 0x04;
    pub const CLOSURE: u16 = 0x08;
}
