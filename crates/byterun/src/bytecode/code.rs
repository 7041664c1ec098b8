//! Code objects: an instruction stream plus the tables its operands index into.

use std::{collections::BTreeSet, fmt, ops::BitOr, rc::Rc};

use crate::{
    bytecode::op::{CompareOp, Opcode, OperandKind},
    exception_private::{RunError, RunResult},
    exception_public::Fault,
    value::Value,
};

/// Signature flags of a code object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CodeFlags(u8);

impl CodeFlags {
    /// The parameter after the keyword-only ones collects excess positional arguments.
    pub const VARARGS: Self = Self(0x04);
    /// The last parameter collects unmatched keyword arguments.
    pub const VARKEYWORDS: Self = Self(0x08);

    #[must_use]
    pub fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for CodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Raw parts of a code object, as produced by a front end.
///
/// Turned into a [`Code`] by [`Code::new`], which validates every instruction.
#[derive(Debug, Clone, Default)]
pub struct CodeParts {
    pub name: String,
    pub bytes: Vec<u8>,
    pub consts: Vec<Value>,
    pub names: Vec<Rc<str>>,
    pub varnames: Vec<Rc<str>>,
    pub cellvars: Vec<Rc<str>>,
    pub freevars: Vec<Rc<str>>,
    pub arg_count: usize,
    pub kwonly_arg_count: usize,
    pub flags: CodeFlags,
}

/// An immutable, validated compiled unit.
///
/// Parameters are the first `arg_count + kwonly_arg_count` entries of `varnames`, followed by the
/// `*args` name when [`CodeFlags::VARARGS`] is set and the `**kwargs` name when
/// [`CodeFlags::VARKEYWORDS`] is set.
#[derive(Debug)]
pub struct Code {
    name: Rc<str>,
    bytes: Vec<u8>,
    consts: Vec<Value>,
    names: Vec<Rc<str>>,
    varnames: Vec<Rc<str>>,
    cellvars: Vec<Rc<str>>,
    freevars: Vec<Rc<str>>,
    arg_count: usize,
    kwonly_arg_count: usize,
    flags: CodeFlags,
}

/// A decoded instruction. Relative jumps are already resolved to absolute targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Instruction {
    pub opcode: Opcode,
    pub arg: usize,
    pub next: usize,
}

impl Code {
    /// Validates `parts` and builds the code object.
    ///
    /// Checks that every opcode byte is known, no instruction is truncated, every operand indexes
    /// into its table, every jump lands on an instruction boundary (or the end of the stream) and
    /// the parameter counts fit in `varnames`.
    pub fn new(parts: CodeParts) -> Result<Self, CodeError> {
        let code = Self {
            name: parts.name.into(),
            bytes: parts.bytes,
            consts: parts.consts,
            names: parts.names,
            varnames: parts.varnames,
            cellvars: parts.cellvars,
            freevars: parts.freevars,
            arg_count: parts.arg_count,
            kwonly_arg_count: parts.kwonly_arg_count,
            flags: parts.flags,
        };
        code.validate()?;
        Ok(code)
    }

    fn validate(&self) -> Result<(), CodeError> {
        let params = self.param_count();
        if params > self.varnames.len() {
            return Err(CodeError::InvalidSignature {
                params,
                varnames: self.varnames.len(),
            });
        }

        let mut boundaries = BTreeSet::new();
        let mut jumps = Vec::new();
        let mut ip = 0;
        while ip < self.bytes.len() {
            boundaries.insert(ip);
            let (opcode, raw, next) = decode_raw(&self.bytes, ip)?;
            let limit = match opcode.operand_kind() {
                OperandKind::Const => Some(self.consts.len()),
                OperandKind::Name => Some(self.names.len()),
                OperandKind::Local => Some(self.varnames.len()),
                OperandKind::Deref => Some(self.cell_count()),
                OperandKind::Raw if opcode == Opcode::CompareOp => Some(CompareOp::ExcMatch as usize + 1),
                OperandKind::JumpRel => {
                    jumps.push((ip, jump_target(next, raw)));
                    None
                }
                OperandKind::JumpAbs => {
                    jumps.push((ip, i64::from(raw)));
                    None
                }
                OperandKind::Raw | OperandKind::None => None,
            };
            if let Some(limit) = limit {
                if usize::from(raw) >= limit {
                    return Err(CodeError::OperandOutOfRange {
                        offset: ip,
                        opcode,
                        operand: raw,
                        limit,
                    });
                }
            }
            ip = next;
        }

        for (offset, target) in jumps {
            let valid = usize::try_from(target)
                .is_ok_and(|t| t == self.bytes.len() || boundaries.contains(&t));
            if !valid {
                return Err(CodeError::InvalidJump { offset, target });
            }
        }
        Ok(())
    }

    /// Decodes the instruction starting at `ip`.
    pub(crate) fn decode(&self, ip: usize) -> RunResult<Instruction> {
        let (opcode, raw, next) = decode_raw(&self.bytes, ip)?;
        let arg = match opcode.operand_kind() {
            OperandKind::JumpRel => usize::try_from(jump_target(next, raw))
                .map_err(|_| RunError::invalid_code(format!("jump at {ip} leaves the code object")))?,
            _ => usize::from(raw),
        };
        Ok(Instruction { opcode, arg, next })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_rc(&self) -> &Rc<str> {
        &self.name
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn consts(&self) -> &[Value] {
        &self.consts
    }

    #[must_use]
    pub fn names(&self) -> &[Rc<str>] {
        &self.names
    }

    #[must_use]
    pub fn varnames(&self) -> &[Rc<str>] {
        &self.varnames
    }

    #[must_use]
    pub fn cellvars(&self) -> &[Rc<str>] {
        &self.cellvars
    }

    #[must_use]
    pub fn freevars(&self) -> &[Rc<str>] {
        &self.freevars
    }

    #[must_use]
    pub fn arg_count(&self) -> usize {
        self.arg_count
    }

    #[must_use]
    pub fn kwonly_arg_count(&self) -> usize {
        self.kwonly_arg_count
    }

    #[must_use]
    pub fn flags(&self) -> CodeFlags {
        self.flags
    }

    /// Number of `varnames` entries that are parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.arg_count
            + self.kwonly_arg_count
            + usize::from(self.flags.contains(CodeFlags::VARARGS))
            + usize::from(self.flags.contains(CodeFlags::VARKEYWORDS))
    }

    /// Size of the cell index space: cellvars, then freevars.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cellvars.len() + self.freevars.len()
    }

    /// Name of the variable behind cell index `index`, and whether it is a free variable.
    pub(crate) fn cell_name(&self, index: usize) -> (&Rc<str>, bool) {
        match self.cellvars.get(index) {
            Some(name) => (name, false),
            None => (&self.freevars[index - self.cellvars.len()], true),
        }
    }

    pub(crate) fn positional_names(&self) -> &[Rc<str>] {
        &self.varnames[..self.arg_count]
    }

    pub(crate) fn kwonly_names(&self) -> &[Rc<str>] {
        &self.varnames[self.arg_count..self.arg_count + self.kwonly_arg_count]
    }

    pub(crate) fn varargs_name(&self) -> Option<&Rc<str>> {
        self.flags
            .contains(CodeFlags::VARARGS)
            .then(|| &self.varnames[self.arg_count + self.kwonly_arg_count])
    }

    pub(crate) fn varkw_name(&self) -> Option<&Rc<str>> {
        self.flags
            .contains(CodeFlags::VARKEYWORDS)
            .then(|| &self.varnames[self.param_count() - 1])
    }
}

fn decode_raw(bytes: &[u8], ip: usize) -> Result<(Opcode, u16, usize), CodeError> {
    let byte = bytes[ip];
    let opcode = Opcode::try_from(byte).map_err(|_| CodeError::UnsupportedOpcode { offset: ip, byte })?;
    if opcode.operand_kind() == OperandKind::None {
        return Ok((opcode, 0, ip + 1));
    }
    match bytes.get(ip + 1..ip + 3) {
        Some(&[lo, hi]) => Ok((opcode, u16::from_le_bytes([lo, hi]), ip + 3)),
        _ => Err(CodeError::TruncatedInstruction { offset: ip, opcode }),
    }
}

fn jump_target(next: usize, raw: u16) -> i64 {
    let delta = i16::from_le_bytes(raw.to_le_bytes());
    i64::try_from(next).unwrap_or(i64::MAX) + i64::from(delta)
}

/// A code object failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    UnsupportedOpcode {
        offset: usize,
        byte: u8,
    },
    TruncatedInstruction {
        offset: usize,
        opcode: Opcode,
    },
    OperandOutOfRange {
        offset: usize,
        opcode: Opcode,
        operand: u16,
        limit: usize,
    },
    InvalidJump {
        offset: usize,
        target: i64,
    },
    InvalidSignature {
        params: usize,
        varnames: usize,
    },
    /// Builder only: a local or cell operand named a variable that was never declared.
    UndeclaredVariable(String),
    /// Builder only: a jump referenced a label that was never bound.
    UnboundLabel,
}

impl fmt::Display for CodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedOpcode { offset, byte } => write!(f, "unsupported opcode byte {byte} at offset {offset}"),
            Self::TruncatedInstruction { offset, opcode } => {
                write!(f, "{opcode} at offset {offset} is missing its operand")
            }
            Self::OperandOutOfRange {
                offset,
                opcode,
                operand,
                limit,
            } => write!(
                f,
                "{opcode} at offset {offset} has operand {operand}, table holds {limit} entries"
            ),
            Self::InvalidJump { offset, target } => {
                write!(f, "jump at offset {offset} targets {target}, which is not an instruction boundary")
            }
            Self::InvalidSignature { params, varnames } => {
                write!(f, "code declares {params} parameters but has only {varnames} local names")
            }
            Self::UndeclaredVariable(name) => write!(f, "variable '{name}' is not declared as a cell or free variable"),
            Self::UnboundLabel => f.write_str("jump to a label that was never bound"),
        }
    }
}

impl std::error::Error for CodeError {}

impl From<CodeError> for RunError {
    fn from(err: CodeError) -> Self {
        match err {
            CodeError::UnsupportedOpcode { byte, .. } => Self::unsupported_opcode(byte),
            other => Self::invalid_code(other.to_string()),
        }
    }
}

impl From<CodeError> for Fault {
    fn from(err: CodeError) -> Self {
        RunError::from(err).into_fault(Vec::new())
    }
}
