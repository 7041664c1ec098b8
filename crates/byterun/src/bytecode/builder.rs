//! Assembler for code objects.
//!
//! `CodeBuilder` emits instructions, interns constants and names, and resolves labels, local
//! slots and cell indices when [`CodeBuilder::build`] is called. Parameters are laid out at the
//! front of `varnames` no matter when they are declared.

use std::rc::Rc;

use crate::{
    bytecode::{
        code::{Code, CodeError, CodeFlags, CodeParts},
        op::{Opcode, OperandKind},
    },
    value::Value,
};

/// A jump target created by [`CodeBuilder::new_label`] and placed by [`CodeBuilder::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug)]
enum Fixup {
    Local(Rc<str>),
    Deref(Rc<str>),
    Jump(Label),
}

/// Builder for [`Code`] objects.
#[derive(Debug)]
pub struct CodeBuilder {
    name: String,
    bytes: Vec<u8>,
    consts: Vec<Value>,
    names: Vec<Rc<str>>,
    params: Vec<Rc<str>>,
    kwonly: Vec<Rc<str>>,
    varargs: Option<Rc<str>>,
    varkw: Option<Rc<str>>,
    locals: Vec<Rc<str>>,
    cellvars: Vec<Rc<str>>,
    freevars: Vec<Rc<str>>,
    labels: Vec<Option<usize>>,
    fixups: Vec<(usize, Opcode, Fixup)>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bytes: Vec::new(),
            consts: Vec::new(),
            names: Vec::new(),
            params: Vec::new(),
            kwonly: Vec::new(),
            varargs: None,
            varkw: None,
            locals: Vec::new(),
            cellvars: Vec::new(),
            freevars: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
        }
    }

    /// Declares positional-or-keyword parameters, in order.
    #[must_use]
    pub fn params(mut self, names: &[&str]) -> Self {
        self.params.extend(names.iter().map(|n| Rc::from(*n)));
        self
    }

    /// Declares keyword-only parameters, in order.
    #[must_use]
    pub fn kwonly_params(mut self, names: &[&str]) -> Self {
        self.kwonly.extend(names.iter().map(|n| Rc::from(*n)));
        self
    }

    /// Declares the `*args` parameter.
    #[must_use]
    pub fn varargs(mut self, name: &str) -> Self {
        self.varargs = Some(name.into());
        self
    }

    /// Declares the `**kwargs` parameter.
    #[must_use]
    pub fn varkw(mut self, name: &str) -> Self {
        self.varkw = Some(name.into());
        self
    }

    /// Declares variables of this code that inner functions close over.
    #[must_use]
    pub fn cellvars(mut self, names: &[&str]) -> Self {
        self.cellvars.extend(names.iter().map(|n| Rc::from(*n)));
        self
    }

    /// Declares variables captured from an enclosing function, in closure order.
    #[must_use]
    pub fn freevars(mut self, names: &[&str]) -> Self {
        self.freevars.extend(names.iter().map(|n| Rc::from(*n)));
        self
    }

    /// Current end of the instruction stream.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.bytes.len()
    }

    /// Adds `value` to the constant pool, returning its index.
    pub fn add_const(&mut self, value: Value) -> u16 {
        self.consts.push(value);
        index_u16(self.consts.len() - 1)
    }

    fn name_index(&mut self, name: &str) -> u16 {
        let index = match self.names.iter().position(|n| &**n == name) {
            Some(index) => index,
            None => {
                self.names.push(name.into());
                self.names.len() - 1
            }
        };
        index_u16(index)
    }

    /// Emits an instruction without operand.
    pub fn emit(&mut self, opcode: Opcode) -> &mut Self {
        debug_assert_eq!(opcode.operand_kind(), OperandKind::None, "{opcode} takes an operand");
        self.bytes.push(opcode as u8);
        self
    }

    /// Emits an instruction with a raw operand.
    pub fn emit_arg(&mut self, opcode: Opcode, arg: u16) -> &mut Self {
        self.bytes.push(opcode as u8);
        self.bytes.extend_from_slice(&arg.to_le_bytes());
        self
    }

    /// `LOAD_CONST value`.
    pub fn load_const(&mut self, value: Value) -> &mut Self {
        let index = self.add_const(value);
        self.emit_arg(Opcode::LoadConst, index)
    }

    /// Emits an instruction whose operand indexes the name table.
    pub fn emit_name(&mut self, opcode: Opcode, name: &str) -> &mut Self {
        let index = self.name_index(name);
        self.emit_arg(opcode, index)
    }

    /// Emits an instruction whose operand is a local slot, resolved at build time.
    pub fn emit_local(&mut self, opcode: Opcode, name: &str) -> &mut Self {
        self.fixups.push((self.bytes.len(), opcode, Fixup::Local(name.into())));
        self.emit_arg(opcode, 0)
    }

    /// Emits an instruction whose operand is a cell index, resolved at build time.
    pub fn emit_deref(&mut self, opcode: Opcode, name: &str) -> &mut Self {
        self.fixups.push((self.bytes.len(), opcode, Fixup::Deref(name.into())));
        self.emit_arg(opcode, 0)
    }

    /// Emits a jump to `label`; relative or absolute encoding follows the opcode.
    pub fn emit_jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        self.fixups.push((self.bytes.len(), opcode, Fixup::Jump(label)));
        self.emit_arg(opcode, 0)
    }

    #[must_use]
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Places `label` at the current offset.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.bytes.len());
        self
    }

    /// Resolves all pending operands and validates the result.
    pub fn build(self) -> Result<Code, CodeError> {
        let Self {
            name,
            mut bytes,
            consts,
            names,
            params,
            kwonly,
            varargs,
            varkw,
            mut locals,
            cellvars,
            freevars,
            labels,
            fixups,
        } = self;

        let arg_count = params.len();
        let kwonly_arg_count = kwonly.len();
        let mut flags = CodeFlags::empty();
        if varargs.is_some() {
            flags = flags | CodeFlags::VARARGS;
        }
        if varkw.is_some() {
            flags = flags | CodeFlags::VARKEYWORDS;
        }
        let mut varnames: Vec<Rc<str>> = params.into_iter().chain(kwonly).chain(varargs).chain(varkw).collect();
        for (_, _, fixup) in &fixups {
            if let Fixup::Local(name) = fixup {
                if !varnames.contains(name) && !locals.contains(name) {
                    locals.push(name.clone());
                }
            }
        }
        varnames.append(&mut locals);

        for (pos, opcode, fixup) in fixups {
            let operand = match fixup {
                Fixup::Local(name) => index_u16(varnames.iter().position(|n| *n == name).unwrap_or_default()),
                Fixup::Deref(name) => {
                    let index = cellvars
                        .iter()
                        .chain(&freevars)
                        .position(|n| *n == name)
                        .ok_or_else(|| CodeError::UndeclaredVariable(name.to_string()))?;
                    index_u16(index)
                }
                Fixup::Jump(label) => {
                    let target = labels[label.0].ok_or(CodeError::UnboundLabel)?;
                    jump_operand(opcode, pos, target)?
                }
            };
            bytes[pos + 1..pos + 3].copy_from_slice(&operand.to_le_bytes());
        }

        Code::new(CodeParts {
            name,
            bytes,
            consts,
            names,
            varnames,
            cellvars,
            freevars,
            arg_count,
            kwonly_arg_count,
            flags,
        })
    }
}

fn jump_operand(opcode: Opcode, pos: usize, target: usize) -> Result<u16, CodeError> {
    let out_of_range = || CodeError::InvalidJump {
        offset: pos,
        target: i64::try_from(target).unwrap_or(i64::MAX),
    };
    if opcode.operand_kind() == OperandKind::JumpRel {
        let next = i64::try_from(pos + opcode.size()).map_err(|_| out_of_range())?;
        let target = i64::try_from(target).map_err(|_| out_of_range())?;
        let delta = i16::try_from(target - next).map_err(|_| out_of_range())?;
        Ok(u16::from_le_bytes(delta.to_le_bytes()))
    } else {
        u16::try_from(target).map_err(|_| out_of_range())
    }
}

fn index_u16(index: usize) -> u16 {
    u16::try_from(index).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_come_first_in_varnames() {
        let mut b = CodeBuilder::new("f").params(&["a"]).kwonly_params(&["k"]).varargs("rest");
        b.emit_local(Opcode::LoadFast, "tmp");
        b.emit_local(Opcode::StoreFast, "a");
        b.emit(Opcode::ReturnValue);
        let code = b.build().unwrap();
        let names: Vec<&str> = code.varnames().iter().map(|n| &**n).collect();
        assert_eq!(names, ["a", "k", "rest", "tmp"]);
        // LOAD_FAST tmp, STORE_FAST a
        assert_eq!(code.bytes()[1], 3);
        assert_eq!(code.bytes()[4], 0);
    }

    #[test]
    fn labels_resolve_forward_and_backward() {
        let mut b = CodeBuilder::new("loop");
        let top = b.new_label();
        let end = b.new_label();
        b.bind(top);
        b.emit_jump(Opcode::JumpForward, end);
        b.emit_jump(Opcode::JumpAbsolute, top);
        b.bind(end);
        b.emit(Opcode::Nop);
        let code = b.build().unwrap();
        assert_eq!(code.decode(0).unwrap().arg, 6);
        assert_eq!(code.decode(3).unwrap().arg, 0);
    }

    #[test]
    fn cell_indices_cover_cellvars_then_freevars() {
        let mut b = CodeBuilder::new("g").cellvars(&["c"]).freevars(&["x"]);
        b.emit_deref(Opcode::LoadDeref, "x");
        b.emit_deref(Opcode::LoadDeref, "c");
        let code = b.build().unwrap();
        assert_eq!(code.decode(0).unwrap().arg, 1);
        assert_eq!(code.decode(3).unwrap().arg, 0);
    }

    #[test]
    fn undeclared_cell_and_unbound_label_fail() {
        let mut b = CodeBuilder::new("g");
        b.emit_deref(Opcode::LoadDeref, "nope");
        assert_eq!(b.build().unwrap_err(), CodeError::UndeclaredVariable("nope".to_owned()));

        let mut b = CodeBuilder::new("g");
        let label = b.new_label();
        b.emit_jump(Opcode::JumpAbsolute, label);
        assert_eq!(b.build().unwrap_err(), CodeError::UnboundLabel);
    }
}
