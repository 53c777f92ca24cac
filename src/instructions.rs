//! Instruction model for the e93 ISA.
//!
//! [`Instruction`] is a sum type with one variant per opcode class, so an
//! ALU instruction has no immediate to read and an ADDI has no second
//! register. Registers are validated when a [`Reg`] is built.
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, TableError};
use crate::isa::e93::{self, InstrDesc, Opcode};

pub const NUM_REGS: u8 = 16;

/// A general-purpose register index in `0..16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Reg(u8);

impl Reg {
    pub fn new(index: impl Into<i64>) -> Result<Self, ModelError> {
        let index = index.into();
        if (0..NUM_REGS as i64).contains(&index) {
            Ok(Reg(index as u8))
        } else {
            Err(ModelError::RegisterOutOfRange(index))
        }
    }

    pub fn index(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Reg {
    type Error = ModelError;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Reg::new(index)
    }
}

impl From<Reg> for u8 {
    fn from(r: Reg) -> u8 {
        r.0
    }
}

/// An immediate, offset or address operand.
///
/// `Label` only exists between parsing and resolution; the encoder refuses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Imm {
    Value(i32),
    Label(String),
}

impl Imm {
    pub fn label(name: impl Into<String>) -> Self {
        Imm::Label(name.into())
    }

    pub fn value(&self) -> Option<i32> {
        match self {
            Imm::Value(v) => Some(*v),
            Imm::Label(_) => None,
        }
    }

    pub fn label_ref(&self) -> Option<&str> {
        match self {
            Imm::Label(name) => Some(name),
            Imm::Value(_) => None,
        }
    }
}

impl From<i32> for Imm {
    fn from(v: i32) -> Self {
        Imm::Value(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AluFunc {
    And = 1,
    Or = 2,
    Xor = 3,
    Add = 4,
    Sub = 5,
    Slt = 6,
    Sll = 7,
    Srl = 8,
    Sra = 9,
}

impl AluFunc {
    pub fn from_code(code: u8) -> Option<Self> {
        use AluFunc::*;
        Some(match code {
            1 => And,
            2 => Or,
            3 => Xor,
            4 => Add,
            5 => Sub,
            6 => Slt,
            7 => Sll,
            8 => Srl,
            9 => Sra,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MemFunc {
    Lw = 0,
    Sw = 1,
}

impl MemFunc {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(MemFunc::Lw),
            1 => Some(MemFunc::Sw),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BranchCond {
    Eqz = 0,
    Nez = 1,
}

impl BranchCond {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(BranchCond::Eqz),
            1 => Some(BranchCond::Nez),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SysFunc {
    Nop = 0,
    Halt = 1,
}

impl SysFunc {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SysFunc::Nop),
            1 => Some(SysFunc::Halt),
            _ => None,
        }
    }
}

/// A positional operand, in the order the opcode table lists the fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(Imm),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    /// `r1 <- r1 op r2`
    Alu { func: AluFunc, r1: Reg, r2: Reg },
    Addi { rd: Reg, imm: Imm },
    Andi { rd: Reg, imm: Imm },
    Ori { rd: Reg, imm: Imm },
    /// `rd <- imm << 8`
    Lui { rd: Reg, imm: Imm },
    /// LW: `r1 <- mem[r2]`, SW: `mem[r2] <- r1`
    Mem { func: MemFunc, r1: Reg, r2: Reg },
    /// Taken branch lands at this instruction's address plus `offset`.
    Branch { cond: BranchCond, rs: Reg, offset: Imm },
    Jump { target: Imm },
    /// Jump and link; the return address goes to r15.
    Jal { target: Imm },
    Sys { func: SysFunc },
}

impl Instruction {
    pub fn alu(func: AluFunc, r1: u8, r2: u8) -> Result<Self, ModelError> {
        Ok(Instruction::Alu { func, r1: Reg::new(r1)?, r2: Reg::new(r2)? })
    }

    pub fn and(r1: u8, r2: u8) -> Result<Self, ModelError> {
        Self::alu(AluFunc::And, r1, r2)
    }

    pub fn addi(rd: u8, imm: i32) -> Result<Self, ModelError> {
        Self::checked(Instruction::Addi { rd: Reg::new(rd)?, imm: Imm::Value(imm) })
    }

    pub fn andi(rd: u8, imm: i32) -> Result<Self, ModelError> {
        Self::checked(Instruction::Andi { rd: Reg::new(rd)?, imm: Imm::Value(imm) })
    }

    pub fn ori(rd: u8, imm: i32) -> Result<Self, ModelError> {
        Self::checked(Instruction::Ori { rd: Reg::new(rd)?, imm: Imm::Value(imm) })
    }

    pub fn lui(rd: u8, imm: i32) -> Result<Self, ModelError> {
        Self::checked(Instruction::Lui { rd: Reg::new(rd)?, imm: Imm::Value(imm) })
    }

    pub fn mem(func: MemFunc, r1: u8, r2: u8) -> Result<Self, ModelError> {
        Ok(Instruction::Mem { func, r1: Reg::new(r1)?, r2: Reg::new(r2)? })
    }

    pub fn branch(cond: BranchCond, rs: u8, offset: i32) -> Result<Self, ModelError> {
        Self::checked(Instruction::Branch { cond, rs: Reg::new(rs)?, offset: Imm::Value(offset) })
    }

    pub fn jump(target: i32) -> Result<Self, ModelError> {
        Self::checked(Instruction::Jump { target: Imm::Value(target) })
    }

    pub fn jal(target: i32) -> Result<Self, ModelError> {
        Self::checked(Instruction::Jal { target: Imm::Value(target) })
    }

    pub fn nop() -> Self {
        Instruction::Sys { func: SysFunc::Nop }
    }

    pub fn halt() -> Self {
        Instruction::Sys { func: SysFunc::Halt }
    }

    fn checked(instr: Self) -> Result<Self, ModelError> {
        let field = instr.opcode().desc().imm_field();
        if let (Some(field), Some(value)) = (field, instr.imm().and_then(Imm::value)) {
            if !field.fits(value as i64) {
                let (min, max) = field.range();
                return Err(ModelError::ImmediateOutOfRange { value: value as i64, min, max });
            }
        }
        Ok(instr)
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::Alu { .. } => Opcode::Alu,
            Instruction::Addi { .. } => Opcode::Addi,
            Instruction::Andi { .. } => Opcode::Andi,
            Instruction::Ori { .. } => Opcode::Ori,
            Instruction::Lui { .. } => Opcode::Lui,
            Instruction::Mem { .. } => Opcode::Mem,
            Instruction::Branch { .. } => Opcode::Br,
            Instruction::Jump { .. } => Opcode::Jump,
            Instruction::Jal { .. } => Opcode::Jal,
            Instruction::Sys { .. } => Opcode::Sys,
        }
    }

    /// Assembler mnemonic, e.g. `BNEZ`.
    pub fn mnemonic(&self) -> &'static str {
        e93::describe(self).map_or(self.opcode().desc().name, |row| row.mnemonic)
    }

    /// The sub-operation selector, for opcodes that multiplex one.
    pub fn function_code(&self) -> Option<u8> {
        match self {
            Instruction::Alu { func, .. } => Some(*func as u8),
            Instruction::Mem { func, .. } => Some(*func as u8),
            Instruction::Branch { cond, .. } => Some(*cond as u8),
            Instruction::Sys { func } => Some(*func as u8),
            Instruction::Addi { .. }
            | Instruction::Andi { .. }
            | Instruction::Ori { .. }
            | Instruction::Lui { .. }
            | Instruction::Jump { .. }
            | Instruction::Jal { .. } => None,
        }
    }

    pub fn imm(&self) -> Option<&Imm> {
        match self {
            Instruction::Addi { imm, .. }
            | Instruction::Andi { imm, .. }
            | Instruction::Ori { imm, .. }
            | Instruction::Lui { imm, .. } => Some(imm),
            Instruction::Branch { offset, .. } => Some(offset),
            Instruction::Jump { target } | Instruction::Jal { target } => Some(target),
            Instruction::Alu { .. } | Instruction::Mem { .. } | Instruction::Sys { .. } => None,
        }
    }

    pub fn imm_mut(&mut self) -> Option<&mut Imm> {
        match self {
            Instruction::Addi { imm, .. }
            | Instruction::Andi { imm, .. }
            | Instruction::Ori { imm, .. }
            | Instruction::Lui { imm, .. } => Some(imm),
            Instruction::Branch { offset, .. } => Some(offset),
            Instruction::Jump { target } | Instruction::Jal { target } => Some(target),
            Instruction::Alu { .. } | Instruction::Mem { .. } | Instruction::Sys { .. } => None,
        }
    }

    /// The symbolic operand still waiting for resolution, if any.
    pub fn label_ref(&self) -> Option<&str> {
        self.imm().and_then(Imm::label_ref)
    }

    /// Operands in source order.
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Instruction::Alu { r1, r2, .. } | Instruction::Mem { r1, r2, .. } => {
                vec![Operand::Reg(*r1), Operand::Reg(*r2)]
            }
            Instruction::Addi { rd, imm }
            | Instruction::Andi { rd, imm }
            | Instruction::Ori { rd, imm }
            | Instruction::Lui { rd, imm } => vec![Operand::Reg(*rd), Operand::Imm(imm.clone())],
            Instruction::Branch { rs, offset, .. } => {
                vec![Operand::Reg(*rs), Operand::Imm(offset.clone())]
            }
            Instruction::Jump { target } | Instruction::Jal { target } => {
                vec![Operand::Imm(target.clone())]
            }
            Instruction::Sys { .. } => vec![],
        }
    }

    /// Builds the variant named by a table row from positional operands.
    ///
    /// This is the one place that maps table rows to variants; the parser
    /// and the decoder both go through it.
    pub fn from_operands(desc: &InstrDesc, operands: Vec<Operand>) -> Result<Self, ModelError> {
        let expected = desc.opcode.desc().operands.len();
        if operands.len() != expected {
            return Err(ModelError::OperandCount {
                mnemonic: desc.mnemonic,
                expected,
                found: operands.len(),
            });
        }
        let mut ops = Operands { mnemonic: desc.mnemonic, index: 0, iter: operands.into_iter() };
        let func = || -> Result<u8, ModelError> {
            desc.func.ok_or(ModelError::Table(TableError::UnknownFunctionCode {
                opcode: desc.opcode,
                code: 0,
            }))
        };
        let unknown = |code: u8| TableError::UnknownFunctionCode { opcode: desc.opcode, code };

        let instr = match desc.opcode {
            Opcode::Alu => {
                let code = func()?;
                let func = AluFunc::from_code(code).ok_or(unknown(code))?;
                Instruction::Alu { func, r1: ops.reg()?, r2: ops.reg()? }
            }
            Opcode::Addi => Instruction::Addi { rd: ops.reg()?, imm: ops.imm()? },
            Opcode::Andi => Instruction::Andi { rd: ops.reg()?, imm: ops.imm()? },
            Opcode::Ori => Instruction::Ori { rd: ops.reg()?, imm: ops.imm()? },
            Opcode::Lui => Instruction::Lui { rd: ops.reg()?, imm: ops.imm()? },
            Opcode::Mem => {
                let code = func()?;
                let func = MemFunc::from_code(code).ok_or(unknown(code))?;
                Instruction::Mem { func, r1: ops.reg()?, r2: ops.reg()? }
            }
            Opcode::Br => {
                let code = func()?;
                let cond = BranchCond::from_code(code).ok_or(unknown(code))?;
                Instruction::Branch { cond, rs: ops.reg()?, offset: ops.imm()? }
            }
            Opcode::Jump => Instruction::Jump { target: ops.imm()? },
            Opcode::Jal => Instruction::Jal { target: ops.imm()? },
            Opcode::Sys => {
                let code = func()?;
                Instruction::Sys { func: SysFunc::from_code(code).ok_or(unknown(code))? }
            }
        };
        Ok(instr)
    }
}

struct Operands {
    mnemonic: &'static str,
    index: usize,
    iter: std::vec::IntoIter<Operand>,
}

impl Operands {
    fn next(&mut self, expected: &'static str) -> Result<Operand, ModelError> {
        let index = self.index;
        self.index += 1;
        self.iter.next().ok_or(ModelError::OperandKind { mnemonic: self.mnemonic, index, expected })
    }

    fn reg(&mut self) -> Result<Reg, ModelError> {
        let index = self.index;
        match self.next("a register")? {
            Operand::Reg(r) => Ok(r),
            Operand::Imm(_) => Err(ModelError::OperandKind {
                mnemonic: self.mnemonic,
                index,
                expected: "a register",
            }),
        }
    }

    fn imm(&mut self) -> Result<Imm, ModelError> {
        let index = self.index;
        match self.next("an immediate or label")? {
            Operand::Imm(imm) => Ok(imm),
            Operand::Reg(_) => Err(ModelError::OperandKind {
                mnemonic: self.mnemonic,
                index,
                expected: "an immediate or label",
            }),
        }
    }
}
