//! Instruction to word encoding.
use crate::error::EncodeError;
use crate::instructions::{Imm, Instruction, Operand};
use crate::isa::e93::{self, OPCODE};

/// Encodes a resolved instruction into its 16-bit word.
///
/// Field positions come from the opcode table, so this is the exact mirror
/// of [`E93Decoder`](crate::isa::e93::E93Decoder).
pub fn encode(instr: &Instruction) -> Result<u16, EncodeError> {
    if let Some(label) = instr.label_ref() {
        return Err(EncodeError::UnresolvedLabel { label: label.to_string() });
    }
    let row = e93::describe(instr).map_err(|_| EncodeError::UnsupportedInstruction {
        opcode: instr.opcode(),
        func: instr.function_code(),
    })?;
    let desc = row.opcode.desc();

    let mut word = OPCODE.insert(desc.opcode.code() as i64);
    if let (Some(field), Some(code)) = (desc.func, row.func) {
        word |= field.insert(code as i64);
    }
    for (field, operand) in desc.operands.iter().zip(instr.operands()) {
        let value = match operand {
            Operand::Reg(r) => r.index() as i64,
            Operand::Imm(Imm::Value(v)) => v as i64,
            Operand::Imm(Imm::Label(label)) => return Err(EncodeError::UnresolvedLabel { label }),
        };
        if !field.fits(value) {
            let (min, max) = field.range();
            return Err(EncodeError::ImmediateOverflow { field: field.name, value, min, max });
        }
        word |= field.insert(value);
    }
    Ok(word)
}

/// Encodes a sequence, stopping at the first failure.
pub fn encode_all<'a, I>(instrs: I) -> Result<Vec<u16>, EncodeError>
where
    I: IntoIterator<Item = &'a Instruction>,
{
    instrs.into_iter().map(encode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::{AluFunc, BranchCond, MemFunc, Reg};

    #[test]
    fn alu_layout() {
        assert_eq!(encode(&Instruction::and(0, 1).unwrap()).unwrap(), 0x0011);
        assert_eq!(encode(&Instruction::alu(AluFunc::Sra, 15, 14).unwrap()).unwrap(), 0x0FE9);
    }

    #[test]
    fn immediate_layouts() {
        assert_eq!(encode(&Instruction::addi(2, -1).unwrap()).unwrap(), 0x12FF);
        assert_eq!(encode(&Instruction::lui(4, 0xAB).unwrap()).unwrap(), 0x44AB);
        assert_eq!(encode(&Instruction::mem(MemFunc::Sw, 1, 2).unwrap()).unwrap(), 0x5121);
        assert_eq!(encode(&Instruction::jal(0x123).unwrap()).unwrap(), 0xA123);
        assert_eq!(encode(&Instruction::halt()).unwrap(), 0xF001);
    }

    #[test]
    fn branch_condition_sits_at_bit_seven() {
        let bnez = Instruction::branch(BranchCond::Nez, 3, -2).unwrap();
        assert_eq!(encode(&bnez).unwrap(), 0x83FE);
        let beqz = Instruction::branch(BranchCond::Eqz, 3, 5).unwrap();
        assert_eq!(encode(&beqz).unwrap(), 0x8305);
    }

    #[test]
    fn unresolved_label_is_refused() {
        let j = Instruction::Jump { target: Imm::label("later") };
        assert_eq!(encode(&j).unwrap_err(), EncodeError::UnresolvedLabel { label: "later".into() });
    }

    #[test]
    fn out_of_range_value_is_refused() {
        // Built directly, bypassing the checked constructor.
        let addi = Instruction::Addi { rd: Reg::new(1).unwrap(), imm: Imm::Value(200) };
        assert_eq!(
            encode(&addi).unwrap_err(),
            EncodeError::ImmediateOverflow { field: "imm8", value: 200, min: -128, max: 127 }
        );
    }
}
