use std::fmt;

use crate::decoder::decode;
use crate::instructions::{Imm, Instruction, Operand};
use crate::parser::REG_PREFIX;

/// Renders an instruction in assembler syntax, so the output parses back
/// to the same instruction: `ADDI, $r2, -1`.
pub fn fmt_instruction(instr: &Instruction) -> String {
    let mut parts = vec![instr.mnemonic().to_string()];
    for op in instr.operands() {
        parts.push(match op {
            Operand::Reg(r) => format!("{REG_PREFIX}{}", r.index()),
            Operand::Imm(Imm::Value(v)) => v.to_string(),
            Operand::Imm(Imm::Label(name)) => name,
        });
    }
    parts.join(", ")
}

/// Disassembles one word; undecodable words come out as `.word 0xNNNN`.
pub fn fmt_word(raw: u16) -> String {
    match decode(raw) {
        Ok(instr) => fmt_instruction(&instr),
        Err(_) => format!(".word {raw:#06x}"),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&fmt_instruction(self))
    }
}
