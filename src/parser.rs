//! Source text to unresolved instructions.
//!
//! One statement per line: `MNEMONIC, op1, op2`. A line may start with a
//! label definition (`name:`), and `#` starts a comment. Label operands are
//! kept as [`Imm::Label`] for the resolver.
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::instructions::{Imm, Instruction, Operand, Reg};
use crate::isa::e93::{self, FieldKind};

pub const COMMENT: char = '#';
pub const LABEL_DELIM: char = ':';
pub const REG_PREFIX: &str = "$r";

/// An instruction together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub instruction: Instruction,
    /// 1-based source line.
    pub line_no: usize,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Label { name: String, line_no: usize },
    Instr(Statement),
}

/// Parsed items in source order. Comments and blank lines leave no trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.items.iter().filter_map(|it| match it {
            Item::Instr(s) => Some(s),
            Item::Label { .. } => None,
        })
    }

    /// Number of instructions, i.e. the size of the address space used.
    pub fn len(&self) -> usize {
        self.statements().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses a single instruction line.
///
/// Comment and blank lines yield `Ok(None)`. Label definitions are a
/// program-level construct and are rejected here.
pub fn parse_line(line: &str) -> Result<Option<Instruction>, ParseError> {
    let text = strip_comment(line);
    if text.is_empty() {
        return Ok(None);
    }
    parse_instruction(1, line, text).map(Some)
}

/// Parses a whole program, stopping at the first bad line.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let mut program = Program::default();
    for (i, line) in source.lines().enumerate() {
        parse_source_line(i + 1, line, &mut program.items)?;
    }
    Ok(program)
}

/// Parses a whole program, reporting every bad line.
pub fn parse_program_all(source: &str) -> Result<Program, Vec<ParseError>> {
    let mut program = Program::default();
    let mut errors = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Err(e) = parse_source_line(i + 1, line, &mut program.items) {
            errors.push(e);
        }
    }
    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

fn parse_source_line(line_no: usize, line: &str, items: &mut Vec<Item>) -> Result<(), ParseError> {
    let text = strip_comment(line);
    if text.is_empty() {
        return Ok(());
    }
    let mut rest = text;
    if let Some((head, tail)) = text.split_once(LABEL_DELIM) {
        // A colon after the first comma belongs to an operand, not a label.
        if !head.contains(',') {
            let name = head.trim();
            if !is_identifier(name) {
                return Err(ParseError::MalformedLabel {
                    line_no,
                    line: line.to_string(),
                    name: name.to_string(),
                });
            }
            items.push(Item::Label { name: name.to_string(), line_no });
            rest = tail.trim();
        }
    }
    if !rest.is_empty() {
        let instruction = parse_instruction(line_no, line, rest)?;
        items.push(Item::Instr(Statement { instruction, line_no, line: line.to_string() }));
    }
    Ok(())
}

fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT) {
        Some(p) => line[..p].trim(),
        None => line.trim(),
    }
}

fn parse_instruction(line_no: usize, line: &str, text: &str) -> Result<Instruction, ParseError> {
    let malformed = |reason: String| ParseError::MalformedInstruction {
        line_no,
        line: line.to_string(),
        reason,
    };

    let mut tokens = text.split(',').map(str::trim);
    let mnemonic = tokens.next().unwrap_or_default();
    let operands: Vec<&str> = tokens.collect();

    if mnemonic.contains(char::is_whitespace) {
        return Err(malformed("missing comma after the mnemonic?".to_string()));
    }
    let row = e93::by_mnemonic(mnemonic).map_err(|_| ParseError::UnknownMnemonic {
        line_no,
        line: line.to_string(),
        mnemonic: mnemonic.to_string(),
    })?;
    let fields = row.opcode.desc().operands;
    if operands.len() != fields.len() {
        return Err(malformed(format!(
            "{} expects {} operand(s), found {}",
            row.mnemonic,
            fields.len(),
            operands.len()
        )));
    }

    let mut parsed = Vec::with_capacity(fields.len());
    for (field, token) in fields.iter().zip(operands) {
        let operand = match field.kind {
            FieldKind::Reg => Operand::Reg(parse_reg(line_no, line, token)?),
            FieldKind::Signed | FieldKind::Unsigned => Operand::Imm(parse_imm(line_no, line, token)?),
        };
        parsed.push(operand);
    }
    Instruction::from_operands(row, parsed).map_err(|e| malformed(e.to_string()))
}

fn parse_reg(line_no: usize, line: &str, token: &str) -> Result<Reg, ParseError> {
    let malformed = || ParseError::MalformedRegister {
        line_no,
        line: line.to_string(),
        token: token.to_string(),
    };
    let digits = token.strip_prefix(REG_PREFIX).ok_or_else(malformed)?;
    if !is_decimal(digits) {
        return Err(malformed());
    }
    // Too many digits for i64 is still a number, just far out of range.
    let index: i64 = digits.parse().unwrap_or(if digits.starts_with('-') { i64::MIN } else { i64::MAX });
    Reg::new(index).map_err(|_| ParseError::RegisterOutOfRange {
        line_no,
        line: line.to_string(),
        index,
    })
}

fn parse_imm(line_no: usize, line: &str, token: &str) -> Result<Imm, ParseError> {
    if is_decimal(token) {
        // Range is checked during resolution, against the destination field.
        // Anything wider than i32 saturates, which no field can hold.
        let v = token.parse::<i32>().unwrap_or(if token.starts_with('-') { i32::MIN } else { i32::MAX });
        return Ok(Imm::Value(v));
    } else if is_identifier(token) {
        return Ok(Imm::Label(token.to_string()));
    }
    Err(ParseError::MalformedImmediate {
        line_no,
        line: line.to_string(),
        token: token.to_string(),
    })
}

/// Optional sign followed by at least one ASCII digit.
fn is_decimal(s: &str) -> bool {
    let digits = s.strip_prefix(|c: char| c == '-' || c == '+').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::AluFunc;

    #[test]
    fn identifiers() {
        assert!(is_identifier("L1"));
        assert!(is_identifier("_start"));
        assert!(is_identifier(".loop2"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("$r1"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a-b"));
    }

    #[test]
    fn decimal_tokens() {
        assert!(is_decimal("12"));
        assert!(is_decimal("-7"));
        assert!(is_decimal("+7"));
        assert!(!is_decimal("-"));
        assert!(!is_decimal("0x10"));
        assert!(!is_decimal("1_000"));
    }

    #[test]
    fn trailing_comment_is_ignored() {
        let i = parse_line("SUB, $r4, $r5   # r4 -= r5").unwrap().unwrap();
        assert_eq!(i, Instruction::alu(AluFunc::Sub, 4, 5).unwrap());
    }

    #[test]
    fn label_and_instruction_share_a_line() {
        let p = parse_program("top: NOP\n").unwrap();
        assert_eq!(p.items.len(), 2);
        assert!(matches!(&p.items[0], Item::Label { name, line_no: 1 } if name == "top"));
        assert_eq!(p.len(), 1);
    }

    #[test]
    fn bad_label_name() {
        let err = parse_program("9lives:\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedLabel { line_no: 1, .. }));
    }

    #[test]
    fn missing_comma_hint() {
        let err = parse_line("AND $r0, $r1").unwrap_err();
        assert!(matches!(err, ParseError::MalformedInstruction { .. }));
        assert!(err.to_string().contains("missing comma"));
    }
}
