use serde::{Deserialize, Serialize};

use crate::decoder::Decoder;
use crate::error::{DecodeError, TableError};
use crate::instructions::{AluFunc, BranchCond, Imm, Instruction, MemFunc, Operand, Reg, SysFunc};

/// e93 opcode table.
///
/// Every instruction is one 16-bit word with the opcode in bits 15..12.
/// The rest of the word is laid out per opcode by an [`OpcodeDesc`]; the
/// parser, encoder and decoder all read their field positions from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Alu = 0x0,
    Addi = 0x1,
    Andi = 0x2,
    Ori = 0x3,
    Lui = 0x4,
    Mem = 0x5,
    Br = 0x8,
    Jump = 0x9,
    Jal = 0xA,
    Sys = 0xF,
}

impl Opcode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn desc(self) -> &'static OpcodeDesc {
        match self {
            Opcode::Alu => &ALU,
            Opcode::Addi => &ADDI,
            Opcode::Andi => &ANDI,
            Opcode::Ori => &ORI,
            Opcode::Lui => &LUI,
            Opcode::Mem => &MEM,
            Opcode::Br => &BR,
            Opcode::Jump => &JUMP,
            Opcode::Jal => &JAL,
            Opcode::Sys => &SYS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Reg,
    Signed,
    Unsigned,
}

/// A contiguous bit range `[lo, lo + width)` of the instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub lo: u8,
    pub width: u8,
    pub kind: FieldKind,
}

impl Field {
    const fn new(name: &'static str, lo: u8, width: u8, kind: FieldKind) -> Self {
        Self { name, lo, width, kind }
    }

    pub fn mask(&self) -> u16 {
        ((((1u32 << self.width) - 1) << self.lo) & 0xFFFF) as u16
    }

    /// Inclusive range of values the field can hold.
    pub fn range(&self) -> (i32, i32) {
        let w = self.width as u32;
        match self.kind {
            FieldKind::Signed => (-(1 << (w - 1)), (1 << (w - 1)) - 1),
            FieldKind::Reg | FieldKind::Unsigned => (0, (1 << w) - 1),
        }
    }

    pub fn fits(&self, value: i64) -> bool {
        let (min, max) = self.range();
        (min as i64..=max as i64).contains(&value)
    }

    pub fn extract(&self, word: u16) -> i32 {
        let raw = ((word as u32) >> self.lo) & ((1u32 << self.width) - 1);
        match self.kind {
            FieldKind::Signed => sign_ext(raw, self.width as u32),
            FieldKind::Reg | FieldKind::Unsigned => raw as i32,
        }
    }

    /// Places `value` into the field. Callers check [`Field::fits`] first.
    pub fn insert(&self, value: i64) -> u16 {
        let raw = (value as u32) & ((1u32 << self.width) - 1);
        (raw << self.lo) as u16
    }
}

#[inline]
fn sign_ext(v: u32, bits: u32) -> i32 {
    let s = 32 - bits;
    ((v << s) as i32) >> s
}

/// How a label operand turns into a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelMode {
    /// The opcode has no label-capable operand.
    None,
    /// The label's address.
    Absolute,
    /// Label address minus the address of the referencing instruction.
    Relative,
}

#[derive(Debug, Clone, Copy)]
pub struct OpcodeDesc {
    pub opcode: Opcode,
    pub name: &'static str,
    /// Operand fields in source order.
    pub operands: &'static [Field],
    /// Where the function code lives, for opcodes that multiplex.
    pub func: Option<Field>,
    pub label_mode: LabelMode,
    /// Bits that must be zero. Together with the fields they cover the word.
    pub reserved: u16,
}

impl OpcodeDesc {
    /// Bits claimed by the opcode, function code and operands.
    pub fn used_mask(&self) -> u16 {
        let operands = self.operands.iter().fold(0, |m, f| m | f.mask());
        OPCODE.mask() | self.func.map_or(0, |f| f.mask()) | operands
    }

    /// The immediate/offset/address operand, if the opcode has one.
    pub fn imm_field(&self) -> Option<&'static Field> {
        self.operands.iter().find(|f| f.kind != FieldKind::Reg)
    }
}

/// One row per mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrDesc {
    pub mnemonic: &'static str,
    pub opcode: Opcode,
    pub func: Option<u8>,
}

pub const OPCODE: Field = Field::new("opcode", 12, 4, FieldKind::Unsigned);

const R1: Field = Field::new("r1", 8, 4, FieldKind::Reg);
const R2: Field = Field::new("r2", 4, 4, FieldKind::Reg);
const FUNC4: Field = Field::new("func", 0, 4, FieldKind::Unsigned);
const IMM8S: Field = Field::new("imm8", 0, 8, FieldKind::Signed);
const IMM8U: Field = Field::new("imm8", 0, 8, FieldKind::Unsigned);
const COND: Field = Field::new("cond", 7, 1, FieldKind::Unsigned);
const OFF7: Field = Field::new("off7", 0, 7, FieldKind::Signed);
const ADDR12: Field = Field::new("addr12", 0, 12, FieldKind::Unsigned);

const ALU: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Alu,
    name: "ALU",
    operands: &[R1, R2],
    func: Some(FUNC4),
    label_mode: LabelMode::None,
    reserved: 0,
};
const ADDI: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Addi,
    name: "ADDI",
    operands: &[R1, IMM8S],
    func: None,
    label_mode: LabelMode::Absolute,
    reserved: 0,
};
const ANDI: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Andi,
    name: "ANDI",
    operands: &[R1, IMM8U],
    func: None,
    label_mode: LabelMode::Absolute,
    reserved: 0,
};
const ORI: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Ori,
    name: "ORI",
    operands: &[R1, IMM8U],
    func: None,
    label_mode: LabelMode::Absolute,
    reserved: 0,
};
const LUI: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Lui,
    name: "LUI",
    operands: &[R1, IMM8U],
    func: None,
    label_mode: LabelMode::Absolute,
    reserved: 0,
};
const MEM: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Mem,
    name: "MEM",
    operands: &[R1, R2],
    func: Some(FUNC4),
    label_mode: LabelMode::None,
    reserved: 0,
};
// Condition bit sits between the register and the offset.
const BR: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Br,
    name: "BR",
    operands: &[R1, OFF7],
    func: Some(COND),
    label_mode: LabelMode::Relative,
    reserved: 0,
};
const JUMP: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Jump,
    name: "JUMP",
    operands: &[ADDR12],
    func: None,
    label_mode: LabelMode::Absolute,
    reserved: 0,
};
const JAL: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Jal,
    name: "JAL",
    operands: &[ADDR12],
    func: None,
    label_mode: LabelMode::Absolute,
    reserved: 0,
};
const SYS: OpcodeDesc = OpcodeDesc {
    opcode: Opcode::Sys,
    name: "SYS",
    operands: &[],
    func: Some(FUNC4),
    label_mode: LabelMode::None,
    reserved: 0x0FF0,
};

pub const OPCODES: &[OpcodeDesc] = &[ALU, ADDI, ANDI, ORI, LUI, MEM, BR, JUMP, JAL, SYS];

pub const TABLE: &[InstrDesc] = &[
    InstrDesc { mnemonic: "AND", opcode: Opcode::Alu, func: Some(AluFunc::And as u8) },
    InstrDesc { mnemonic: "OR", opcode: Opcode::Alu, func: Some(AluFunc::Or as u8) },
    InstrDesc { mnemonic: "XOR", opcode: Opcode::Alu, func: Some(AluFunc::Xor as u8) },
    InstrDesc { mnemonic: "ADD", opcode: Opcode::Alu, func: Some(AluFunc::Add as u8) },
    InstrDesc { mnemonic: "SUB", opcode: Opcode::Alu, func: Some(AluFunc::Sub as u8) },
    InstrDesc { mnemonic: "SLT", opcode: Opcode::Alu, func: Some(AluFunc::Slt as u8) },
    InstrDesc { mnemonic: "SLL", opcode: Opcode::Alu, func: Some(AluFunc::Sll as u8) },
    InstrDesc { mnemonic: "SRL", opcode: Opcode::Alu, func: Some(AluFunc::Srl as u8) },
    InstrDesc { mnemonic: "SRA", opcode: Opcode::Alu, func: Some(AluFunc::Sra as u8) },
    InstrDesc { mnemonic: "ADDI", opcode: Opcode::Addi, func: None },
    InstrDesc { mnemonic: "ANDI", opcode: Opcode::Andi, func: None },
    InstrDesc { mnemonic: "ORI", opcode: Opcode::Ori, func: None },
    InstrDesc { mnemonic: "LUI", opcode: Opcode::Lui, func: None },
    InstrDesc { mnemonic: "LW", opcode: Opcode::Mem, func: Some(MemFunc::Lw as u8) },
    InstrDesc { mnemonic: "SW", opcode: Opcode::Mem, func: Some(MemFunc::Sw as u8) },
    InstrDesc { mnemonic: "BEQZ", opcode: Opcode::Br, func: Some(BranchCond::Eqz as u8) },
    InstrDesc { mnemonic: "BNEZ", opcode: Opcode::Br, func: Some(BranchCond::Nez as u8) },
    InstrDesc { mnemonic: "JUMP", opcode: Opcode::Jump, func: None },
    InstrDesc { mnemonic: "JAL", opcode: Opcode::Jal, func: None },
    InstrDesc { mnemonic: "NOP", opcode: Opcode::Sys, func: Some(SysFunc::Nop as u8) },
    InstrDesc { mnemonic: "HALT", opcode: Opcode::Sys, func: Some(SysFunc::Halt as u8) },
];

/// Case-insensitive mnemonic lookup.
pub fn by_mnemonic(mnemonic: &str) -> Result<&'static InstrDesc, TableError> {
    TABLE
        .iter()
        .find(|d| d.mnemonic.eq_ignore_ascii_case(mnemonic))
        .ok_or_else(|| TableError::UnknownMnemonic(mnemonic.to_string()))
}

/// Looks up an opcode by the value found in bits 15..12.
pub fn by_code(code: u8) -> Result<&'static OpcodeDesc, TableError> {
    OPCODES
        .iter()
        .find(|d| d.opcode.code() == code)
        .ok_or(TableError::UnknownOpcode(code))
}

/// Resolves an opcode plus optional function code to its mnemonic row.
pub fn function(opcode: Opcode, func: Option<u8>) -> Result<&'static InstrDesc, TableError> {
    TABLE
        .iter()
        .find(|d| d.opcode == opcode && d.func == func)
        .ok_or(TableError::UnknownFunctionCode { opcode, code: func.unwrap_or(0) })
}

/// The table row describing an already-built instruction.
pub fn describe(instr: &Instruction) -> Result<&'static InstrDesc, TableError> {
    function(instr.opcode(), instr.function_code())
}

/// Checks the table for duplicate codes or mnemonics, overlapping fields,
/// and function codes that do not fit their field.
pub fn validate_table() -> Result<(), TableError> {
    let bad = |msg: String| Err(TableError::Inconsistent(msg));
    for (i, a) in OPCODES.iter().enumerate() {
        if OPCODES[i + 1..].iter().any(|b| b.opcode.code() == a.opcode.code()) {
            return bad(format!("opcode {:#x} listed twice", a.opcode.code()));
        }
        if a.opcode.desc().name != a.name {
            return bad(format!("{} does not map back to its descriptor", a.name));
        }
        let mut used = OPCODE.mask();
        for f in a.operands.iter().chain(a.func.iter()) {
            if f.lo as u32 + f.width as u32 > 16 || f.width == 0 {
                return bad(format!("{}: field {} outside the word", a.name, f.name));
            }
            if used & f.mask() != 0 {
                return bad(format!("{}: field {} overlaps another field", a.name, f.name));
            }
            used |= f.mask();
        }
        if used & a.reserved != 0 || used | a.reserved != 0xFFFF {
            return bad(format!("{}: fields and reserved bits do not tile the word", a.name));
        }
        let needs_labels = a.imm_field().is_some();
        if needs_labels == (a.label_mode == LabelMode::None) {
            return bad(format!("{}: label mode does not match operand shape", a.name));
        }
        let rows: Vec<_> = TABLE.iter().filter(|d| d.opcode == a.opcode).collect();
        if rows.is_empty() {
            return bad(format!("{} has no mnemonics", a.name));
        }
        for row in rows {
            match (a.func, row.func) {
                (Some(f), Some(code)) if f.fits(code as i64) => {}
                (None, None) => {}
                _ => return bad(format!("{}: function code does not match its field", row.mnemonic)),
            }
        }
    }
    for (i, a) in TABLE.iter().enumerate() {
        if TABLE[i + 1..].iter().any(|b| b.mnemonic.eq_ignore_ascii_case(a.mnemonic)) {
            return bad(format!("mnemonic {} listed twice", a.mnemonic));
        }
        if TABLE[i + 1..].iter().any(|b| b.opcode == a.opcode && b.func == a.func) {
            return bad(format!("{} shares its encoding with another mnemonic", a.mnemonic));
        }
    }
    Ok(())
}

/// Decoder for e93 words, driven entirely by the opcode table.
#[derive(Debug, Default, Clone, Copy)]
pub struct E93Decoder;

impl E93Decoder {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for E93Decoder {
    fn decode(&self, raw: u16) -> Result<Instruction, DecodeError> {
        let unknown = |reason: String| DecodeError::UnknownEncoding { word: raw, reason };

        let desc = by_code(OPCODE.extract(raw) as u8).map_err(|e| unknown(e.to_string()))?;
        if raw & desc.reserved != 0 {
            return Err(unknown(format!("reserved bits set for {}", desc.name)));
        }
        let func = desc.func.map(|f| f.extract(raw) as u8);
        let row = function(desc.opcode, func).map_err(|e| unknown(e.to_string()))?;

        let mut operands = Vec::with_capacity(desc.operands.len());
        for f in desc.operands {
            let value = f.extract(raw);
            let operand = match f.kind {
                FieldKind::Reg => Operand::Reg(Reg::new(value).map_err(|e| unknown(e.to_string()))?),
                FieldKind::Signed | FieldKind::Unsigned => Operand::Imm(Imm::Value(value)),
            };
            operands.push(operand);
        }
        Instruction::from_operands(row, operands).map_err(|e| unknown(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_consistent() {
        validate_table().unwrap();
    }

    #[test]
    fn every_opcode_listed_once() {
        for d in OPCODES {
            assert_eq!(d.opcode.desc().name, d.name);
            assert_eq!(by_code(d.opcode.code()).unwrap().name, d.name);
        }
        for code in [0x6, 0x7, 0xB, 0xC, 0xD, 0xE] {
            assert_eq!(by_code(code).unwrap_err(), TableError::UnknownOpcode(code));
        }
    }

    #[test]
    fn mnemonic_lookup_ignores_case() {
        assert_eq!(by_mnemonic("and").unwrap().opcode, Opcode::Alu);
        assert_eq!(by_mnemonic("Beqz").unwrap().func, Some(0));
        assert!(matches!(by_mnemonic("MOV"), Err(TableError::UnknownMnemonic(m)) if m == "MOV"));
    }

    #[test]
    fn function_lookup() {
        assert_eq!(function(Opcode::Alu, Some(1)).unwrap().mnemonic, "AND");
        assert_eq!(function(Opcode::Jump, None).unwrap().mnemonic, "JUMP");
        assert_eq!(
            function(Opcode::Alu, Some(0xF)).unwrap_err(),
            TableError::UnknownFunctionCode { opcode: Opcode::Alu, code: 0xF }
        );
    }

    #[test]
    fn field_ranges_and_sign_extension() {
        assert_eq!(IMM8S.range(), (-128, 127));
        assert_eq!(OFF7.range(), (-64, 63));
        assert_eq!(ADDR12.range(), (0, 4095));
        assert_eq!(IMM8S.extract(0x00FF), -1);
        assert_eq!(IMM8U.extract(0x00FF), 255);
        assert_eq!(OFF7.extract(0x0040), -64);
        assert_eq!(OFF7.insert(-1), 0x007F);
        assert_eq!(COND.insert(1), 0x0080);
        assert!(!IMM8S.fits(128));
        assert!(IMM8S.fits(-128));
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let dec = E93Decoder::new();
        // NOP with a stray bit in the reserved range
        let err = dec.decode(0xF010).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownEncoding { word: 0xF010, .. }));
        assert_eq!(dec.decode(0xF001).unwrap(), Instruction::halt());
    }

    #[test]
    fn fields_tile_every_word() {
        for d in OPCODES {
            assert_eq!(d.used_mask() & d.reserved, 0, "{}", d.name);
            assert_eq!(d.used_mask() | d.reserved, 0xFFFF, "{}", d.name);
        }
        assert_eq!(SYS.reserved, 0x0FF0);
    }
}
