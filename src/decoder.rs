use crate::error::DecodeError;
use crate::instructions::Instruction;
use crate::isa::e93::E93Decoder;

/// Turns one instruction word back into an [`Instruction`].
///
/// Decoding never needs a symbol table; every operand comes out as a value.
pub trait Decoder {
    fn decode(&self, raw: u16) -> Result<Instruction, DecodeError>;
}

/// Decodes with the default e93 decoder.
pub fn decode(raw: u16) -> Result<Instruction, DecodeError> {
    E93Decoder::new().decode(raw)
}
