pub mod assembler;
pub mod decoder;
pub mod disasm;
pub mod encoder;
pub mod error;
pub mod instructions;
pub mod parser;
pub mod symbols;

pub mod isa {
    pub mod e93; // opcode table and decoder for the e93 16-bit ISA
}

pub use assembler::{assemble, assemble_program, AsmConfig, Assembly};
pub use decoder::{decode, Decoder};
pub use disasm::{fmt_instruction, fmt_word};
pub use encoder::encode;
pub use error::{AsmError, DecodeError, EncodeError, ModelError, ParseError, ResolveError, TableError};
pub use instructions::{AluFunc, BranchCond, Imm, Instruction, MemFunc, Operand, Reg, SysFunc};
pub use isa::e93::{E93Decoder, Opcode};
pub use parser::{parse_line, parse_program, Program, Statement};
pub use symbols::{resolve, Resolved, Resolver, Symbol, SymbolTable};
