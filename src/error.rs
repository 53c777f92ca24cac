//! Error types for every stage of the e93 toolchain.
//!
//! Each stage has its own enum so callers can tell a bad source line apart
//! from a bad binary word. [`AsmError`] wraps them for the top-level
//! assembly entry points.
use thiserror::Error;

use crate::isa::e93::Opcode;

/// Failed lookups against the opcode table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    #[error("unknown opcode {0:#x}")]
    UnknownOpcode(u8),
    #[error("unknown function code {code:#x} for opcode {opcode:?}")]
    UnknownFunctionCode { opcode: Opcode, code: u8 },
    #[error("inconsistent opcode table: {0}")]
    Inconsistent(String),
}

/// Violations caught while building an [`Instruction`](crate::Instruction).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("register index {0} out of range (expected 0..16)")]
    RegisterOutOfRange(i64),
    #[error("immediate {value} out of range {min}..={max}")]
    ImmediateOutOfRange { value: i64, min: i32, max: i32 },
    #[error("{mnemonic} takes {expected} operand(s), found {found}")]
    OperandCount {
        mnemonic: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{mnemonic}: operand {index} must be {expected}")]
    OperandKind {
        mnemonic: &'static str,
        index: usize,
        expected: &'static str,
    },
    #[error(transparent)]
    Table(#[from] TableError),
}

/// Syntax errors. `line_no` is 1-based and `line` is the raw source text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line_no}: malformed instruction `{line}`: {reason}")]
    MalformedInstruction {
        line_no: usize,
        line: String,
        reason: String,
    },
    #[error("line {line_no}: unknown mnemonic `{mnemonic}` in `{line}`")]
    UnknownMnemonic {
        line_no: usize,
        line: String,
        mnemonic: String,
    },
    #[error("line {line_no}: malformed register `{token}` in `{line}`")]
    MalformedRegister {
        line_no: usize,
        line: String,
        token: String,
    },
    #[error("line {line_no}: register index {index} out of range in `{line}`")]
    RegisterOutOfRange {
        line_no: usize,
        line: String,
        index: i64,
    },
    #[error("line {line_no}: malformed immediate `{token}` in `{line}`")]
    MalformedImmediate {
        line_no: usize,
        line: String,
        token: String,
    },
    #[error("line {line_no}: malformed label `{name}` in `{line}`")]
    MalformedLabel {
        line_no: usize,
        line: String,
        name: String,
    },
}

impl ParseError {
    pub fn line_no(&self) -> usize {
        match self {
            ParseError::MalformedInstruction { line_no, .. }
            | ParseError::UnknownMnemonic { line_no, .. }
            | ParseError::MalformedRegister { line_no, .. }
            | ParseError::RegisterOutOfRange { line_no, .. }
            | ParseError::MalformedImmediate { line_no, .. }
            | ParseError::MalformedLabel { line_no, .. } => *line_no,
        }
    }

    pub fn line(&self) -> &str {
        match self {
            ParseError::MalformedInstruction { line, .. }
            | ParseError::UnknownMnemonic { line, .. }
            | ParseError::MalformedRegister { line, .. }
            | ParseError::RegisterOutOfRange { line, .. }
            | ParseError::MalformedImmediate { line, .. }
            | ParseError::MalformedLabel { line, .. } => line,
        }
    }
}

/// Label resolution errors raised by the two assembler passes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("line {line_no}: label `{name}` already defined on line {first_line_no}")]
    DuplicateLabel {
        name: String,
        line_no: usize,
        first_line_no: usize,
    },
    #[error("line {line_no}: undefined label `{name}` referenced at {address:#06x} in `{line}`")]
    UndefinedLabel {
        name: String,
        address: u16,
        line_no: usize,
        line: String,
    },
    #[error("line {line_no}: value {value} at {address:#06x} does not fit {min}..={max}{}", label_suffix(.label))]
    ImmediateOverflow {
        value: i64,
        min: i32,
        max: i32,
        address: u16,
        line_no: usize,
        label: Option<String>,
    },
    #[error("program of {len} instruction(s) at origin {origin:#06x} exceeds the 16-bit address space")]
    ProgramTooLarge { len: usize, origin: u16 },
}

fn label_suffix(label: &Option<String>) -> String {
    match label {
        Some(name) => format!(" (label `{name}`)"),
        None => String::new(),
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A label reference reached the encoder; resolution did not run.
    #[error("unresolved label `{label}` reached the encoder")]
    UnresolvedLabel { label: String },
    #[error("no encoding for opcode {opcode:?} with function code {func:?}")]
    UnsupportedInstruction { opcode: Opcode, func: Option<u8> },
    #[error("{field} value {value} out of range {min}..={max}")]
    ImmediateOverflow {
        field: &'static str,
        value: i64,
        min: i32,
        max: i32,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown encoding {word:#06x}: {reason}")]
    UnknownEncoding { word: u16, reason: String },
}

/// Top-level failure of an assembly run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AsmError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("line {line_no}: {source}")]
    Encode {
        line_no: usize,
        #[source]
        source: EncodeError,
    },
    #[error("{} errors:\n{}", .0.len(), join_errors(.0))]
    Multiple(Vec<AsmError>),
}

impl AsmError {
    /// Folds collected errors into one value; a single error is not wrapped.
    pub fn collapse<E: Into<AsmError>>(errors: Vec<E>) -> AsmError {
        let mut errors: Vec<AsmError> = errors.into_iter().map(Into::into).collect();
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            AsmError::Multiple(errors)
        }
    }

    /// Flattened view of every error carried by this value.
    pub fn errors(&self) -> Vec<&AsmError> {
        match self {
            AsmError::Multiple(all) => all.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }
}

fn join_errors(errors: &[AsmError]) -> String {
    errors
        .iter()
        .map(|e| format!("- {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}
