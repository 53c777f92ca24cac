//! Label definitions and the two-pass resolver.
//!
//! Pass 1 walks the program in order and binds every label to the address
//! of the next instruction. Pass 2 replaces each label operand with either
//! that address or an offset from the referencing instruction, depending on
//! the opcode's [`LabelMode`]. Forward references need no fix-up list since
//! pass 1 has already seen the whole program.
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::ResolveError;
use crate::instructions::{Imm, Instruction};
use crate::isa::e93::LabelMode;
use crate::parser::{Item, Program, Statement};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub address: u16,
    /// Line of the definition.
    pub line_no: usize,
}

/// Label name to address. Names are case-sensitive and defined once.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    table: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Runs pass 1 alone, for tools that only want the label map.
    pub fn collect(program: &Program, origin: u16) -> Result<Self, ResolveError> {
        Resolver::new(origin).define_symbols(program).map_err(|mut errs| errs.remove(0))
    }

    /// Binds `name`, refusing a second definition.
    pub fn define(&mut self, name: &str, address: u16, line_no: usize) -> Result<(), ResolveError> {
        if let Some(first) = self.table.get(name) {
            return Err(ResolveError::DuplicateLabel {
                name: name.to_string(),
                line_no,
                first_line_no: first.line_no,
            });
        }
        trace!(name, address, line_no, "label defined");
        self.table
            .insert(name.to_string(), Symbol { name: name.to_string(), address, line_no });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.table.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.table.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Symbols ordered by address, then name.
    pub fn sorted(&self) -> Vec<&Symbol> {
        let mut all: Vec<&Symbol> = self.table.values().collect();
        all.sort_by(|a, b| a.address.cmp(&b.address).then_with(|| a.name.cmp(&b.name)));
        all
    }
}

/// An instruction with its final address and every label substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    pub address: u16,
    pub instruction: Instruction,
    pub line_no: usize,
    pub line: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    /// Address of the first instruction.
    pub origin: u16,
    /// Keep going after the first error and report them all.
    pub collect_errors: bool,
}

impl Resolver {
    pub fn new(origin: u16) -> Self {
        Self { origin, collect_errors: false }
    }

    pub fn collecting(mut self, collect_errors: bool) -> Self {
        self.collect_errors = collect_errors;
        self
    }

    /// Runs both passes.
    pub fn resolve(&self, program: Program) -> Result<Vec<Resolved>, Vec<ResolveError>> {
        let symbols = self.define_symbols(&program)?;
        self.substitute(program, &symbols)
    }

    /// Pass 1: bind each label to the address of the instruction after it.
    pub fn define_symbols(&self, program: &Program) -> Result<SymbolTable, Vec<ResolveError>> {
        let len = program.len();
        if self.origin as usize + len > u16::MAX as usize {
            return Err(vec![ResolveError::ProgramTooLarge { len, origin: self.origin }]);
        }

        let mut symbols = SymbolTable::new();
        let mut errors = Vec::new();
        let mut address = self.origin;
        for item in &program.items {
            match item {
                Item::Label { name, line_no } => {
                    if let Err(e) = symbols.define(name, address, *line_no) {
                        if !self.collect_errors {
                            return Err(vec![e]);
                        }
                        errors.push(e);
                    }
                }
                Item::Instr(_) => address += 1,
            }
        }
        debug!(symbols = symbols.len(), instructions = len, "pass 1 complete");
        if errors.is_empty() {
            Ok(symbols)
        } else {
            Err(errors)
        }
    }

    /// Pass 2: substitute label operands and range-check every immediate.
    pub fn substitute(
        &self,
        program: Program,
        symbols: &SymbolTable,
    ) -> Result<Vec<Resolved>, Vec<ResolveError>> {
        let mut out = Vec::with_capacity(program.len());
        let mut errors = Vec::new();
        let mut address = self.origin;
        for item in program.items {
            let Item::Instr(stmt) = item else { continue };
            match resolve_one(stmt, address, symbols) {
                Ok(r) => out.push(r),
                Err(e) if self.collect_errors => errors.push(e),
                Err(e) => return Err(vec![e]),
            }
            address += 1;
        }
        debug!(resolved = out.len(), "pass 2 complete");
        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }
}

/// Resolves with origin 0, stopping at the first error.
pub fn resolve(program: Program) -> Result<Vec<Resolved>, ResolveError> {
    Resolver::new(0).resolve(program).map_err(|mut errs| errs.remove(0))
}

fn resolve_one(stmt: Statement, address: u16, symbols: &SymbolTable) -> Result<Resolved, ResolveError> {
    let Statement { mut instruction, line_no, line } = stmt;
    let desc = instruction.opcode().desc();

    if let (Some(field), Some(imm)) = (desc.imm_field(), instruction.imm_mut()) {
        let (value, label) = match imm {
            Imm::Value(v) => (*v as i64, None),
            Imm::Label(name) => {
                let Some(sym) = symbols.lookup(name) else {
                    return Err(ResolveError::UndefinedLabel {
                        name: name.clone(),
                        address,
                        line_no,
                        line,
                    });
                };
                let value = match desc.label_mode {
                    LabelMode::Relative => sym.address as i64 - address as i64,
                    LabelMode::Absolute | LabelMode::None => sym.address as i64,
                };
                trace!(label = %name, value, address, "label substituted");
                (value, Some(name.clone()))
            }
        };
        if !field.fits(value) {
            let (min, max) = field.range();
            return Err(ResolveError::ImmediateOverflow { value, min, max, address, line_no, label });
        }
        *imm = Imm::Value(value as i32);
    }
    Ok(Resolved { address, instruction, line_no, line })
}
