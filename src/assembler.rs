//! Source to machine words: parse, resolve, encode.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::encoder::encode;
use crate::error::AsmError;
use crate::parser::{parse_program, parse_program_all};
use crate::symbols::{Resolved, Resolver, Symbol};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsmConfig {
    /// Address of the first instruction. Labels are bound relative to it.
    pub origin: u16,
    /// Report every error in the stage that failed rather than just the first.
    pub collect_errors: bool,
}

/// Output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assembly {
    pub statements: Vec<Resolved>,
    /// One word per statement, in address order starting at the origin.
    pub words: Vec<u16>,
    /// Sorted by address.
    pub symbols: Vec<Symbol>,
}

pub fn assemble_program(source: &str, cfg: &AsmConfig) -> Result<Assembly, AsmError> {
    let program = if cfg.collect_errors {
        parse_program_all(source).map_err(AsmError::collapse)?
    } else {
        parse_program(source)?
    };
    debug!(items = program.items.len(), instructions = program.len(), "parsed");

    let resolver = Resolver::new(cfg.origin).collecting(cfg.collect_errors);
    let table = resolver.define_symbols(&program).map_err(AsmError::collapse)?;
    let symbols: Vec<Symbol> = table.sorted().into_iter().cloned().collect();
    let statements = resolver.substitute(program, &table).map_err(AsmError::collapse)?;

    let mut words = Vec::with_capacity(statements.len());
    let mut errors = Vec::new();
    for st in &statements {
        match encode(&st.instruction) {
            Ok(w) => words.push(w),
            Err(source) => {
                let err = AsmError::Encode { line_no: st.line_no, source };
                if !cfg.collect_errors {
                    return Err(err);
                }
                errors.push(err);
            }
        }
    }
    if !errors.is_empty() {
        return Err(AsmError::collapse(errors));
    }
    debug!(words = words.len(), symbols = symbols.len(), origin = cfg.origin, "assembled");
    Ok(Assembly { statements, words, symbols })
}

/// Assembles `source` into instruction words.
pub fn assemble(source: &str, cfg: &AsmConfig) -> Result<Vec<u16>, AsmError> {
    assemble_program(source, cfg).map(|a| a.words)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, ResolveError};

    #[test]
    fn config_defaults_from_empty_json() {
        let cfg: AsmConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, AsmConfig::default());
        let cfg: AsmConfig = serde_json::from_str(r#"{"origin": 256}"#).unwrap();
        assert_eq!(cfg.origin, 256);
        assert!(!cfg.collect_errors);
    }

    #[test]
    fn symbols_and_words() {
        let src = "start:\n  ADDI, $r1, 1\nloop: BNEZ, $r1, loop\nHALT\nend:\n";
        let out = assemble_program(src, &AsmConfig::default()).unwrap();
        assert_eq!(out.words, vec![0x1101, 0x8180, 0xF001]);
        let names: Vec<_> = out.symbols.iter().map(|s| (s.name.as_str(), s.address)).collect();
        assert_eq!(names, [("start", 0), ("loop", 1), ("end", 3)]);
    }

    #[test]
    fn first_error_only_by_default() {
        let src = "FOO, $r1\nAND, $r1\n";
        let err = assemble(src, &AsmConfig::default()).unwrap_err();
        assert!(matches!(err, AsmError::Parse(ParseError::UnknownMnemonic { line_no: 1, .. })));
    }

    #[test]
    fn collect_reports_all() {
        let src = "FOO, $r1\nAND, $r1\n";
        let cfg = AsmConfig { collect_errors: true, ..Default::default() };
        let err = assemble(src, &cfg).unwrap_err();
        let lines: Vec<_> = err
            .errors()
            .into_iter()
            .map(|e| match e {
                AsmError::Parse(p) => p.line_no(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(lines, [1, 2]);
    }

    #[test]
    fn resolve_errors_are_collected() {
        let src = "JUMP, a\nJUMP, b\n";
        let cfg = AsmConfig { collect_errors: true, ..Default::default() };
        let err = assemble(src, &cfg).unwrap_err();
        assert_eq!(err.errors().len(), 2);
        assert!(err
            .errors()
            .iter()
            .all(|e| matches!(e, AsmError::Resolve(ResolveError::UndefinedLabel { .. }))));
    }
}
