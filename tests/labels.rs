use e93_rs::parser::parse_program;
use e93_rs::{assemble, assemble_program, resolve, AsmConfig, AsmError, Imm, ResolveError};
use pretty_assertions::assert_eq;

fn asm(src: &str) -> Result<Vec<u16>, AsmError> {
    assemble(src, &AsmConfig::default())
}

#[test]
fn forward_reference() {
    let src = "JUMP, L1\nAND, $r0, $r1\nL1:\nHALT\n";
    let resolved = resolve(parse_program(src).unwrap()).unwrap();
    assert_eq!(resolved[0].instruction.imm(), Some(&Imm::Value(2)));
    assert_eq!(asm(src).unwrap(), vec![0x9002, 0x0011, 0xF001]);
}

#[test]
fn backward_reference() {
    let src = "top: NOP\nNOP\nJAL, top\n";
    assert_eq!(asm(src).unwrap(), vec![0xF000, 0xF000, 0xA000]);
}

#[test]
fn branch_offsets_are_relative() {
    let src = "\
BEQZ, $r1, out   # +3
back: NOP
BNEZ, $r2, back  # -1
out: HALT
";
    let out = assemble_program(src, &AsmConfig::default()).unwrap();
    let offsets: Vec<_> = out.statements.iter().map(|s| s.instruction.imm().cloned()).collect();
    assert_eq!(offsets, vec![Some(Imm::Value(3)), None, Some(Imm::Value(-1)), None]);
}

#[test]
fn comments_and_blank_lines_take_no_address() {
    let src = "# header\n\n   # indented\nNOP\n# between\nend:\n";
    let out = assemble_program(src, &AsmConfig::default()).unwrap();
    assert_eq!(out.words.len(), 1);
    assert_eq!(out.symbols[0].address, 1);
    assert_eq!(out.statements[0].line_no, 4);
}

#[test]
fn duplicate_label() {
    let err = asm("dup: NOP\nNOP\ndup:\nHALT\n").unwrap_err();
    assert_eq!(
        err,
        AsmError::Resolve(ResolveError::DuplicateLabel { name: "dup".into(), line_no: 3, first_line_no: 1 })
    );
}

#[test]
fn labels_are_case_sensitive() {
    let err = asm("Loop: NOP\nJUMP, loop\n").unwrap_err();
    match err {
        AsmError::Resolve(ResolveError::UndefinedLabel { name, address, line_no, line }) => {
            assert_eq!(name, "loop");
            assert_eq!(address, 1);
            assert_eq!(line_no, 2);
            assert_eq!(line, "JUMP, loop");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn branch_out_of_reach() {
    let mut src = String::from("BEQZ, $r0, far\n");
    for _ in 0..64 {
        src.push_str("NOP\n");
    }
    src.push_str("far: HALT\n");
    let err = asm(&src).unwrap_err();
    assert!(matches!(
        err,
        AsmError::Resolve(ResolveError::ImmediateOverflow { value: 65, min: -64, max: 63, address: 0, line_no: 1, label: Some(ref l) }) if l == "far"
    ));
}

#[test]
fn literal_overflow_is_rejected_not_truncated() {
    let err = asm("NOP\nADDI, $r1, 300\n").unwrap_err();
    assert!(matches!(
        err,
        AsmError::Resolve(ResolveError::ImmediateOverflow { value: 300, address: 1, line_no: 2, label: None, .. })
    ));
    assert!(asm("ANDI, $r1, -1\n").is_err());
}

#[test]
fn literal_wider_than_any_integer_type_is_an_overflow() {
    let err = asm("ADDI, $r1, 3000000000\n").unwrap_err();
    assert!(matches!(
        err,
        AsmError::Resolve(ResolveError::ImmediateOverflow { min: -128, max: 127, address: 0, line_no: 1, label: None, .. })
    ));
    let err = asm("NOP\nJUMP, -99999999999999999999\n").unwrap_err();
    assert!(matches!(err, AsmError::Resolve(ResolveError::ImmediateOverflow { line_no: 2, .. })));
}

#[test]
fn duplicate_defined_after_its_use() {
    let err = asm("JUMP, here\nhere: NOP\nhere: HALT\n").unwrap_err();
    assert_eq!(
        err,
        AsmError::Resolve(ResolveError::DuplicateLabel { name: "here".into(), line_no: 3, first_line_no: 2 })
    );
}

#[test]
fn collect_mode_reports_every_duplicate_label() {
    let cfg = AsmConfig { collect_errors: true, ..Default::default() };
    let err = assemble("a: NOP\na: NOP\nb: NOP\nb:\n", &cfg).unwrap_err();
    assert_eq!(
        err,
        AsmError::Multiple(vec![
            AsmError::Resolve(ResolveError::DuplicateLabel { name: "a".into(), line_no: 2, first_line_no: 1 }),
            AsmError::Resolve(ResolveError::DuplicateLabel { name: "b".into(), line_no: 4, first_line_no: 3 }),
        ])
    );
}

#[test]
fn origin_offsets_absolute_labels() {
    let cfg = AsmConfig { origin: 0x100, ..Default::default() };
    let out = assemble_program("start: NOP\nJUMP, start\nBNEZ, $r1, start\n", &cfg).unwrap();
    assert_eq!(out.statements[1].address, 0x101);
    assert_eq!(out.words, vec![0xF000, 0x9100, 0x81FE]);
    assert_eq!(out.symbols[0].address, 0x100);
}

#[test]
fn collect_mode_reports_every_pass_two_failure() {
    let src = "JUMP, nowhere\nADDI, $r1, 999\nBEQZ, $r1, also_nowhere\n";
    let cfg = AsmConfig { collect_errors: true, ..Default::default() };
    let err = assemble(src, &cfg).unwrap_err();
    assert!(matches!(err, AsmError::Multiple(ref all) if all.len() == 3));
    assert!(err.to_string().starts_with("3 errors:"));

    // default mode stops at the first
    let err = asm(src).unwrap_err();
    assert!(matches!(err, AsmError::Resolve(ResolveError::UndefinedLabel { line_no: 1, .. })));
}
