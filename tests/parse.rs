use e93_rs::parser::{parse_line, parse_program};
use e93_rs::{AluFunc, Imm, Instruction, ParseError};
use pretty_assertions::assert_eq;

#[test]
fn missing_operand_names_the_line() {
    let err = parse_program("NOP\nAND, $r0\n").unwrap_err();
    assert!(matches!(err, ParseError::MalformedInstruction { line_no: 2, .. }));
    assert_eq!(err.line(), "AND, $r0");
}

#[test]
fn well_formed_and() {
    let i = parse_line("AND, $r0, $r1").unwrap().unwrap();
    assert_eq!(i, Instruction::alu(AluFunc::And, 0, 1).unwrap());
}

#[test]
fn whitespace_after_commas_is_optional() {
    let a = parse_line("ADD,$r1,$r2").unwrap();
    let b = parse_line("  add ,   $r1 ,$r2   ").unwrap();
    assert_eq!(a, b);
}

#[test]
fn register_bounds() {
    for n in 0..16 {
        assert!(parse_line(&format!("OR, $r{n}, $r0")).is_ok());
    }
    assert!(matches!(
        parse_line("OR, $r16, $r0"),
        Err(ParseError::RegisterOutOfRange { index: 16, .. })
    ));
    assert!(matches!(
        parse_line("OR, $r-1, $r0"),
        Err(ParseError::RegisterOutOfRange { index: -1, .. })
    ));
    // more digits than fit any integer is still an index out of range
    assert!(matches!(
        parse_line("OR, $r99999999999999999999, $r0"),
        Err(ParseError::RegisterOutOfRange { index: i64::MAX, .. })
    ));
    assert!(matches!(
        parse_line("OR, $r1, $r-99999999999999999999"),
        Err(ParseError::RegisterOutOfRange { index: i64::MIN, .. })
    ));
    assert!(matches!(parse_line("OR, r1, $r0"), Err(ParseError::MalformedRegister { .. })));
    assert!(matches!(parse_line("OR, $rx, $r0"), Err(ParseError::MalformedRegister { .. })));
}

#[test]
fn immediates() {
    assert_eq!(
        parse_line("ADDI, $r1, -5").unwrap().unwrap().imm(),
        Some(&Imm::Value(-5))
    );
    assert_eq!(
        parse_line("JUMP, done").unwrap().unwrap().label_ref(),
        Some("done")
    );
    // hex is not accepted
    assert!(matches!(
        parse_line("ADDI, $r1, 0x10"),
        Err(ParseError::MalformedImmediate { token, .. }) if token == "0x10"
    ));
    assert!(matches!(parse_line("ADDI, $r1, $r2"), Err(ParseError::MalformedImmediate { .. })));
}

#[test]
fn unknown_mnemonic() {
    let err = parse_program("NOP\nMOV, $r1, $r2\n").unwrap_err();
    assert_eq!(
        err,
        ParseError::UnknownMnemonic { line_no: 2, line: "MOV, $r1, $r2".into(), mnemonic: "MOV".into() }
    );
}

#[test]
fn comment_only_and_blank_lines() {
    assert_eq!(parse_line("# nothing here").unwrap(), None);
    assert_eq!(parse_line("   ").unwrap(), None);
    assert!(parse_program("# a\n\n# b\n").unwrap().is_empty());
}
