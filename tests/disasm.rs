use e93_rs::parser::parse_line;
use e93_rs::{assemble, decode, fmt_instruction, fmt_word, AsmConfig};
use pretty_assertions::assert_eq;

#[test]
fn listing_reassembles_to_the_same_words() {
    let src = "\
start: ADDI, $r1, 5
loop: SUB, $r1, $r2
BNEZ, $r1, loop
LUI, $r4, 18
ORI, $r4, 52
LW, $r5, $r4
JAL, start
HALT
";
    let words = assemble(src, &AsmConfig::default()).unwrap();
    let listing: Vec<String> = words.iter().map(|&w| fmt_word(w)).collect();
    assert_eq!(listing[2], "BNEZ, $r1, -1");
    let again = assemble(&listing.join("\n"), &AsmConfig::default()).unwrap();
    assert_eq!(again, words);
}

#[test]
fn format_then_parse_is_identity() {
    for w in [0x0011u16, 0x0FE9, 0x12FF, 0x44AB, 0x5121, 0x83FE, 0x8305, 0x9FFF, 0xA123, 0xF000] {
        let instr = decode(w).unwrap();
        let text = fmt_instruction(&instr);
        assert_eq!(parse_line(&text).unwrap(), Some(instr), "{text}");
    }
}

#[test]
fn undecodable_words() {
    assert_eq!(fmt_word(0xB000), ".word 0xb000");
    assert_eq!(fmt_word(0x0000), ".word 0x0000");
}
