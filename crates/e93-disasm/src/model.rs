use anyhow::Result;
use std::path::Path;

/// A flat run of instruction words. Addresses count words, not bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub base: u16,
    pub words: Vec<u16>,
}

impl Image {
    pub fn new(base: u16, words: Vec<u16>) -> Self {
        Self { base, words }
    }

    /// One past the last mapped address.
    pub fn end(&self) -> u32 {
        self.base as u32 + self.words.len() as u32
    }
}

/// Little-endian words, as written by `e93-asm --format bin`.
pub fn words_from_le_bytes(bytes: &[u8]) -> Result<Vec<u16>> {
    anyhow::ensure!(bytes.len() % 2 == 0, "binary has odd length {}", bytes.len());
    Ok(bytes.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
}

/// Whitespace-separated hex words, optionally `0x`-prefixed. `#` starts a comment.
pub fn words_from_hex_text(text: &str) -> Result<Vec<u16>> {
    let mut words = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        for tok in line.split_whitespace() {
            let digits = tok.strip_prefix("0x").or_else(|| tok.strip_prefix("0X")).unwrap_or(tok);
            let w = u16::from_str_radix(digits, 16)
                .map_err(|e| anyhow::anyhow!("line {}: bad hex word `{tok}`: {e}", i + 1))?;
            words.push(w);
        }
    }
    Ok(words)
}

pub fn load_raw_bin(path: &Path, base: u16) -> Result<Image> {
    let bytes = std::fs::read(path)?;
    let img = Image::new(base, words_from_le_bytes(&bytes)?);
    anyhow::ensure!(img.end() <= 0x1_0000, "image does not fit the 16-bit address space");
    Ok(img)
}

pub fn load_hex_text(path: &Path, base: u16) -> Result<Image> {
    let text = std::fs::read_to_string(path)?;
    let img = Image::new(base, words_from_hex_text(&text)?);
    anyhow::ensure!(img.end() <= 0x1_0000, "image does not fit the 16-bit address space");
    Ok(img)
}

pub fn read_word(img: &Image, addr: u32) -> Option<u16> {
    let off = addr.checked_sub(img.base as u32)? as usize;
    img.words.get(off).copied()
}

pub fn is_mapped(img: &Image, addr: u32) -> bool {
    read_word(img, addr).is_some()
}
