use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use e93_rs::{assemble_program, AsmConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "e93 assembler")]
struct Opts {
    /// Input assembly file (one instruction or label per line)
    #[arg(short, long)]
    input: PathBuf,
    /// Output file
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long, value_enum, default_value_t = Format::Bin)]
    format: Format,
    /// Address of the first instruction; overrides the config file
    #[arg(long, value_parser = parse_u16)]
    origin: Option<u16>,
    /// Report every error instead of stopping at the first
    #[arg(long)]
    keep_going: bool,
    /// Write the symbol table as JSON
    #[arg(long, value_name = "FILE")]
    symbols: Option<PathBuf>,
    /// JSON assembler config (`{"origin": .., "collect_errors": ..}`)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    /// Little-endian 16-bit words
    Bin,
    /// One `xxxx` word per line
    Hex,
}

fn parse_u16(s: &str) -> Result<u16> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u16::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u16>()?)
    }
}

fn load_config(opts: &Opts) -> Result<AsmConfig> {
    let mut cfg: AsmConfig = match &opts.config {
        Some(path) => {
            let txt = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str(&txt).with_context(|| format!("parsing {}", path.display()))?
        }
        None => AsmConfig::default(),
    };
    if let Some(origin) = opts.origin { cfg.origin = origin; }
    if opts.keep_going { cfg.collect_errors = true; }
    Ok(cfg)
}

fn render(words: &[u16], format: Format) -> Vec<u8> {
    match format {
        Format::Bin => words.iter().flat_map(|w| w.to_le_bytes()).collect(),
        Format::Hex => {
            let mut s = String::new();
            for w in words { let _ = writeln!(s, "{w:04x}"); }
            s.into_bytes()
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let opts = Opts::parse();
    let cfg = load_config(&opts)?;
    let text = fs::read_to_string(&opts.input).with_context(|| format!("reading {}", opts.input.display()))?;

    let out = assemble_program(&text, &cfg).with_context(|| format!("assembling {}", opts.input.display()))?;
    tracing::info!(words = out.words.len(), symbols = out.symbols.len(), "assembled");

    fs::write(&opts.output, render(&out.words, opts.format))?;
    if let Some(path) = &opts.symbols {
        fs::write(path, serde_json::to_string_pretty(&out.symbols)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_formats() {
        let words = [0x0011, 0xF001];
        assert_eq!(render(&words, Format::Bin), vec![0x11, 0x00, 0x01, 0xF0]);
        assert_eq!(render(&words, Format::Hex), b"0011\nf001\n".to_vec());
    }

    #[test]
    fn flags_override_config() {
        let opts = Opts::parse_from(["e93-asm", "-i", "a.s", "-o", "a.bin", "--origin", "0x40", "--keep-going"]);
        let cfg = load_config(&opts).unwrap();
        assert_eq!(cfg, AsmConfig { origin: 0x40, collect_errors: true });
    }
}
