use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use e93_rs::{decode, fmt_instruction, fmt_word};
use e93_disasm::analyze::{analyze_entries, auto_labels, build_blocks, symbolize, Block, EdgeOut};
use e93_disasm::model::{load_hex_text, load_raw_bin, read_word, Image};

#[derive(Parser, Debug)]
#[command(author, version, about = "e93 disassembler CLI", long_about=None)]
struct Cli {
    /// Load address of the first word
    #[arg(long, default_value = "0", value_parser = parse_u16)]
    base: u16,
    /// How the input file is laid out
    #[arg(long, value_enum, default_value_t = InputFormat::Bin)]
    input_format: InputFormat,
    /// Input image path
    #[arg(value_name = "FILE")]
    input: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Linear disassembly of [start, end) in words (default: whole image)
    Range {
        #[arg(value_parser = parse_u16)]
        start: Option<u16>,
        /// Exclusive
        #[arg(value_parser = parse_u16)]
        end: Option<u16>,
        /// Show the raw instruction word
        #[arg(long)]
        show_words: bool,
        /// Write output to file instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
    /// Follow control flow from entry points and print a labelled listing
    Analyze {
        /// Entry addresses (hex or dec). Repeat flag to add multiple entries.
        #[arg(long = "entry", value_name = "ADDR", value_parser = parse_u16)]
        entries: Vec<u16>,
        /// Maximum instructions to decode before stopping
        #[arg(long, default_value_t = 65_536usize)]
        max_instr: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[arg(long)]
        show_words: bool,
        /// Import labels from JSON (Vec<{ addr, name }>), e.g. `e93-asm --symbols`
        #[arg(long, value_name = "FILE")]
        labels_in: Option<String>,
        /// Export labels to JSON (Vec<{ addr, name }>)
        #[arg(long, value_name = "FILE")]
        labels_out: Option<String>,
        #[arg(long, value_name = "FILE")]
        out: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormat { Bin, Hex }

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat { Text, Json }

fn parse_u16(s: &str) -> Result<u16> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Ok(u16::from_str_radix(hex, 16)?)
    } else {
        Ok(s.parse::<u16>()?)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
struct BlockOut { start: u32, end: u32, insns: Vec<String> }

/// Shared with the assembler's `--symbols` output, which also carries `line_no`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LabelKV {
    #[serde(alias = "address")]
    addr: u32,
    name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
struct Report {
    entries: Vec<u32>,
    blocks: Vec<BlockOut>,
    edges: Vec<EdgeOut>,
    labels: Vec<LabelKV>,
}

fn line_for(img: &Image, pc: u32, show_words: bool, labels: &BTreeMap<u32, String>) -> String {
    let Some(raw) = read_word(img, pc) else { return format!("{pc:#06x}: <oob>") };
    let text = match decode(raw) {
        Ok(instr) => fmt_instruction(&symbolize(pc, &instr, labels)),
        Err(_) => fmt_word(raw),
    };
    if show_words { format!("{pc:#06x}: {raw:04x}  {text}") } else { format!("{pc:#06x}: {text}") }
}

fn render_blocks(img: &Image, blocks: &[Block], show_words: bool, labels: &BTreeMap<u32, String>) -> Vec<BlockOut> {
    blocks
        .iter()
        .map(|b| BlockOut {
            start: b.start,
            end: b.end,
            insns: (b.start..b.end).map(|pc| line_for(img, pc, show_words, labels)).collect(),
        })
        .collect()
}

fn read_labels(path: &str) -> Result<BTreeMap<u32, String>> {
    let txt = std::fs::read_to_string(path)?;
    let v: Vec<LabelKV> = serde_json::from_str(&txt)?;
    Ok(v.into_iter().map(|kv| (kv.addr, kv.name)).collect())
}

fn write_labels(path: &str, labels: &BTreeMap<u32, String>) -> Result<()> {
    let arr: Vec<LabelKV> = labels.iter().map(|(a, n)| LabelKV { addr: *a, name: n.clone() }).collect();
    std::fs::write(path, serde_json::to_string_pretty(&arr)?)?;
    Ok(())
}

fn emit(out: Option<String>, text: &str) -> Result<()> {
    if let Some(path) = out { std::fs::write(path, text)?; } else { print!("{text}"); }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let path = Path::new(&cli.input);
    let img = match cli.input_format {
        InputFormat::Bin => load_raw_bin(path, cli.base)?,
        InputFormat::Hex => load_hex_text(path, cli.base)?,
    };
    tracing::debug!(base = img.base, words = img.words.len(), "image loaded");

    match cli.cmd {
        Command::Range { start, end, show_words, out } => {
            let start = start.map_or(img.base as u32, u32::from);
            let end = end.map_or(img.end(), u32::from);
            anyhow::ensure!(end >= start, "end must be >= start");
            let mut buf = String::new();
            for pc in start..end {
                let _ = writeln!(buf, "{}", line_for(&img, pc, show_words, &BTreeMap::new()));
            }
            emit(out, &buf)?;
        }
        Command::Analyze { entries, max_instr, format, show_words, labels_in, labels_out, out } => {
            let mut seeds: Vec<u32> = entries.into_iter().map(u32::from).collect();
            if seeds.is_empty() { seeds.push(img.base as u32); }
            seeds.sort_unstable();
            seeds.dedup();

            let (visited, edges, _stops) = analyze_entries(&img, &seeds, max_instr);
            let blocks = build_blocks(&seeds, &visited, &edges);
            let imported = match &labels_in { Some(p) => read_labels(p)?, None => BTreeMap::new() };
            let labels = auto_labels(&seeds, &edges, imported);
            if let Some(p) = &labels_out { write_labels(p, &labels)?; }

            let edges_out: Vec<EdgeOut> = edges
                .iter()
                .map(|e| EdgeOut { from: e.from, to: e.to, kind: e.kind.short().to_string() })
                .collect();

            match format {
                OutputFormat::Json => {
                    let report = Report {
                        entries: seeds,
                        blocks: render_blocks(&img, &blocks, show_words, &labels),
                        edges: edges_out,
                        labels: labels.iter().map(|(a, n)| LabelKV { addr: *a, name: n.clone() }).collect(),
                    };
                    let json = serde_json::to_string_pretty(&report)?;
                    emit(out, &(json + "\n"))?;
                }
                OutputFormat::Text => {
                    let mut buf = String::new();
                    let _ = writeln!(buf, "; entries {:?}, {} insts, {} blocks, {} edges",
                        seeds.iter().map(|a| format!("{a:#06x}")).collect::<Vec<_>>(),
                        visited.len(), blocks.len(), edges_out.len());
                    for b in render_blocks(&img, &blocks, show_words, &labels) {
                        if let Some(lbl) = labels.get(&b.start) { let _ = writeln!(buf, "{lbl}:"); }
                        for l in b.insns { let _ = writeln!(buf, "  {l}"); }
                    }
                    emit(out, &buf)?;
                }
            }
        }
    }

    Ok(())
}
