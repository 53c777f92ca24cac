use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use e93_rs::{decode, Imm, Instruction, SysFunc};

use crate::model::{is_mapped, read_word, Image};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind { Fallthrough, Branch, CondBranch, Call }

impl EdgeKind {
    pub fn short(self) -> &'static str {
        match self {
            EdgeKind::Fallthrough => "ft",
            EdgeKind::Branch => "br",
            EdgeKind::CondBranch => "cbr",
            EdgeKind::Call => "call",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge { pub from: u32, pub to: u32, pub kind: EdgeKind }

/// Where control can go after the instruction at `pc`.
pub fn successors(pc: u32, instr: &Instruction) -> Vec<(u32, EdgeKind)> {
    let ft = pc + 1;
    let target = |imm: &Imm| imm.value().map(|v| v as u32);
    match instr {
        Instruction::Jump { target: t } => target(t).map(|to| vec![(to, EdgeKind::Branch)]).unwrap_or_default(),
        Instruction::Branch { offset, .. } => {
            let mut out = Vec::new();
            if let Some(off) = offset.value() {
                out.push(((pc as i64 + off as i64) as u32 & 0xFFFF, EdgeKind::CondBranch));
            }
            out.push((ft, EdgeKind::Fallthrough));
            out
        }
        Instruction::Jal { target: t } => {
            let mut out: Vec<_> = target(t).map(|to| (to, EdgeKind::Call)).into_iter().collect();
            out.push((ft, EdgeKind::Fallthrough));
            out
        }
        Instruction::Sys { func: SysFunc::Halt } => vec![],
        _ => vec![(ft, EdgeKind::Fallthrough)],
    }
}

/// Recursive traversal from `entries`.
///
/// Returns the decoded addresses, every edge found, and the addresses that
/// end a path (HALT).
pub fn analyze_entries(img: &Image, entries: &[u32], max_instr: usize) -> (HashSet<u32>, Vec<Edge>, HashSet<u32>) {
    let mut queue: VecDeque<u32> = entries.iter().copied().filter(|&e| is_mapped(img, e)).collect();
    let mut visited: HashSet<u32> = HashSet::new();
    let mut edges: Vec<Edge> = Vec::new();
    let mut stops: HashSet<u32> = HashSet::new();
    while let Some(pc) = queue.pop_front() {
        if visited.len() >= max_instr { break; }
        if visited.contains(&pc) { continue; }
        let Some(raw) = read_word(img, pc) else { continue };
        let Ok(instr) = decode(raw) else { continue };
        visited.insert(pc);
        let succ = successors(pc, &instr);
        if succ.is_empty() {
            stops.insert(pc);
        }
        for (to, kind) in succ {
            edges.push(Edge { from: pc, to, kind });
            if is_mapped(img, to) && !visited.contains(&to) { queue.push_back(to); }
        }
    }
    debug!(insts = visited.len(), edges = edges.len(), "analysis done");
    (visited, edges, stops)
}

#[derive(Debug, Clone, Serialize)]
pub struct Block { pub start: u32, pub end: u32 }

#[derive(Debug, Clone, Serialize)]
pub struct EdgeOut { pub from: u32, pub to: u32, pub kind: String }

/// Splits the visited addresses into straight-line blocks.
///
/// A block starts at an entry or an edge target other than a fallthrough,
/// and ends after a branch, a call, a HALT, or before the next start.
pub fn build_blocks(entries: &[u32], visited: &HashSet<u32>, edges: &[Edge]) -> Vec<Block> {
    let mut starts: HashSet<u32> = entries.iter().copied().collect();
    let mut enders: HashSet<u32> = HashSet::new();
    let sources: HashSet<u32> = edges.iter().map(|e| e.from).collect();
    for e in edges {
        if e.kind != EdgeKind::Fallthrough {
            starts.insert(e.to);
            enders.insert(e.from);
        }
    }
    let mut pcs: Vec<u32> = visited.iter().copied().collect();
    pcs.sort_unstable();

    let mut blocks = Vec::new();
    let mut cur: Option<u32> = None;
    let mut prev = 0u32;
    for pc in pcs {
        if let Some(start) = cur {
            if pc != prev + 1 || starts.contains(&pc) {
                blocks.push(Block { start, end: prev + 1 });
                cur = None;
            }
        }
        if cur.is_none() { cur = Some(pc); }
        prev = pc;
        if enders.contains(&pc) || !sources.contains(&pc) {
            if let Some(start) = cur.take() { blocks.push(Block { start, end: pc + 1 }); }
        }
    }
    if let Some(start) = cur { blocks.push(Block { start, end: prev + 1 }); }
    blocks
}

/// Names for listing: `sub_XXXX` for entries and call targets, `loc_XXXX`
/// for other branch targets. Imported names win.
pub fn auto_labels(entries: &[u32], edges: &[Edge], imported: BTreeMap<u32, String>) -> BTreeMap<u32, String> {
    let mut labels = imported;
    for &e in entries { labels.entry(e).or_insert_with(|| format!("sub_{e:04x}")); }
    for e in edges {
        match e.kind {
            EdgeKind::Call => { labels.entry(e.to).or_insert_with(|| format!("sub_{:04x}", e.to)); }
            EdgeKind::Branch | EdgeKind::CondBranch => {
                labels.entry(e.to).or_insert_with(|| format!("loc_{:04x}", e.to));
            }
            EdgeKind::Fallthrough => {}
        }
    }
    labels
}

/// Rewrites a control-flow operand to a label name where one is known.
pub fn symbolize(pc: u32, instr: &Instruction, labels: &BTreeMap<u32, String>) -> Instruction {
    let mut out = instr.clone();
    let dest = match instr {
        Instruction::Jump { target } | Instruction::Jal { target } => target.value().map(|v| v as u32),
        Instruction::Branch { offset, .. } => offset.value().map(|o| (pc as i64 + o as i64) as u32 & 0xFFFF),
        _ => None,
    };
    if let (Some(to), Some(imm)) = (dest, out.imm_mut()) {
        if let Some(name) = labels.get(&to) { *imm = Imm::label(name.clone()); }
    }
    out
}
