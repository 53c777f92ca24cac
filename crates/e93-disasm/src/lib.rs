pub mod analyze;
pub mod model;

pub use analyze::{analyze_entries, auto_labels, build_blocks, symbolize, Block, Edge, EdgeKind, EdgeOut};
pub use model::{load_hex_text, load_raw_bin, read_word, Image};
