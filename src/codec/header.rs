//! C index headers for game scripts
//!
//! Scripts address models, colliders and zones by their post-order index in
//! the compiled tree. These helpers render `#define` lines for those indices.

use crate::hit::HitTree;
use crate::scene::ModelTree;

/// One `#define` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub name: String,
    pub index: usize,
}

/// Render `#define PREFIX_name 0xINDEX` lines followed by a blank line.
pub fn write_index_header(prefix: &str, entries: &[IndexEntry]) -> String {
    let mut out = String::new();
    for e in entries {
        let symbol = format!("{}_{}", prefix, e.name);
        out.push_str(&format!("#define {:<23} 0x{:X}\n", symbol, e.index));
    }
    out.push('\n');
    out
}

/// Every non-root model tree node with its post-order index.
pub fn model_index_entries(tree: &ModelTree) -> Vec<IndexEntry> {
    tree.post_order()
        .into_iter()
        .enumerate()
        .filter(|(_, id)| *id != tree.root())
        .filter_map(|(index, id)| {
            tree.get(id).map(|n| IndexEntry {
                name: n.name.clone(),
                index,
            })
        })
        .collect()
}

/// Every hit object with its index in the compiled array.
pub fn hit_index_entries(tree: &HitTree) -> Vec<IndexEntry> {
    tree.post_order()
        .into_iter()
        .enumerate()
        .filter_map(|(index, id)| {
            tree.get(id).map(|o| IndexEntry {
                name: o.name.clone(),
                index,
            })
        })
        .collect()
}
