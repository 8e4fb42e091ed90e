//! Flattening hit trees into linked arrays and back.
//!
//! The compiled format stores objects in one array, in depth-first
//! post-order with the root left out. Each entry links to its first child and
//! its next sibling by array index, `-1` meaning none. No entry stores its
//! parent; top-level objects are the ones nobody links to.

use crate::core::{Error, Result};

use super::object::{HitId, HitObject, HitTree};

/// Link value for "no such entry".
pub const NO_LINK: i16 = -1;

/// Child and sibling links of one array entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatLinks {
    pub child: i16,
    pub next: i16,
}

impl Default for FlatLinks {
    fn default() -> Self {
        Self {
            child: NO_LINK,
            next: NO_LINK,
        }
    }
}

/// One flattened object: which tree node it is and where it links to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlatEntry {
    pub id: HitId,
    pub links: FlatLinks,
}

/// Lay the tree out in post-order and compute each entry's links.
pub fn flatten(tree: &HitTree) -> Result<Vec<FlatEntry>> {
    let order = tree.post_order();
    if order.len() > i16::MAX as usize {
        return Err(Error::Capacity {
            what: "objects",
            count: order.len(),
            limit: i16::MAX as usize,
        });
    }

    let mut index = vec![NO_LINK; tree.len()];
    for (i, id) in order.iter().enumerate() {
        index[id.0 as usize] = i as i16;
    }

    let mut entries: Vec<FlatEntry> = order
        .iter()
        .map(|&id| FlatEntry {
            id,
            links: FlatLinks::default(),
        })
        .collect();

    for &id in &order {
        let children = tree.children(id);
        let pos = index[id.0 as usize] as usize;
        if let Some(first) = children.first() {
            entries[pos].links.child = index[first.0 as usize];
        }
        for pair in children.windows(2) {
            entries[index[pair[0].0 as usize] as usize].links.next = index[pair[1].0 as usize];
        }
    }

    // Siblings under the root still chain together in the array, matching the
    // bytes the game ships with, even though nothing links to the first one.
    for pair in tree.children(HitTree::ROOT).windows(2) {
        entries[index[pair[0].0 as usize] as usize].links.next = index[pair[1].0 as usize];
    }

    Ok(entries)
}

/// Rebuild a tree from array entries and their links.
///
/// `objects[i]` becomes entry `i`; any children already on it are discarded.
/// Entries that no chain reaches become children of the new root, in array
/// order.
pub fn unflatten(objects: Vec<HitObject>, links: &[FlatLinks]) -> Result<HitTree> {
    let n = objects.len();
    if links.len() != n {
        return Err(Error::BrokenTree {
            index: n.min(links.len()),
            reason: format!("{} objects but {} link records", n, links.len()),
        });
    }

    let resolve = |at: usize, link: i16| -> Result<Option<usize>> {
        match link {
            NO_LINK => Ok(None),
            l if l >= 0 && (l as usize) < n => Ok(Some(l as usize)),
            l => Err(Error::BrokenTree {
                index: at,
                reason: format!("link {} out of range 0..{}", l, n),
            }),
        }
    };

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut attached = vec![false; n];

    for i in 0..n {
        let mut next = resolve(i, links[i].child)?;
        while let Some(c) = next {
            if attached[c] || c == i {
                return Err(Error::BrokenTree {
                    index: c,
                    reason: "entry attached twice or to itself".into(),
                });
            }
            attached[c] = true;
            children[i].push(c);
            next = resolve(c, links[c].next)?;
        }
    }

    let orphans: Vec<usize> = (0..n).filter(|&i| !attached[i]).collect();

    // Every entry reachable from the root exactly once, or the links contain a cycle.
    let mut seen = vec![false; n];
    let mut stack = orphans.clone();
    let mut reached = 0;
    while let Some(i) = stack.pop() {
        if !seen[i] {
            seen[i] = true;
            reached += 1;
            stack.extend(children[i].iter().copied());
        }
    }
    if reached != n {
        let index = seen.iter().position(|s| !s).unwrap_or(0);
        return Err(Error::BrokenTree {
            index,
            reason: "entry is part of a cycle".into(),
        });
    }

    let mut tree = HitTree::new();
    // Entry i becomes HitId(i + 1); the root keeps id 0.
    let to_id = |i: usize| HitId(i as u32 + 1);
    for mut obj in objects {
        obj.children.clear();
        tree.push_detached(obj);
    }
    for (i, list) in children.into_iter().enumerate() {
        if let Some(obj) = tree.get_mut(to_id(i)) {
            obj.children = list.into_iter().map(to_id).collect();
        }
    }
    if let Some(root) = tree.get_mut(HitTree::ROOT) {
        root.children = orphans.into_iter().map(to_id).collect();
    }
    Ok(tree)
}
