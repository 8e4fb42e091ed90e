//! Object name tables stored alongside geometry

use log::warn;

use crate::core::Result;
use crate::hit::{CollisionTrees, HitTree};

use super::config::CompileConfig;
use super::stream::BinReader;

/// Terminator entry of every name list.
pub const LIST_END: &str = "db";

/// Header slots holding the model, collider and zone name list pointers.
const NAME_SLOTS: [usize; 3] = [0x08, 0x0C, 0x10];

/// Names of the objects in a map, each list in post-order with the root left out.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NameTables {
    pub models: Vec<String>,
    pub colliders: Vec<String>,
    pub zones: Vec<String>,
}

impl NameTables {
    /// Rename collider and zone objects from the lists; objects past the end
    /// of a list keep their current names.
    pub fn apply_to_hits(&self, trees: &mut CollisionTrees) {
        rename(&mut trees.colliders, &self.colliders, "collider");
        rename(&mut trees.zones, &self.zones, "zone");
    }
}

fn rename(tree: &mut HitTree, names: &[String], what: &str) {
    let order = tree.post_order();
    if !names.is_empty() && names.len() != order.len() {
        warn!("{} {} names for {} objects", names.len(), what, order.len());
    }
    for (id, name) in order.into_iter().zip(names) {
        if let Some(obj) = tree.get_mut(id) {
            obj.name.clone_from(name);
        }
    }
}

/// Read the optional name lists from a geometry file header. A zero slot
/// yields an empty list.
pub fn read_name_tables(bytes: &[u8], config: &CompileConfig) -> Result<NameTables> {
    let mut r = BinReader::new(bytes);
    let [models, colliders, zones] = NAME_SLOTS.map(|slot| read_list(&mut r, config, slot));
    Ok(NameTables {
        models: models?,
        colliders: colliders?,
        zones: zones?,
    })
}

fn read_list(r: &mut BinReader<'_>, config: &CompileConfig, slot: usize) -> Result<Vec<String>> {
    let list = r.u32_at(slot)?;
    if list == 0 {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    let mut entry = config.to_offset(list, slot)?;
    loop {
        let ptr = r.u32_at(entry)?;
        r.seek(config.to_offset(ptr, entry)?)?;
        let name = r.c_string()?;
        if name == LIST_END {
            return Ok(names);
        }
        names.push(name);
        entry += 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::stream::BinWriter;

    #[test]
    fn test_reads_model_list_and_skips_empty_slots() {
        let cfg = CompileConfig::default();
        let mut w = BinWriter::new();
        w.bytes(&[0; 0x20]).unwrap();
        let strings = [("tree", 0x40), ("rock", 0x48), ("db", 0x50)];
        for (i, (_, at)) in strings.iter().enumerate() {
            w.seek(0x20 + 4 * i).unwrap();
            w.u32(cfg.to_ptr(*at)).unwrap();
        }
        for (s, at) in strings {
            w.seek(at).unwrap();
            w.bytes(s.as_bytes()).unwrap();
            w.u8(0).unwrap();
        }
        w.seek(0x08).unwrap();
        w.u32(cfg.to_ptr(0x20)).unwrap();
        let bytes = w.into_inner();

        let tables = read_name_tables(&bytes, &cfg).unwrap();
        assert_eq!(tables.models, ["tree", "rock"]);
        assert!(tables.colliders.is_empty());
        assert!(tables.zones.is_empty());
    }

    #[test]
    fn test_apply_to_hits_renames_in_post_order() {
        use crate::hit::HitObject;

        let mut trees = CollisionTrees::default();
        let root = trees.colliders.root();
        let group = trees.colliders.add(root, HitObject::group("g")).unwrap();
        let floor = trees.colliders.add(group, HitObject::group("a")).unwrap();

        let tables = NameTables {
            colliders: vec!["Floor".into(), "Room".into()],
            ..Default::default()
        };
        tables.apply_to_hits(&mut trees);

        assert_eq!(trees.colliders.get(floor).unwrap().name, "Floor");
        assert_eq!(trees.colliders.get(group).unwrap().name, "Room");
    }

    #[test]
    fn test_unterminated_list_is_corrupt() {
        let cfg = CompileConfig::default();
        let mut w = BinWriter::new();
        w.bytes(&[0; 0x20]).unwrap();
        w.seek(0x08).unwrap();
        w.u32(cfg.to_ptr(0x1C)).unwrap();
        let bytes = w.into_inner();
        assert!(read_name_tables(&bytes, &cfg).is_err());
    }
}
