//! Collider and zone trees to a collision file.
//!
//! Both trees share one file: a 16-byte header with the offsets of the two
//! sub-headers, then each tree's vertices, triangles, records and auxiliary
//! table (bounding boxes for colliders, camera blocks for zones).

use log::info;

use crate::codec::dedup::ValueTable;
use crate::codec::stream::BinWriter;
use crate::core::{Error, Result};
use crate::hit::{flatten, FlatEntry, HitObject, HitTree, CAMERA_WORDS};
use crate::math::Aabb;
use crate::mesh::Triangle;

/// Most vertices one tree may use; triangle indices are 10 bits wide.
pub const MAX_VERTICES: usize = 1024;

/// Size of one object record.
pub const RECORD_SIZE: usize = 12;

/// Words per collider bounding-box entry: min, max and the flags word.
pub const BOX_WORDS: usize = 7;

/// Bit set on triangles that only collide from the front.
pub const SINGLE_SIDED: u32 = 1 << 30;

/// Which of the two trees is being written; they differ only in their auxiliary table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreeKind {
    Colliders,
    Zones,
}

/// Compile both trees into one collision file.
pub fn compile_collision(colliders: &HitTree, zones: &HitTree) -> Result<Vec<u8>> {
    let mut w = BinWriter::new();
    w.bytes(&[0; 0x10])?;

    let collider_header = write_tree(&mut w, colliders, TreeKind::Colliders)?;
    let zone_header = write_tree(&mut w, zones, TreeKind::Zones)?;

    w.seek(0)?;
    w.u32(collider_header as u32)?;
    w.u32(zone_header as u32)?;

    let bytes = w.into_inner();
    info!(
        "Compiled {} colliders and {} zones, 0x{:X} bytes",
        colliders.len() - 1,
        zones.len() - 1,
        bytes.len()
    );
    Ok(bytes)
}

/// Pack one triangle's three vertex indices and sidedness.
pub fn pack_triangle(indices: [usize; 3], double_sided: bool) -> Result<u32> {
    let mut word = if double_sided { 0 } else { SINGLE_SIDED };
    for (k, &i) in indices.iter().enumerate() {
        if i >= MAX_VERTICES {
            return Err(Error::Capacity {
                what: "vertex index bits",
                count: i,
                limit: MAX_VERTICES,
            });
        }
        word |= (i as u32) << (10 * k);
    }
    Ok(word)
}

fn capacity(what: &'static str, count: usize, limit: usize) -> Result<()> {
    if count > limit {
        return Err(Error::Capacity { what, count, limit });
    }
    Ok(())
}

fn write_tree(w: &mut BinWriter, tree: &HitTree, kind: TreeKind) -> Result<usize> {
    let flat = flatten(tree)?;
    let objects: Vec<&HitObject> = flat
        .iter()
        .map(|e| {
            tree.get(e.id)
                .ok_or_else(|| Error::InvalidScene(format!("object {} missing", e.id.0)))
        })
        .collect::<Result<_>>()?;

    // aux word offsets are stored as i16
    let stride = match kind {
        TreeKind::Colliders => BOX_WORDS,
        TreeKind::Zones => CAMERA_WORDS,
    };
    capacity("objects", flat.len(), i16::MAX as usize / stride)?;

    // vertices, positions only
    let mut vertices: ValueTable<[i16; 3]> = ValueTable::new();
    for obj in &objects {
        for v in obj.vertices() {
            vertices.insert(v.position);
        }
    }
    capacity("vertices", vertices.len(), MAX_VERTICES)?;

    let vertex_offset = w.pos();
    for p in vertices.values() {
        for c in p {
            w.i16(*c)?;
        }
    }
    if vertices.len() % 2 == 1 {
        w.u16(0)?;
    }

    // triangles, last object first
    let mut triangle_offsets = vec![0usize; objects.len()];
    for (i, obj) in objects.iter().enumerate().rev() {
        if obj.triangles.is_empty() {
            continue;
        }
        capacity("triangles per object", obj.triangles.len(), u16::MAX as usize)?;
        triangle_offsets[i] = w.pos();
        for t in &obj.triangles {
            w.u32(pack(&vertices, t)?)?;
        }
    }

    // records
    let record_offset = w.pos();
    let mut camera_words = 0usize;
    for (i, (entry, obj)) in flat.iter().zip(&objects).enumerate() {
        let aux = match kind {
            TreeKind::Colliders => (BOX_WORDS * i) as i16,
            TreeKind::Zones if obj.camera.is_some() => {
                let at = camera_words as i16;
                camera_words += CAMERA_WORDS;
                at
            }
            TreeKind::Zones => -1,
        };
        write_record(w, entry, aux, obj.triangles.len() as u16, triangle_offsets[i] as u32)?;
    }

    // bounding boxes or camera blocks
    let aux_offset = w.pos();
    let aux_words = match kind {
        TreeKind::Colliders => {
            let bounds = tree.bounds();
            for (entry, obj) in flat.iter().zip(&objects) {
                for c in Aabb::corners(bounds[entry.id.0 as usize]) {
                    w.f32(c)?;
                }
                w.u32(obj.flag_bits())?;
            }
            BOX_WORDS * objects.len()
        }
        TreeKind::Zones => {
            for camera in objects.iter().filter_map(|o| o.camera.as_ref()) {
                for word in camera.to_words() {
                    w.u32(word)?;
                }
            }
            camera_words
        }
    };
    capacity("auxiliary words", aux_words, u16::MAX as usize)?;

    let header = w.pos();
    w.u16(objects.len() as u16)?;
    w.u16(0)?;
    w.u32(record_offset as u32)?;
    w.u16(vertices.len() as u16)?;
    w.u16(0)?;
    w.u32(vertex_offset as u32)?;
    w.u16(aux_words as u16)?;
    w.u16(0)?;
    w.u32(aux_offset as u32)?;
    w.align(16)?;

    Ok(header)
}

fn pack(vertices: &ValueTable<[i16; 3]>, t: &Triangle) -> Result<u32> {
    let mut indices = [0usize; 3];
    for (k, v) in t.vertices.iter().enumerate() {
        indices[k] = vertices
            .get(&v.position)
            .ok_or_else(|| Error::InvalidScene("triangle vertex missing from vertex table".into()))?;
    }
    pack_triangle(indices, t.double_sided)
}

fn write_record(w: &mut BinWriter, entry: &FlatEntry, aux: i16, triangles: u16, offset: u32) -> Result<()> {
    w.i16(aux)?;
    w.i16(entry.links.next)?;
    w.i16(entry.links.child)?;
    w.u16(triangles)?;
    w.u32(offset)
}
