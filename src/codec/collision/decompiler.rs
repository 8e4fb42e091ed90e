//! Collision file back to collider and zone trees.

use log::info;

use crate::codec::report::{Decompiled, Warnings};
use crate::codec::stream::BinReader;
use crate::core::{Error, Result};
use crate::hit::{unflatten, CameraControl, CollisionTrees, FlatLinks, HitKind, HitObject, HitTree, CAMERA_WORDS};
use crate::mesh::{Triangle, Vertex};

use super::compiler::{TreeKind, RECORD_SIZE, SINGLE_SIDED};

/// Collider flag words seen in shipped maps; others are reported.
const KNOWN_FLAGS: [u32; 3] = [0x0000_0000, 0x0000_8000, 0x0001_8000];

/// Decompile a collision file. A zero sub-header offset yields an empty tree.
pub fn decompile_collision(bytes: &[u8]) -> Result<Decompiled<CollisionTrees>> {
    let mut r = BinReader::new(bytes);
    let mut warnings = Warnings::default();

    let collider_header = r.u32_at(0)? as usize;
    let zone_header = r.u32()? as usize;

    let colliders = read_tree(&mut r, collider_header, TreeKind::Colliders, &mut warnings)?;
    let zones = read_tree(&mut r, zone_header, TreeKind::Zones, &mut warnings)?;

    info!(
        "Decompiled {} colliders and {} zones ({} warnings)",
        colliders.len() - 1,
        zones.len() - 1,
        warnings.len()
    );
    Ok(warnings.finish(CollisionTrees { colliders, zones }))
}

fn read_tree(
    r: &mut BinReader<'_>,
    header: usize,
    kind: TreeKind,
    warnings: &mut Warnings,
) -> Result<HitTree> {
    if header == 0 {
        return Ok(HitTree::new());
    }

    r.seek(header)?;
    let count = r.u16()? as usize;
    r.u16()?;
    let record_offset = r.u32()? as usize;
    let vertex_count = r.u16()? as usize;
    r.u16()?;
    let vertex_offset = r.u32()? as usize;
    r.u16()?;
    r.u16()?;
    let aux_offset = r.u32()? as usize;

    r.seek(vertex_offset)?;
    let mut vertices = Vec::with_capacity(vertex_count);
    for _ in 0..vertex_count {
        vertices.push(Vertex::at(r.i16()?, r.i16()?, r.i16()?));
    }

    let mut objects = Vec::with_capacity(count);
    let mut links = Vec::with_capacity(count);
    for i in 0..count {
        let at = record_offset + RECORD_SIZE * i;
        r.seek(at)?;
        let aux = r.i16()?;
        let next = r.i16()?;
        let child = r.i16()?;
        let triangle_count = r.u16()? as usize;
        let triangle_offset = r.u32()? as usize;
        links.push(FlatLinks { child, next });

        let mut obj = match kind {
            TreeKind::Colliders => HitObject::new(format!("Collider {:04X}", i), HitKind::Group),
            TreeKind::Zones => HitObject::new(format!("Zone {:04X}", i), HitKind::Group),
        };

        if triangle_count > 0 {
            obj.kind = HitKind::Hit;
            r.seek(triangle_offset)?;
            for k in 0..triangle_count {
                let word = r.u32()?;
                obj.triangles.push(unpack_triangle(word, &vertices, triangle_offset + 4 * k)?);
            }
        }

        match kind {
            TreeKind::Colliders => {
                if aux < 0 {
                    return Err(Error::corrupt(at, format!("collider box offset {}", aux)));
                }
                // skip the box, it is recomputed from the triangles
                let flags_at = aux_offset + 4 * (aux as usize) + 24;
                let bits = r.u32_at(flags_at)?;
                obj.flags = bits & !0xFF;
                obj.surface = bits as u8;
                if !KNOWN_FLAGS.contains(&obj.flags) {
                    warnings.push(flags_at, format!("unusual collider flags {:08X} on {}", obj.flags, obj.name));
                }
            }
            TreeKind::Zones if aux >= 0 => {
                r.seek(aux_offset + 4 * aux as usize)?;
                let mut words = [0u32; CAMERA_WORDS];
                for w in words.iter_mut() {
                    *w = r.u32()?;
                }
                obj.camera = Some(CameraControl::from_words(&words));
            }
            TreeKind::Zones if aux == -1 => {}
            TreeKind::Zones => {
                return Err(Error::corrupt(at, format!("zone camera offset {}", aux)));
            }
        }
        objects.push(obj);
    }

    unflatten(objects, &links)
}

fn unpack_triangle(word: u32, vertices: &[Vertex], at: usize) -> Result<Triangle> {
    if word & 0x8000_0000 != 0 {
        return Err(Error::corrupt(at, format!("triangle {:08X} has bit 31 set", word)));
    }
    let mut corners = [Vertex::default(); 3];
    for (k, corner) in corners.iter_mut().enumerate() {
        let i = ((word >> (10 * k)) & 0x3FF) as usize;
        *corner = *vertices.get(i).ok_or_else(|| {
            Error::corrupt(at, format!("vertex index {} of {} out of range", i, vertices.len()))
        })?;
    }
    Ok(Triangle::new(corners[0], corners[1], corners[2]).double_sided(word & SINGLE_SIDED == 0))
}
