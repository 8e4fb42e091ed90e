//! Collision and zone objects
//!
//! Hit trees hold colliders (solid surfaces) or zones (camera volumes). The
//! arena keeps child lists only; nothing in the compiled format points back
//! to a parent, so neither does the in-memory tree.

use crate::core::{Error, Result};
use crate::math::Aabb;
use crate::mesh::{Triangle, Vertex};

use super::camera::CameraControl;

/// Identifier of an object within one [`HitTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HitId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HitKind {
    /// The synthetic root, never compiled.
    Root,
    /// An object with triangles.
    Hit,
    /// An object whose only purpose is to hold children.
    Group,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HitObject {
    pub name: String,
    pub kind: HitKind,
    pub triangles: Vec<Triangle>,
    /// Collider flags, upper 24 bits only.
    pub flags: u32,
    /// Surface type, stored in the low byte of the flags word.
    pub surface: u8,
    /// Zones only.
    pub camera: Option<CameraControl>,
    pub children: Vec<HitId>,
}

impl HitObject {
    pub fn new(name: impl Into<String>, kind: HitKind) -> Self {
        Self {
            name: name.into(),
            kind,
            triangles: Vec::new(),
            flags: 0,
            surface: 0,
            camera: None,
            children: Vec::new(),
        }
    }

    /// A collider or zone with triangles.
    pub fn hit(name: impl Into<String>, triangles: Vec<Triangle>) -> Self {
        Self {
            triangles,
            ..Self::new(name, HitKind::Hit)
        }
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(name, HitKind::Group)
    }

    pub fn with_surface(mut self, flags: u32, surface: u8) -> Self {
        self.flags = flags & !0xFF;
        self.surface = surface;
        self
    }

    pub fn with_camera(mut self, camera: CameraControl) -> Self {
        self.camera = Some(camera);
        self
    }

    /// Packed flags word: upper bits from `flags`, low byte from `surface`.
    pub fn flag_bits(&self) -> u32 {
        (self.flags & !0xFF) | self.surface as u32
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.triangles.iter().flat_map(|t| t.vertices.iter())
    }

    /// Bounds of this object's own triangles.
    pub fn mesh_bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.vertices().map(Vertex::position_vec3))
    }
}

/// Arena of hit objects with a synthetic root at id 0.
#[derive(Clone, Debug, PartialEq)]
pub struct HitTree {
    objects: Vec<HitObject>,
}

impl HitTree {
    pub const ROOT: HitId = HitId(0);

    pub fn new() -> Self {
        Self {
            objects: vec![HitObject::new("Root", HitKind::Root)],
        }
    }

    pub fn root(&self) -> HitId {
        Self::ROOT
    }

    /// Append `object` as the last child of `parent`.
    pub fn add(&mut self, parent: HitId, object: HitObject) -> Result<HitId> {
        if object.kind == HitKind::Root {
            return Err(Error::InvalidScene(format!(
                "'{}' cannot be a second root",
                object.name
            )));
        }
        let id = HitId(self.objects.len() as u32);
        self.objects
            .get_mut(parent.0 as usize)
            .ok_or_else(|| Error::InvalidScene(format!("parent object {} does not exist", parent.0)))?
            .children
            .push(id);
        self.objects.push(object);
        Ok(id)
    }

    /// Append an object nobody links to yet; the caller wires children up.
    pub(crate) fn push_detached(&mut self, object: HitObject) -> HitId {
        self.objects.push(object);
        HitId(self.objects.len() as u32 - 1)
    }

    pub fn get(&self, id: HitId) -> Option<&HitObject> {
        self.objects.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: HitId) -> Option<&mut HitObject> {
        self.objects.get_mut(id.0 as usize)
    }

    pub fn children(&self, id: HitId) -> &[HitId] {
        self.get(id).map(|o| o.children.as_slice()).unwrap_or(&[])
    }

    /// Number of objects, root included.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.len() == 1
    }

    /// Object ids with children before their parent, root excluded.
    pub fn post_order(&self) -> Vec<HitId> {
        let mut out = Vec::with_capacity(self.objects.len());
        let mut stack: Vec<(HitId, bool)> = self
            .children(Self::ROOT)
            .iter()
            .rev()
            .map(|&c| (c, false))
            .collect();
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            stack.extend(self.children(id).iter().rev().map(|&c| (c, false)));
        }
        out
    }

    /// Bounds of every object, indexed by id: a hit covers its own
    /// triangles, a group covers its children.
    pub fn bounds(&self) -> Vec<Option<Aabb>> {
        let mut out: Vec<Option<Aabb>> = vec![None; self.objects.len()];
        for id in self.post_order() {
            let obj = &self.objects[id.0 as usize];
            out[id.0 as usize] = match obj.kind {
                HitKind::Hit => obj.mesh_bounds(),
                _ => obj
                    .children
                    .iter()
                    .fold(None, |acc, c| Aabb::union(acc, out[c.0 as usize])),
            };
        }
        out
    }
}

impl Default for HitTree {
    fn default() -> Self {
        Self::new()
    }
}

/// The two trees stored in one collision file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionTrees {
    pub colliders: HitTree,
    pub zones: HitTree,
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn tri(x: i16) -> Triangle {
        Triangle::new(Vertex::at(x, 0, 0), Vertex::at(x + 1, 0, 0), Vertex::at(x, 0, 1))
    }

    #[test]
    fn test_post_order_excludes_root() {
        let mut tree = HitTree::new();
        let g = tree.add(HitTree::ROOT, HitObject::group("g")).unwrap();
        let a = tree.add(g, HitObject::hit("a", vec![tri(0)])).unwrap();
        let b = tree.add(HitTree::ROOT, HitObject::hit("b", vec![tri(5)])).unwrap();
        assert_eq!(tree.post_order(), vec![a, g, b]);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_group_bounds_cover_children() {
        let mut tree = HitTree::new();
        let g = tree.add(HitTree::ROOT, HitObject::group("g")).unwrap();
        tree.add(g, HitObject::hit("a", vec![tri(0)])).unwrap();
        tree.add(g, HitObject::hit("b", vec![tri(10)])).unwrap();
        let empty = tree.add(HitTree::ROOT, HitObject::group("empty")).unwrap();

        let bounds = tree.bounds();
        let gb = bounds[g.0 as usize].unwrap();
        assert_eq!(gb.min, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(gb.max, Vec3::new(11.0, 0.0, 1.0));
        assert!(bounds[empty.0 as usize].is_none());
    }

    #[test]
    fn test_flag_bits() {
        let obj = HitObject::hit("floor", vec![]).with_surface(0x0001_80FF, 3);
        assert_eq!(obj.flags, 0x0001_8000);
        assert_eq!(obj.flag_bits(), 0x0001_8003);
    }

    #[test]
    fn test_second_root_rejected() {
        let mut tree = HitTree::new();
        let err = tree.add(HitTree::ROOT, HitObject::new("r", HitKind::Root));
        assert!(err.is_err());
    }
}
