//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Axis-aligned bounding box in model units, stored as min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest AABB containing every point, or `None` for an empty iterator
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Self::new(first, first);
        for p in iter {
            aabb.expand(p);
        }
        Some(aabb)
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Return merged AABB containing both
    pub fn merged(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Union of two optional boxes; an empty side contributes nothing.
    pub fn union(a: Option<Aabb>, b: Option<Aabb>) -> Option<Aabb> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.merged(&b)),
            (a, None) => a,
            (None, b) => b,
        }
    }

    /// Min then max corner as six floats, the order both file formats store them in.
    /// An empty box is written as all zeros.
    pub fn corners(aabb: Option<Aabb>) -> [f32; 6] {
        match aabb {
            Some(b) => [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z],
            None => [0.0; 6],
        }
    }
}
