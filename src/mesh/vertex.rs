//! Vertex and triangle value types

use glam::Vec3;

/// Quantized mesh vertex.
///
/// Equality and hashing are by value: two vertices authored separately but
/// bit-identical share one vertex-table entry when compiled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vertex {
    pub position: [i16; 3],
    pub uv: [i16; 2],
    /// RGBA
    pub color: [u8; 4],
}

impl Vertex {
    /// Size of one compiled vertex record in a geometry file.
    pub const COMPILED_SIZE: usize = 16;

    /// Vertex at a position with zero UV and opaque white colour.
    pub const fn at(x: i16, y: i16, z: i16) -> Self {
        Self {
            position: [x, y, z],
            uv: [0, 0],
            color: [0xFF; 4],
        }
    }

    pub const fn with_uv(mut self, u: i16, v: i16) -> Self {
        self.uv = [u, v];
        self
    }

    pub const fn with_color(mut self, rgba: [u8; 4]) -> Self {
        self.color = rgba;
        self
    }

    pub fn position_vec3(&self) -> Vec3 {
        Vec3::new(
            self.position[0] as f32,
            self.position[1] as f32,
            self.position[2] as f32,
        )
    }
}

/// Triangle made of three vertex values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
    pub double_sided: bool,
}

impl Triangle {
    pub const fn new(a: Vertex, b: Vertex, c: Vertex) -> Self {
        Self {
            vertices: [a, b, c],
            double_sided: false,
        }
    }

    pub const fn double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }
}
