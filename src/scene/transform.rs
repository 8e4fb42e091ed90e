//! Fixed-point transform matrices

use glam::Mat4;

/// 4x4 transform in s15.16 fixed point, stored column by column.
///
/// Kept in the same integer form the microcode loads so that equality, hashing
/// and the compiled bytes all agree: two groups with identical transforms share
/// one matrix-table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TransformMatrix {
    pub cols: [[i32; 4]; 4],
}

impl TransformMatrix {
    /// Size of one compiled matrix.
    pub const COMPILED_SIZE: usize = 64;

    pub const IDENTITY: Self = Self {
        cols: [
            [0x10000, 0, 0, 0],
            [0, 0x10000, 0, 0],
            [0, 0, 0x10000, 0],
            [0, 0, 0, 0x10000],
        ],
    };

    /// Quantize a float matrix, truncating toward zero.
    pub fn from_mat4(m: Mat4) -> Self {
        let f = m.to_cols_array_2d();
        let mut cols = [[0i32; 4]; 4];
        for (c, col) in f.iter().enumerate() {
            for (r, v) in col.iter().enumerate() {
                cols[c][r] = (*v as f64 * 65536.0) as i32;
            }
        }
        Self { cols }
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self::from_mat4(Mat4::from_translation(glam::Vec3::new(x, y, z)))
    }

    pub fn to_mat4(&self) -> Mat4 {
        let mut f = [[0f32; 4]; 4];
        for (c, col) in self.cols.iter().enumerate() {
            for (r, v) in col.iter().enumerate() {
                f[c][r] = (*v as f64 / 65536.0) as f32;
            }
        }
        Mat4::from_cols_array_2d(&f)
    }

    /// Split into the 32 big-endian halves the microcode expects:
    /// all integer parts, then all fractional parts.
    pub fn to_halves(&self) -> [u16; 32] {
        let mut out = [0u16; 32];
        for (i, v) in self.cols.iter().flatten().enumerate() {
            out[i] = (*v >> 16) as u16;
            out[16 + i] = *v as u16;
        }
        out
    }

    pub fn from_halves(halves: &[u16; 32]) -> Self {
        let mut cols = [[0i32; 4]; 4];
        for i in 0..16 {
            let whole = halves[i] as u32;
            let frac = halves[16 + i] as u32;
            cols[i / 4][i % 4] = ((whole << 16) | frac) as i32;
        }
        Self { cols }
    }
}

impl Default for TransformMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_identity_round_trips_through_mat4() {
        assert_eq!(TransformMatrix::IDENTITY.to_mat4(), Mat4::IDENTITY);
        assert_eq!(TransformMatrix::from_mat4(Mat4::IDENTITY), TransformMatrix::IDENTITY);
    }

    #[test]
    fn test_translation_lands_in_last_column() {
        let m = TransformMatrix::from_translation(10.0, -2.5, 0.0);
        assert_eq!(m.cols[3], [10 << 16, -(5 << 15), 0, 0x10000]);
        let p = m.to_mat4().transform_point3(Vec3::ZERO);
        assert_eq!(p, Vec3::new(10.0, -2.5, 0.0));
    }

    #[test]
    fn test_halves_split_negative_values() {
        let mut m = TransformMatrix::IDENTITY;
        m.cols[3][0] = -0x18000; // -1.5
        let halves = m.to_halves();
        assert_eq!(halves[12], 0xFFFE);
        assert_eq!(halves[16 + 12], 0x8000);
        assert_eq!(TransformMatrix::from_halves(&halves), m);
    }
}
