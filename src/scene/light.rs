//! Light sets referenced by model groups

use std::fmt;

/// Index of a light set in its tree's light-set list.
///
/// Groups share a light set by pointing at the same id; two distinct sets with
/// equal contents stay distinct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightSetId(pub u32);

impl fmt::Display for LightSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LightSet#{}", self.0)
    }
}

/// Directional light: colour and a signed direction vector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Light {
    pub color: [u8; 3],
    pub direction: [i8; 3],
}

impl Light {
    /// Four compiled words: colour twice, direction, zero.
    pub fn packed(&self) -> [u32; 4] {
        let color = pack_rgb(self.color);
        let dir = pack_rgb(self.direction.map(|d| d as u8));
        [color, color, dir, 0]
    }

    pub fn from_packed(color: u32, direction: u32) -> Self {
        let d = unpack_rgb(direction);
        Self {
            color: unpack_rgb(color),
            direction: d.map(|b| b as i8),
        }
    }
}

/// Ambient colour plus up to a handful of directional lights.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LightSet {
    pub name: String,
    pub ambient: [u8; 3],
    pub lights: Vec<Light>,
}

impl LightSet {
    pub fn new(name: impl Into<String>, ambient: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            ambient,
            lights: Vec::new(),
        }
    }

    pub fn with_light(mut self, light: Light) -> Self {
        self.lights.push(light);
        self
    }

    /// Compiled words: ambient twice, each light, a zero light when empty,
    /// and two words of trailing alignment.
    pub fn packed(&self) -> Vec<u32> {
        let ambient = pack_rgb(self.ambient);
        let mut words = vec![ambient, ambient];
        for light in &self.lights {
            words.extend_from_slice(&light.packed());
        }
        if self.lights.is_empty() {
            words.extend_from_slice(&[0; 4]);
        }
        words.extend_from_slice(&[0, 0]);
        words
    }
}

/// `RRGGBB00`
pub(crate) fn pack_rgb(rgb: [u8; 3]) -> u32 {
    (rgb[0] as u32) << 24 | (rgb[1] as u32) << 16 | (rgb[2] as u32) << 8
}

pub(crate) fn unpack_rgb(word: u32) -> [u8; 3] {
    [(word >> 24) as u8, (word >> 16) as u8, (word >> 8) as u8]
}
