//! Camera control blocks attached to zones

/// Number of words in a compiled camera block.
pub const CAMERA_WORDS: usize = 11;

/// Camera behaviour while the player stands in a zone.
///
/// Float fields are carried bit-exact, including the `-1000000.0`
/// placeholders some control types leave in unused point slots.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraControl {
    pub control_type: u32,
    pub boom_length: f32,
    pub boom_pitch: f32,
    pub point_a: [f32; 3],
    pub point_b: [f32; 3],
    pub view_pitch: f32,
    pub flag: bool,
}

impl Default for CameraControl {
    fn default() -> Self {
        Self {
            control_type: 0,
            boom_length: 450.0,
            boom_pitch: 15.0,
            point_a: [0.0; 3],
            point_b: [0.0; 3],
            view_pitch: -6.0,
            flag: false,
        }
    }
}

impl CameraControl {
    pub fn to_words(&self) -> [u32; CAMERA_WORDS] {
        [
            self.control_type,
            self.boom_length.to_bits(),
            self.boom_pitch.to_bits(),
            self.point_a[0].to_bits(),
            self.point_a[1].to_bits(),
            self.point_a[2].to_bits(),
            self.point_b[0].to_bits(),
            self.point_b[1].to_bits(),
            self.point_b[2].to_bits(),
            self.view_pitch.to_bits(),
            self.flag as u32,
        ]
    }

    pub fn from_words(w: &[u32; CAMERA_WORDS]) -> Self {
        let f = f32::from_bits;
        Self {
            control_type: w[0],
            boom_length: f(w[1]),
            boom_pitch: f(w[2]),
            point_a: [f(w[3]), f(w[4]), f(w[5])],
            point_b: [f(w[6]), f(w[7]), f(w[8])],
            view_pitch: f(w[9]),
            flag: w[10] != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_round_trip() {
        let cam = CameraControl {
            control_type: 4,
            boom_length: 300.0,
            boom_pitch: 17.5,
            point_a: [-1000000.0, 0.0, 25.0],
            point_b: [100.0, -20.0, 0.5],
            view_pitch: -8.0,
            flag: true,
        };
        let words = cam.to_words();
        assert_eq!(words[0], 4);
        assert_eq!(words[10], 1);
        assert_eq!(words[1], 300.0f32.to_bits());
        assert_eq!(CameraControl::from_words(&words), cam);
    }
}
