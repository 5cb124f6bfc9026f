//! 21-point hand skeleton as produced by the landmark detector.

use glam::DVec3;

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// One detected hand, image-normalised coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandLandmarkSet {
    points: [DVec3; LANDMARK_COUNT],
}

impl HandLandmarkSet {
    pub fn new(points: [DVec3; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Builds a set from detector output; `None` unless exactly 21 points.
    pub fn from_xyz(points: &[[f64; 3]]) -> Option<Self> {
        if points.len() != LANDMARK_COUNT {
            return None;
        }
        let mut out = [DVec3::ZERO; LANDMARK_COUNT];
        for (slot, p) in out.iter_mut().zip(points) {
            *slot = DVec3::from_array(*p);
        }
        Some(Self { points: out })
    }

    pub fn point(&self, index: usize) -> DVec3 {
        self.points[index]
    }

    pub fn points(&self) -> &[DVec3; LANDMARK_COUNT] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detector_output_needs_21_points() {
        let mut raw = vec![[0.1, 0.2, 0.3]; LANDMARK_COUNT];
        raw[PINKY_TIP] = [0.9, 0.8, -0.1];
        let hand = HandLandmarkSet::from_xyz(&raw).unwrap();
        assert_eq!(hand.point(PINKY_TIP), DVec3::new(0.9, 0.8, -0.1));
        assert!(HandLandmarkSet::from_xyz(&raw[..20]).is_none());
    }
}
