//! Joint-angle estimation from a single hand skeleton.

use glam::DVec3;
use tracing::debug;

use super::joints::{AngleKind, Finger, JointAngleId, JointAngleSet};
use super::landmarks::{HandLandmarkSet, INDEX_MCP, MIDDLE_MCP, PINKY_MCP, RING_MCP, WRIST};
use super::smoothing::SmoothingState;

/// Vectors shorter than this are treated as degenerate.
const MIN_LENGTH: f64 = 1e-9;
/// Below this in-plane magnitude the finger points along the palm normal and
/// abduction is taken as 0.
const MIN_PROJECTION: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("degenerate geometry: zero-length {0}")]
    Degenerate(&'static str),
}

fn unit(v: DVec3, what: &'static str) -> Result<DVec3, GeometryError> {
    let length = v.length();
    if length < MIN_LENGTH || !length.is_finite() {
        return Err(GeometryError::Degenerate(what));
    }
    Ok(v / length)
}

fn angle_between(a: DVec3, b: DVec3) -> f64 {
    a.dot(b).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Anatomical frame anchored at the wrist, rebuilt for every skeleton.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandFrame {
    pub origin: DVec3,
    pub x: DVec3,
    pub y: DVec3,
    /// Palm normal.
    pub z: DVec3,
}

impl HandFrame {
    pub fn from_landmarks(hand: &HandLandmarkSet) -> Result<Self, GeometryError> {
        let origin = hand.point(WRIST);
        let z = unit(
            (hand.point(INDEX_MCP) - origin).cross(hand.point(PINKY_MCP) - origin),
            "palm normal",
        )?;
        let toward_middle = hand.point(MIDDLE_MCP) - origin;
        let y = unit(toward_middle - toward_middle.dot(z) * z, "palm y axis")?;
        let x = unit(y.cross(z), "palm x axis")?;
        Ok(Self { origin, x, y, z })
    }

    /// Direction expressed in local (x, y, z) components.
    pub fn to_local(&self, v: DVec3) -> DVec3 {
        DVec3::new(v.dot(self.x), v.dot(self.y), v.dot(self.z))
    }
}

/// Angle between consecutive bones p1->p2 and p2->p3. Straight is 0°.
pub fn flexion_angle(p1: DVec3, p2: DVec3, p3: DVec3) -> Result<f64, GeometryError> {
    let proximal = unit(p2 - p1, "proximal bone")?;
    let distal = unit(p3 - p2, "distal bone")?;
    Ok(angle_between(proximal, distal))
}

/// Signed in-palm angle between a bone and the local Y axis.
/// Negative when the bone leans toward -X.
pub fn abduction_angle(bone: DVec3, frame: &HandFrame) -> Result<f64, GeometryError> {
    let local = frame.to_local(unit(bone, "metacarpal bone")?);
    let projected = DVec3::new(local.x, local.y, 0.0);
    if projected.length() < MIN_PROJECTION {
        return Ok(0.0);
    }
    let angle = angle_between(projected.normalize(), DVec3::Y);
    Ok(if projected.x < 0.0 { -angle } else { angle })
}

/// Middle finger abduction, measured against the direction to the midpoint of
/// the index and ring MCPs. Sign follows the palm normal.
pub fn middle_abduction(hand: &HandLandmarkSet, frame: &HandFrame) -> Result<f64, GeometryError> {
    let origin = hand.point(WRIST);
    let midpoint = (hand.point(INDEX_MCP) + hand.point(RING_MCP)) / 2.0;
    let reference = unit(midpoint - origin, "index-ring midpoint")?;
    let middle = unit(hand.point(MIDDLE_MCP) - origin, "middle metacarpal")?;

    let angle = angle_between(middle, reference);
    let alignment = reference.cross(middle).dot(frame.z);
    let direction = if alignment > 0.0 {
        1.0
    } else if alignment < 0.0 {
        -1.0
    } else {
        0.0
    };
    Ok(direction * angle)
}

/// Unclamped, unsmoothed angles for one skeleton. An angle whose geometry is
/// degenerate comes back as 0 without affecting the others.
pub fn raw_angles(hand: &HandLandmarkSet) -> [f64; JointAngleId::COUNT] {
    let mut out = [0.0; JointAngleId::COUNT];
    let frame = HandFrame::from_landmarks(hand);

    for finger in Finger::ALL {
        let chain = finger.chain();
        let p = |i: usize| hand.point(chain[i]);

        for kind in AngleKind::ALL {
            let result = match kind {
                AngleKind::McpFlexion => flexion_angle(p(0), p(1), p(2)),
                AngleKind::PipFlexion => flexion_angle(p(1), p(2), p(3)),
                AngleKind::DipFlexion => flexion_angle(p(2), p(3), p(4)),
                AngleKind::McpAbduction => frame.and_then(|frame| match finger {
                    Finger::Middle => middle_abduction(hand, &frame),
                    _ => abduction_angle(p(1) - p(0), &frame),
                }),
            };
            let id = JointAngleId::new(finger, kind);
            out[id.index()] = result.unwrap_or_else(|e| {
                debug!("{} fell back to 0: {}", id, e);
                0.0
            });
        }
    }
    out
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Stateful angle estimator: clamp, then smooth per angle.
///
/// Smoothing state is created the first time an angle is seen and lives for
/// the engine's lifetime. A frame without a hand leaves everything untouched.
#[derive(Debug, Clone, Default)]
pub struct AngleEngine {
    smoothing: [Option<SmoothingState>; JointAngleId::COUNT],
    output: JointAngleSet,
}

impl AngleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, hand: Option<&HandLandmarkSet>) -> &JointAngleSet {
        let Some(hand) = hand else {
            return &self.output;
        };

        let raw = raw_angles(hand);
        for id in JointAngleId::all() {
            let clamped = id.clamp(raw[id.index()]);
            let smoothed = self.smoothing[id.index()]
                .get_or_insert_with(SmoothingState::new)
                .smooth(clamped);
            self.output.insert(id, round2(smoothed));
        }
        &self.output
    }

    pub fn latest(&self) -> &JointAngleSet {
        &self.output
    }

    pub fn smoothing_state(&self, id: JointAngleId) -> Option<&SmoothingState> {
        self.smoothing[id.index()].as_ref()
    }
}
