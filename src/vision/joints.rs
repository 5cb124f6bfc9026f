//! Closed set of joint-angle identifiers and the angle map keyed by them.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::str::FromStr;

use super::landmarks::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Landmark chain from the wrist out to the fingertip.
    pub fn chain(self) -> [usize; 5] {
        match self {
            Finger::Thumb => [WRIST, THUMB_CMC, THUMB_MCP, THUMB_IP, THUMB_TIP],
            Finger::Index => [WRIST, INDEX_MCP, INDEX_PIP, INDEX_DIP, INDEX_TIP],
            Finger::Middle => [WRIST, MIDDLE_MCP, MIDDLE_PIP, MIDDLE_DIP, MIDDLE_TIP],
            Finger::Ring => [WRIST, RING_MCP, RING_PIP, RING_DIP, RING_TIP],
            Finger::Pinky => [WRIST, PINKY_MCP, PINKY_PIP, PINKY_DIP, PINKY_TIP],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Joint {
    Mcp,
    Pip,
    Dip,
}

impl Joint {
    pub fn as_str(self) -> &'static str {
        match self {
            Joint::Mcp => "mcp",
            Joint::Pip => "pip",
            Joint::Dip => "dip",
        }
    }
}

impl FromStr for Joint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mcp" => Ok(Joint::Mcp),
            "pip" => Ok(Joint::Pip),
            "dip" => Ok(Joint::Dip),
            other => Err(format!("unknown joint '{}', expected mcp, pip or dip", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Flexion,
    Abduction,
}

/// The four angles tracked per finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AngleKind {
    McpFlexion,
    McpAbduction,
    PipFlexion,
    DipFlexion,
}

impl AngleKind {
    pub const ALL: [AngleKind; 4] = [
        AngleKind::McpFlexion,
        AngleKind::McpAbduction,
        AngleKind::PipFlexion,
        AngleKind::DipFlexion,
    ];

    pub fn joint(self) -> Joint {
        match self {
            AngleKind::McpFlexion | AngleKind::McpAbduction => Joint::Mcp,
            AngleKind::PipFlexion => Joint::Pip,
            AngleKind::DipFlexion => Joint::Dip,
        }
    }

    pub fn movement(self) -> Movement {
        match self {
            AngleKind::McpAbduction => Movement::Abduction,
            _ => Movement::Flexion,
        }
    }
}

/// Anatomical clamp range in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleRange {
    pub min: f64,
    pub max: f64,
}

impl AngleRange {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

const NAMES: [&str; JointAngleId::COUNT] = [
    "thumb_mcp_flexion",
    "thumb_mcp_abduction",
    "thumb_pip_flexion",
    "thumb_dip_flexion",
    "index_mcp_flexion",
    "index_mcp_abduction",
    "index_pip_flexion",
    "index_dip_flexion",
    "middle_mcp_flexion",
    "middle_mcp_abduction",
    "middle_pip_flexion",
    "middle_dip_flexion",
    "ring_mcp_flexion",
    "ring_mcp_abduction",
    "ring_pip_flexion",
    "ring_dip_flexion",
    "pinky_mcp_flexion",
    "pinky_mcp_abduction",
    "pinky_pip_flexion",
    "pinky_dip_flexion",
];

/// Canonical joint-angle tag: finger x angle kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointAngleId {
    pub finger: Finger,
    pub kind: AngleKind,
}

impl JointAngleId {
    pub const COUNT: usize = 20;

    pub const fn new(finger: Finger, kind: AngleKind) -> Self {
        Self { finger, kind }
    }

    pub fn index(self) -> usize {
        self.finger as usize * AngleKind::ALL.len() + self.kind as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= Self::COUNT {
            return None;
        }
        let per_finger = AngleKind::ALL.len();
        Some(Self::new(
            Finger::ALL[index / per_finger],
            AngleKind::ALL[index % per_finger],
        ))
    }

    pub fn all() -> impl Iterator<Item = JointAngleId> {
        (0..Self::COUNT).filter_map(Self::from_index)
    }

    pub fn name(self) -> &'static str {
        NAMES[self.index()]
    }

    pub fn from_name(name: &str) -> Option<Self> {
        NAMES
            .iter()
            .position(|n| *n == name)
            .and_then(Self::from_index)
    }

    /// Thumb ranges are narrower than the other fingers'.
    pub fn range(self) -> AngleRange {
        match (self.finger, self.kind) {
            (Finger::Thumb, AngleKind::McpFlexion) => AngleRange::new(0.0, 50.0),
            (Finger::Thumb, AngleKind::McpAbduction) => AngleRange::new(0.0, 70.0),
            (Finger::Thumb, AngleKind::PipFlexion) => AngleRange::new(0.0, 80.0),
            (_, AngleKind::McpFlexion) => AngleRange::new(0.0, 90.0),
            (_, AngleKind::McpAbduction) => AngleRange::new(-20.0, 20.0),
            (_, AngleKind::PipFlexion) => AngleRange::new(0.0, 100.0),
            (_, AngleKind::DipFlexion) => AngleRange::new(0.0, 90.0),
        }
    }

    pub fn clamp(self, raw: f64) -> f64 {
        let range = self.range();
        raw.clamp(range.min, range.max)
    }
}

impl fmt::Display for JointAngleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Smoothed angles in degrees, at most one per [`JointAngleId`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointAngleSet {
    values: [Option<f64>; JointAngleId::COUNT],
}

impl JointAngleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: JointAngleId, degrees: f64) {
        self.values[id.index()] = Some(degrees);
    }

    pub fn get(&self, id: JointAngleId) -> Option<f64> {
        self.values[id.index()]
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointAngleId, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Some((JointAngleId::from_index(i)?, (*v)?)))
    }

    pub fn ids(&self) -> impl Iterator<Item = JointAngleId> + '_ {
        self.iter().map(|(id, _)| id)
    }
}

impl FromIterator<(JointAngleId, f64)> for JointAngleSet {
    fn from_iter<T: IntoIterator<Item = (JointAngleId, f64)>>(iter: T) -> Self {
        let mut set = Self::new();
        for (id, value) in iter {
            set.insert(id, value);
        }
        set
    }
}

/// Serialises as `{ "index_mcp_flexion": 12.5, ... }` for the web layer.
impl Serialize for JointAngleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (id, value) in self.iter() {
            map.serialize_entry(id.name(), &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_index() {
        for id in JointAngleId::all() {
            assert_eq!(JointAngleId::from_name(id.name()), Some(id));
            let prefix = format!("{:?}", id.finger).to_lowercase();
            assert!(id.name().starts_with(&prefix));
        }
        assert_eq!(JointAngleId::all().count(), JointAngleId::COUNT);
        assert_eq!(JointAngleId::from_name("wrist"), None);
    }

    #[test]
    fn thumb_ranges_are_tighter() {
        let thumb = JointAngleId::new(Finger::Thumb, AngleKind::McpFlexion);
        let index = JointAngleId::new(Finger::Index, AngleKind::McpFlexion);
        assert_eq!(thumb.range().max, 50.0);
        assert_eq!(index.range().max, 90.0);
    }

    #[test]
    fn kinds_map_to_joint_and_movement() {
        assert_eq!(AngleKind::McpAbduction.joint(), Joint::Mcp);
        assert_eq!(AngleKind::McpAbduction.movement(), Movement::Abduction);
        assert_eq!(AngleKind::DipFlexion.movement(), Movement::Flexion);
        assert_eq!("PIP".parse::<Joint>(), Ok(Joint::Pip));
        assert!("wrist".parse::<Joint>().is_err());
    }

    #[test]
    fn serializes_as_name_map() {
        let set: JointAngleSet = [
            (JointAngleId::new(Finger::Index, AngleKind::McpFlexion), 12.5),
            (JointAngleId::new(Finger::Middle, AngleKind::McpAbduction), -3.0),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_value(set).unwrap();
        assert_eq!(json["index_mcp_flexion"], 12.5);
        assert_eq!(json["middle_mcp_abduction"], -3.0);
        assert_eq!(json.as_object().unwrap().len(), 2);
    }
}
