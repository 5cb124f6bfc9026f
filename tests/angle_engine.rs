use glam::DVec3;
use kinemyo::vision::angles::{raw_angles, AngleEngine};
use kinemyo::vision::joints::{AngleKind, Finger, JointAngleId};
use kinemyo::vision::landmarks::{HandLandmarkSet, LANDMARK_COUNT};
use kinemyo::vision::source::SyntheticHandSource;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_clamp_hits_nearest_bound(index in 0usize..JointAngleId::COUNT, raw in -1000.0f64..1000.0) {
        let id = JointAngleId::from_index(index).unwrap();
        let range = id.range();
        let clamped = id.clamp(raw);
        if raw < range.min {
            prop_assert_eq!(clamped, range.min);
        } else if raw > range.max {
            prop_assert_eq!(clamped, range.max);
        } else {
            prop_assert_eq!(clamped, raw);
        }
    }

    #[test]
    fn test_engine_output_stays_in_range(curl in 0.0f64..1.0, frames in 1usize..20) {
        let mut engine = AngleEngine::new();
        let hand = SyntheticHandSource::hand_pose(curl);
        for _ in 0..frames {
            engine.update(Some(&hand));
        }
        for (id, value) in engine.latest().iter() {
            let range = id.range();
            prop_assert!(value >= range.min && value <= range.max, "{} = {}", id, value);
        }
    }
}

#[test]
fn test_constant_pose_converges_to_clamped_raw() {
    let hand = SyntheticHandSource::hand_pose(0.6);
    let raw = raw_angles(&hand);
    let mut engine = AngleEngine::new();

    for _ in 0..300 {
        engine.update(Some(&hand));
    }
    let output = engine.latest();
    assert_eq!(output.len(), JointAngleId::COUNT);
    for id in JointAngleId::all() {
        let expected = id.clamp(raw[id.index()]);
        let value = output.get(id).unwrap();
        assert!((value - expected).abs() <= 0.01, "{}: {} vs {}", id, value, expected);
    }
}

#[test]
fn test_absent_hand_freezes_engine() {
    // 1. Warm up on a real pose
    let mut engine = AngleEngine::new();
    engine.update(Some(&SyntheticHandSource::hand_pose(0.2)));
    engine.update(Some(&SyntheticHandSource::hand_pose(0.3)));
    let id = JointAngleId::new(Finger::Index, AngleKind::PipFlexion);
    let before = *engine.latest();
    let history: Vec<f64> = engine.smoothing_state(id).unwrap().history().collect();

    // 2. No hand: nothing moves
    for _ in 0..10 {
        assert_eq!(*engine.update(None), before);
    }
    let after: Vec<f64> = engine.smoothing_state(id).unwrap().history().collect();
    assert_eq!(history, after, "smoothing state must not advance without a hand");
}

#[test]
fn test_fresh_engine_without_hand_is_empty() {
    let mut engine = AngleEngine::new();
    assert!(engine.update(None).is_empty());
    assert!(JointAngleId::all().all(|id| engine.smoothing_state(id).is_none()));
}

#[test]
fn test_degenerate_skeleton_falls_back_to_zero() {
    let hand = HandLandmarkSet::new([DVec3::splat(0.5); LANDMARK_COUNT]);
    let raw = raw_angles(&hand);
    assert!(raw.iter().all(|v| *v == 0.0), "{:?}", raw);

    let mut engine = AngleEngine::new();
    let output = engine.update(Some(&hand));
    assert_eq!(output.len(), JointAngleId::COUNT);
    assert!(output.iter().all(|(_, v)| v == 0.0));
}

#[test]
fn test_curling_increases_flexion() {
    let open = raw_angles(&SyntheticHandSource::hand_pose(0.0));
    let closed = raw_angles(&SyntheticHandSource::hand_pose(1.0));
    let pip = JointAngleId::new(Finger::Middle, AngleKind::PipFlexion).index();
    assert!(open[pip] < 1.0, "open hand should be nearly straight, got {}", open[pip]);
    assert!(closed[pip] > 30.0, "curled finger should flex, got {}", closed[pip]);
}
