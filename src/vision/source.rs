use glam::DVec3;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use super::joints::Finger;
use super::landmarks::{HandLandmarkSet, LANDMARK_COUNT, WRIST};
use crate::kernel::source::{LinkStatus, SourceError};
use crate::kernel::state::CameraFrame;

/// One camera iteration: the image plus the first detected hand, if any.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub image: CameraFrame,
    pub hand: Option<HandLandmarkSet>,
}

/// Depth camera + landmark detector contract.
///
/// `wait_frame` blocks until the next video frame; `Ok(None)` means the camera
/// is up but had no frame ready.
pub trait LandmarkSource: Send {
    fn wait_frame(&mut self) -> Result<Option<CapturedFrame>, SourceError>;

    fn link(&self) -> LinkStatus;

    /// Stops the pipeline and releases the detector.
    fn close(&mut self) {}
}

/// Animated hand opening and closing in front of a gradient, at ~30 Hz.
/// Every `gap_every`-th second the hand leaves the view.
pub struct SyntheticHandSource {
    width: u32,
    height: u32,
    frame_period: Duration,
    started: Instant,
    next_due: Option<Instant>,
    gap_every: u64,
    closed: bool,
}

impl SyntheticHandSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_period: Duration::from_millis(33),
            started: Instant::now(),
            next_due: None,
            gap_every: 7,
            closed: false,
        }
    }

    fn image(&self, t: f64) -> Option<CameraFrame> {
        let shade = ((t * 40.0) as u32 % 256) as u8;
        let mut pixels = Vec::with_capacity((self.width * self.height * 3) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                pixels.push((x * 255 / self.width.max(1)) as u8);
                pixels.push((y * 255 / self.height.max(1)) as u8);
                pixels.push(shade);
            }
        }
        CameraFrame::from_rgb8(self.width, self.height, pixels)
    }

    /// Flat palm facing the camera with fingers curling by `curl` (0..1).
    pub fn hand_pose(curl: f64) -> HandLandmarkSet {
        let mut points = [DVec3::ZERO; LANDMARK_COUNT];
        points[WRIST] = DVec3::new(0.5, 0.8, 0.0);
        let spread = [-0.12, -0.05, 0.0, 0.05, 0.1];
        let bone = [0.0, 0.06, 0.04, 0.03];

        for (f, finger) in Finger::ALL.iter().enumerate() {
            let chain = finger.chain();
            let base_len = if *finger == Finger::Thumb { 0.08 } else { 0.2 };
            let mcp = points[WRIST] + DVec3::new(spread[f], -base_len, 0.0);
            points[chain[1]] = mcp;

            // Each joint adds `bend`, rotating the bone out of the palm toward -Z.
            let along = DVec3::new(spread[f] * 0.5, -1.0, 0.0).normalize();
            let bend = curl * PI / 4.0;
            let mut pos = mcp;
            for seg in 2..5 {
                let theta = bend * (seg - 1) as f64;
                let heading = along * theta.cos() - DVec3::Z * theta.sin();
                pos += heading * bone[seg - 1];
                points[chain[seg]] = pos;
            }
        }
        HandLandmarkSet::new(points)
    }
}

impl LandmarkSource for SyntheticHandSource {
    fn wait_frame(&mut self) -> Result<Option<CapturedFrame>, SourceError> {
        if self.closed {
            return Err(SourceError::Disconnected);
        }
        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(due + self.frame_period);

        let t = self.started.elapsed().as_secs_f64();
        let Some(image) = self.image(t) else {
            return Err(SourceError::Read("frame buffer size mismatch".into()));
        };
        let visible = self.gap_every == 0 || (t as u64) % self.gap_every != self.gap_every - 1;
        let hand = visible.then(|| Self::hand_pose(0.5 + 0.5 * (t * PI / 2.0).sin()));
        Ok(Some(CapturedFrame { image, hand }))
    }

    fn link(&self) -> LinkStatus {
        if self.closed {
            LinkStatus::DOWN
        } else {
            LinkStatus::READY
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
