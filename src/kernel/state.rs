use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::source::{LinkStatus, Producer};
use super::telemetry::metrics::{RateCounter, RateStats};
use super::time::unix_seconds;
use crate::emg::{FilteredEmgVector, RawEmgSample};
use crate::vision::joints::JointAngleSet;

/// Opaque RGB8 camera image. Cloning shares the pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pixels: Arc<[u8]>,
}

impl CameraFrame {
    /// `None` unless `pixels` holds exactly `width * height` RGB triples.
    pub fn from_rgb8(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
        encoder.encode(&self.pixels, self.width, self.height, image::ColorType::Rgb8)?;
        Ok(out)
    }
}

/// Immutable copy of the latest published state.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub timestamp: f64,
    pub emg_raw: RawEmgSample,
    pub emg_filtered: FilteredEmgVector,
    /// Empty when no hand was seen in the latest camera frame.
    pub angles: JointAngleSet,
    pub frame: Option<CameraFrame>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProducerStatus {
    pub connected: bool,
    pub synced: bool,
    pub fps: f64,
    pub total_frames: u64,
}

#[derive(Debug, Default)]
struct Latest {
    emg_raw: RawEmgSample,
    emg_filtered: FilteredEmgVector,
    angles: JointAngleSet,
    frame: Option<CameraFrame>,
    emg_rate: RateCounter,
    camera_rate: RateCounter,
    emg_link: LinkStatus,
    camera_link: LinkStatus,
}

/// Latest-value register shared by the producer threads and readers.
///
/// Every publish and every snapshot runs under the one store-scoped lock, so
/// a reader sees each field either before or after a publish, never midway.
/// Fields from different producers may be from different moments.
#[derive(Debug, Default)]
pub struct LatestStateStore {
    inner: Mutex<Latest>,
}

impl LatestStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish_emg(&self, raw: RawEmgSample, filtered: FilteredEmgVector) {
        let mut latest = self.inner.lock();
        latest.emg_raw = raw;
        latest.emg_filtered = filtered;
        latest.emg_rate.tick();
    }

    /// `None` means no hand in the latest frame and clears the angle map.
    pub fn publish_hand(&self, angles: Option<JointAngleSet>) {
        self.inner.lock().angles = angles.unwrap_or_default();
    }

    pub fn publish_frame(&self, frame: CameraFrame) {
        let mut latest = self.inner.lock();
        latest.frame = Some(frame);
        latest.camera_rate.tick();
    }

    /// Hand result and image of one camera iteration, published together.
    pub fn publish_camera(&self, angles: Option<JointAngleSet>, frame: CameraFrame) {
        let mut latest = self.inner.lock();
        latest.angles = angles.unwrap_or_default();
        latest.frame = Some(frame);
        latest.camera_rate.tick();
    }

    pub fn set_link(&self, producer: Producer, link: LinkStatus) {
        let mut latest = self.inner.lock();
        match producer {
            Producer::Emg => latest.emg_link = link,
            Producer::Camera => latest.camera_link = link,
        }
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        let latest = self.inner.lock();
        FrameSnapshot {
            timestamp: unix_seconds(),
            emg_raw: latest.emg_raw,
            emg_filtered: latest.emg_filtered,
            angles: latest.angles,
            frame: latest.frame.clone(),
        }
    }

    pub fn rates(&self, producer: Producer) -> RateStats {
        let latest = self.inner.lock();
        match producer {
            Producer::Emg => latest.emg_rate.stats(),
            Producer::Camera => latest.camera_rate.stats(),
        }
    }

    pub fn producer_status(&self, producer: Producer) -> ProducerStatus {
        let latest = self.inner.lock();
        let (link, rate) = match producer {
            Producer::Emg => (latest.emg_link, latest.emg_rate.stats()),
            Producer::Camera => (latest.camera_link, latest.camera_rate.stats()),
        };
        ProducerStatus {
            connected: link.connected,
            synced: link.synced,
            fps: rate.fps,
            total_frames: rate.total_frames,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_buffer_size() {
        assert!(CameraFrame::from_rgb8(2, 2, vec![0; 11]).is_none());
        assert!(CameraFrame::from_rgb8(2, 2, vec![0; 12]).is_some());
    }

    #[test]
    fn frame_encodes_to_jpeg() {
        let frame = CameraFrame::from_rgb8(8, 8, vec![128; 8 * 8 * 3]).unwrap();
        let jpeg = frame.encode_jpeg(80).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn frame_publish_leaves_angles_alone() {
        let store = LatestStateStore::new();
        let id = crate::vision::joints::JointAngleId::from_index(0).unwrap();
        store.publish_hand(Some([(id, 5.0)].into_iter().collect()));
        store.publish_frame(CameraFrame::from_rgb8(1, 1, vec![0, 0, 0]).unwrap());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.angles.get(id), Some(5.0));
        assert!(snapshot.frame.is_some());
        assert_eq!(store.rates(Producer::Camera).total_frames, 1);
    }

    #[test]
    fn cloned_frames_share_pixels() {
        let frame = CameraFrame::from_rgb8(1, 1, vec![9, 8, 7]).unwrap();
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.pixels().as_ptr(), copy.pixels().as_ptr()));
    }
}
