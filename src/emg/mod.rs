pub mod filter;
pub mod processing;
pub mod source;

use serde::{Deserialize, Serialize};

/// Channels on the armband.
pub const EMG_CHANNELS: usize = 8;

/// One device tick: a reading per channel, no timestamp of its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEmgSample(pub [f64; EMG_CHANNELS]);

impl From<[i8; EMG_CHANNELS]> for RawEmgSample {
    fn from(values: [i8; EMG_CHANNELS]) -> Self {
        Self(values.map(f64::from))
    }
}

impl From<[i16; EMG_CHANNELS]> for RawEmgSample {
    fn from(values: [i16; EMG_CHANNELS]) -> Self {
        Self(values.map(f64::from))
    }
}

/// Latest filtered value per channel. Always exactly 8 entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FilteredEmgVector(pub [f64; EMG_CHANNELS]);

impl FilteredEmgVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_readings_widen_to_f64() {
        let sample = RawEmgSample::from([-128i8, -1, 0, 1, 2, 3, 64, 127]);
        assert_eq!(sample.0, [-128.0, -1.0, 0.0, 1.0, 2.0, 3.0, 64.0, 127.0]);
        assert_eq!(RawEmgSample::from([300i16; EMG_CHANNELS]).0, [300.0; EMG_CHANNELS]);
    }
}
