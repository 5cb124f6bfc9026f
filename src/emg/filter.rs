use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

use super::{FilteredEmgVector, RawEmgSample, EMG_CHANNELS};

/// Per-channel history length. Oldest sample is evicted on overflow.
pub const HISTORY_CAPACITY: usize = 50;
/// Below this many buffered samples a channel passes its raw value through.
pub const MIN_FILTER_SAMPLES: usize = 10;

/// Band and line-noise parameters, all in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub low_cut_hz: f64,
    pub high_cut_hz: f64,
    pub notch_hz: f64,
    pub notch_q: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            low_cut_hz: 20.0,
            high_cut_hz: 95.0,
            notch_hz: 50.0,
            notch_q: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FilterDesignError {
    #[error("sample rate must be positive, got {0} Hz")]
    SampleRate(f64),
    #[error("pass band {low} to {high} Hz is not inside (0, {nyquist}) Hz")]
    PassBand { low: f64, high: f64, nyquist: f64 },
    #[error("notch frequency {freq} Hz is not inside (0, {nyquist}) Hz")]
    NotchFrequency { freq: f64, nyquist: f64 },
    #[error("notch quality factor must be positive, got {0}")]
    NotchQuality(f64),
}

impl FilterConfig {
    pub fn validate(&self, sample_rate_hz: f64) -> Result<(), FilterDesignError> {
        if !(sample_rate_hz > 0.0) {
            return Err(FilterDesignError::SampleRate(sample_rate_hz));
        }
        let nyquist = sample_rate_hz / 2.0;
        if !(self.low_cut_hz > 0.0 && self.low_cut_hz < self.high_cut_hz && self.high_cut_hz < nyquist) {
            return Err(FilterDesignError::PassBand {
                low: self.low_cut_hz,
                high: self.high_cut_hz,
                nyquist,
            });
        }
        if !(self.notch_hz > 0.0 && self.notch_hz < nyquist) {
            return Err(FilterDesignError::NotchFrequency {
                freq: self.notch_hz,
                nyquist,
            });
        }
        if !(self.notch_q > 0.0) {
            return Err(FilterDesignError::NotchQuality(self.notch_q));
        }
        Ok(())
    }
}

/// Second-order IIR section, coefficients normalised so that a0 == 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    /// Butterworth band-pass via the bilinear transform with prewarped edges.
    /// The -3 dB points land exactly on `low_hz` and `high_hz`.
    pub fn bandpass(low_hz: f64, high_hz: f64, sample_rate_hz: f64) -> Self {
        let wl = (PI * low_hz / sample_rate_hz).tan();
        let wh = (PI * high_hz / sample_rate_hz).tan();
        let bw = wh - wl;
        let w0_sq = wl * wh;

        let a0 = 1.0 + bw + w0_sq;
        Self {
            b: [bw / a0, 0.0, -bw / a0],
            a: [(2.0 * w0_sq - 2.0) / a0, (1.0 - bw + w0_sq) / a0],
        }
    }

    /// Second-order notch at `freq_hz`, -3 dB bandwidth `freq_hz / q`.
    pub fn notch(freq_hz: f64, q: f64, sample_rate_hz: f64) -> Self {
        let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
        let beta = (w0 / q / 2.0).tan();
        let gain = 1.0 / (1.0 + beta);
        let cos_w0 = w0.cos();
        Self {
            b: [gain, -2.0 * gain * cos_w0, gain],
            a: [-2.0 * gain * cos_w0, 2.0 * gain - 1.0],
        }
    }

    /// Runs the section over `input` from a zero state (transposed direct form II).
    pub fn apply(&self, input: impl IntoIterator<Item = f64>) -> impl Iterator<Item = f64> {
        let section = *self;
        let mut z = [0.0f64; 2];
        input.into_iter().map(move |x| {
            let y = section.b[0] * x + z[0];
            z[0] = section.b[1] * x - section.a[0] * y + z[1];
            z[1] = section.b[2] * x - section.a[1] * y;
            y
        })
    }
}

/// Streaming band-pass + notch over a bounded history, one ring per channel.
///
/// Every tick refilters the whole buffered history from a zero state and keeps
/// only the newest output value.
pub struct SignalFilterBank {
    bandpass: Biquad,
    notch: Biquad,
    history: Vec<HeapRb<f64>>,
    last_raw: [f64; EMG_CHANNELS],
    latest: FilteredEmgVector,
}

impl SignalFilterBank {
    pub fn new(sample_rate_hz: f64, config: &FilterConfig) -> Result<Self, FilterDesignError> {
        config.validate(sample_rate_hz)?;
        Ok(Self {
            bandpass: Biquad::bandpass(config.low_cut_hz, config.high_cut_hz, sample_rate_hz),
            notch: Biquad::notch(config.notch_hz, config.notch_q, sample_rate_hz),
            history: (0..EMG_CHANNELS)
                .map(|_| HeapRb::new(HISTORY_CAPACITY))
                .collect(),
            last_raw: [0.0; EMG_CHANNELS],
            latest: FilteredEmgVector::default(),
        })
    }

    pub fn ingest(&mut self, sample: RawEmgSample) -> FilteredEmgVector {
        for (channel, &value) in sample.0.iter().enumerate() {
            self.history[channel].push_overwrite(value);
            self.last_raw[channel] = value;
            self.latest.0[channel] = self.filter_channel(channel);
        }
        self.latest
    }

    pub fn latest(&self) -> FilteredEmgVector {
        self.latest
    }

    pub fn buffered(&self, channel: usize) -> usize {
        self.history.get(channel).map_or(0, |rb| rb.occupied_len())
    }

    fn filter_channel(&self, channel: usize) -> f64 {
        let raw = self.last_raw[channel];
        let ring = &self.history[channel];
        if ring.occupied_len() < MIN_FILTER_SAMPLES {
            return raw;
        }

        let banded = self.bandpass.apply(ring.iter().copied());
        let output = self.notch.apply(banded).last().unwrap_or(raw);
        if output.is_finite() {
            output
        } else {
            debug!("EMG filter unstable on channel {}, using raw value", channel);
            raw
        }
    }
}
