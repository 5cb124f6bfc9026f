use std::f64::consts::PI;
use std::time::{Duration, Instant};

use super::{RawEmgSample, EMG_CHANNELS};
use crate::kernel::source::{LinkStatus, SourceError};

/// Armband driver contract.
///
/// `poll` blocks for at most `timeout` and yields the next sample, `Ok(None)`
/// when the device is connected but nothing arrived in time, or an error when
/// the device is unreachable.
pub trait EmgSource: Send {
    fn poll(&mut self, timeout: Duration) -> Result<Option<RawEmgSample>, SourceError>;

    fn link(&self) -> LinkStatus;

    /// Releases the device. Called once from the producer's stop path.
    fn close(&mut self) {}
}

/// Deterministic stand-in for the armband: a per-channel muscle burst with
/// 50 Hz mains hum on top, paced at the configured rate.
pub struct SyntheticEmgSource {
    sample_rate_hz: f64,
    tick: u64,
    next_due: Option<Instant>,
    closed: bool,
}

impl SyntheticEmgSource {
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            sample_rate_hz,
            tick: 0,
            next_due: None,
            closed: false,
        }
    }

    fn sample_at(&self, tick: u64) -> RawEmgSample {
        let t = tick as f64 / self.sample_rate_hz;
        let mut values = [0.0; EMG_CHANNELS];
        for (channel, value) in values.iter_mut().enumerate() {
            let envelope = 0.5 + 0.5 * (2.0 * PI * 0.25 * t + channel as f64).sin();
            let burst = (2.0 * PI * (35.0 + 5.0 * channel as f64) * t).sin();
            let hum = 0.3 * (2.0 * PI * 50.0 * t).sin();
            // Myo readings are signed bytes.
            *value = (60.0 * envelope * burst + 20.0 * hum).round().clamp(-128.0, 127.0);
        }
        RawEmgSample(values)
    }
}

impl EmgSource for SyntheticEmgSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<RawEmgSample>, SourceError> {
        if self.closed {
            return Err(SourceError::Disconnected);
        }
        let period = Duration::from_secs_f64(1.0 / self.sample_rate_hz);
        let now = Instant::now();
        let due = *self.next_due.get_or_insert(now);
        if due > now {
            let wait = due - now;
            if wait > timeout {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            std::thread::sleep(wait);
        }
        self.next_due = Some(due + period);

        let sample = self.sample_at(self.tick);
        self.tick += 1;
        Ok(Some(sample))
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
