use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateStats {
    /// Frames per second over the last 1 s window. Falls toward zero once
    /// ticks stop arriving.
    pub fps: f64,
    /// Monotonic count since the producer started.
    pub total_frames: u64,
}

/// Sliding 1-second frame counter.
#[derive(Debug, Clone)]
pub struct RateCounter {
    window_start: Option<Instant>,
    window_count: u64,
    stats: RateStats,
}

impl Default for RateCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateCounter {
    pub fn new() -> Self {
        Self {
            window_start: None,
            window_count: 0,
            stats: RateStats::default(),
        }
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// The tick that opens a window is its boundary, not one of its frames.
    pub fn tick_at(&mut self, now: Instant) {
        self.stats.total_frames += 1;

        let Some(start) = self.window_start else {
            self.window_start = Some(now);
            return;
        };
        self.window_count += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= WINDOW {
            self.stats.fps = self.window_count as f64 / elapsed.as_secs_f64();
            self.window_count = 0;
            self.window_start = Some(now);
        }
    }

    pub fn stats(&self) -> RateStats {
        self.stats_at(Instant::now())
    }

    /// An overdue window reports the frames it has so far, so a stalled
    /// producer decays to zero instead of keeping its last rate.
    pub fn stats_at(&self, now: Instant) -> RateStats {
        let mut stats = self.stats;
        if let Some(start) = self.window_start {
            let open = now.saturating_duration_since(start);
            if open >= WINDOW {
                stats.fps = self.window_count as f64 / open.as_secs_f64();
            }
        }
        stats
    }
}
