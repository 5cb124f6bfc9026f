use std::collections::VecDeque;

/// Raw values kept per angle for the weighted average.
pub const SMOOTHING_WINDOW: usize = 5;

const INITIAL_COVARIANCE: f64 = 1.0;
const PROCESS_NOISE: f64 = 0.1;
const MEASUREMENT_NOISE: f64 = 1.0;

/// Constant-state scalar Kalman filter (predict, then update).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarKalman {
    estimate: f64,
    covariance: f64,
}

impl ScalarKalman {
    pub fn new(initial: f64) -> Self {
        Self {
            estimate: initial,
            covariance: INITIAL_COVARIANCE,
        }
    }

    pub fn update(&mut self, measurement: f64) -> f64 {
        let predicted_covariance = self.covariance + PROCESS_NOISE;
        let gain = predicted_covariance / (predicted_covariance + MEASUREMENT_NOISE);
        self.estimate += gain * (measurement - self.estimate);
        self.covariance = (1.0 - gain) * predicted_covariance;
        self.estimate
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }
}

/// Per-angle smoothing memory: exponentially weighted window, then Kalman.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingState {
    history: VecDeque<f64>,
    kalman: Option<ScalarKalman>,
}

impl Default for SmoothingState {
    fn default() -> Self {
        Self::new()
    }
}

impl SmoothingState {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(SMOOTHING_WINDOW),
            kalman: None,
        }
    }

    /// Feeds one clamped value, returns the unrounded smoothed estimate.
    pub fn smooth(&mut self, value: f64) -> f64 {
        if self.history.len() == SMOOTHING_WINDOW {
            self.history.pop_front();
        }
        self.history.push_back(value);

        let averaged = weighted_average(&self.history);
        self.kalman
            .get_or_insert_with(|| ScalarKalman::new(averaged))
            .update(averaged)
    }

    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }
}

/// Weights `exp(t)` for `t` evenly spaced over [-1, 0], newest sample last.
fn weighted_average(history: &VecDeque<f64>) -> f64 {
    let n = history.len();
    if n == 0 {
        return 0.0;
    }
    let step = if n > 1 { 1.0 / (n - 1) as f64 } else { 0.0 };
    let (mut sum, mut norm) = (0.0, 0.0);
    for (i, value) in history.iter().enumerate() {
        let t = if n > 1 { -1.0 + step * i as f64 } else { -1.0 };
        let weight = t.exp();
        sum += weight * value;
        norm += weight;
    }
    sum / norm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_passes_through() {
        let mut state = SmoothingState::new();
        assert_eq!(state.smooth(37.5), 37.5);
    }

    #[test]
    fn newer_samples_weigh_more() {
        let history: VecDeque<f64> = [0.0, 10.0].into_iter().collect();
        let avg = weighted_average(&history);
        assert!(avg > 5.0 && avg < 10.0);
    }

    #[test]
    fn window_is_bounded() {
        let mut state = SmoothingState::new();
        for v in 0..20 {
            state.smooth(v as f64);
        }
        assert_eq!(state.history().collect::<Vec<_>>(), vec![15.0, 16.0, 17.0, 18.0, 19.0]);
    }

    #[test]
    fn converges_monotonically_after_step() {
        let mut state = SmoothingState::new();
        for _ in 0..10 {
            state.smooth(10.0);
        }
        let mut previous = state.smooth(40.0);
        for _ in 0..200 {
            let next = state.smooth(40.0);
            assert!(next >= previous - 1e-12, "oscillated: {} after {}", next, previous);
            assert!(next <= 40.0 + 1e-9);
            previous = next;
        }
        assert!((previous - 40.0).abs() < 1e-6);
    }
}
