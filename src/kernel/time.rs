use std::time::{SystemTime, UNIX_EPOCH};

/// Engine timestamp: seconds since the UNIX epoch as a float.
/// Raw samples carry no clock of their own, every snapshot is stamped here.
pub fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
