use std::fmt;

use super::container::SessionFile;
use crate::emg::EMG_CHANNELS;
use crate::vision::joints::{Joint, JointAngleId};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelStats {
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl ChannelStats {
    fn of(values: impl Iterator<Item = f64> + Clone) -> Self {
        let n = values.clone().count();
        if n == 0 {
            return Self::default();
        }
        let mean = values.clone().sum::<f64>() / n as f64;
        let var = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        Self { mean, std: var.sqrt() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AngleStats {
    pub column: String,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// Descriptive statistics of one recorded session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub subject_id: String,
    pub dominant_hand: String,
    pub action: String,
    pub trial: String,
    pub samples: usize,
    pub duration_secs: f64,
    /// (N - 1) / duration, 0 when undefined.
    pub sample_rate_hz: f64,
    pub emg_raw: [ChannelStats; EMG_CHANNELS],
    pub emg_filtered: [ChannelStats; EMG_CHANNELS],
    pub angles: Vec<AngleStats>,
}

fn per_channel(rows: &[[f64; EMG_CHANNELS]]) -> [ChannelStats; EMG_CHANNELS] {
    std::array::from_fn(|ch| ChannelStats::of(rows.iter().map(move |r| r[ch])))
}

impl SessionSummary {
    pub fn from_file(file: &SessionFile) -> Self {
        let meta = &file.metadata;
        let duration = meta.recording_end_time - meta.recording_start_time;
        let samples = file.len();
        let sample_rate_hz = if duration > 0.0 && samples > 1 {
            (samples - 1) as f64 / duration
        } else {
            0.0
        };

        let angles = file
            .angle_columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let values = file.hand_angles.iter().map(move |row| row[i]);
                let (min, max) = values
                    .clone()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
                AngleStats {
                    column: column.clone(),
                    mean: ChannelStats::of(values).mean,
                    min: if samples == 0 { 0.0 } else { min },
                    max: if samples == 0 { 0.0 } else { max },
                }
            })
            .collect();

        Self {
            subject_id: meta.subject_id.clone(),
            dominant_hand: meta.dominant_hand.to_string(),
            action: meta.action.clone(),
            trial: meta.trial_timestamp.clone(),
            samples,
            duration_secs: duration,
            sample_rate_hz,
            emg_raw: per_channel(&file.emg_raw),
            emg_filtered: per_channel(&file.emg_filtered),
            angles,
        }
    }

    /// Angle columns belonging to one joint class.
    pub fn angle_columns(&self, joint: Joint) -> Vec<&AngleStats> {
        self.angles
            .iter()
            .filter(|a| JointAngleId::from_name(&a.column).is_some_and(|id| id.kind.joint() == joint))
            .collect()
    }

    pub fn write_angles(&self, f: &mut impl fmt::Write, columns: &[&AngleStats]) -> fmt::Result {
        if columns.is_empty() {
            return writeln!(f, "  (no hand angles recorded)");
        }
        for a in columns {
            writeln!(
                f,
                "  {:<22} mean {:>7.2}  min {:>7.2}  max {:>7.2}",
                a.column, a.mean, a.min, a.max
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Subject:      {}", self.subject_id)?;
        writeln!(f, "Hand:         {}", self.dominant_hand)?;
        writeln!(f, "Action:       {}", self.action)?;
        writeln!(f, "Trial:        {}", self.trial)?;
        writeln!(f, "Samples:      {}", self.samples)?;
        writeln!(f, "Duration:     {:.2} s", self.duration_secs)?;
        writeln!(f, "Sample rate:  {:.2} Hz", self.sample_rate_hz)?;
        writeln!(f, "EMG (raw mean/std | filtered mean/std):")?;
        for ch in 0..EMG_CHANNELS {
            let (raw, filtered) = (self.emg_raw[ch], self.emg_filtered[ch]);
            writeln!(
                f,
                "  ch{}  {:>8.3} / {:>8.3} | {:>8.3} / {:>8.3}",
                ch + 1,
                raw.mean,
                raw.std,
                filtered.mean,
                filtered.std
            )?;
        }
        writeln!(f, "Hand angles ({} columns):", self.angles.len())?;
        let all: Vec<&AngleStats> = self.angles.iter().collect();
        self.write_angles(f, &all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::DominantHand;
    use crate::session::container::{SessionMetadata, FORMAT_VERSION};

    fn file() -> SessionFile {
        SessionFile {
            metadata: SessionMetadata {
                subject_id: "9".into(),
                dominant_hand: DominantHand::Right,
                action: "fist".into(),
                trial_timestamp: "t1".into(),
                recording_start_time: 100.0,
                recording_end_time: 102.0,
                format_version: FORMAT_VERSION,
            },
            timestamps: vec![100.0, 101.0, 102.0],
            emg_raw: vec![[1.0; 8], [2.0; 8], [3.0; 8]],
            emg_filtered: vec![[0.0; 8]; 3],
            angle_columns: vec!["index_mcp_flexion".into(), "index_pip_flexion".into()],
            hand_angles: vec![vec![10.0, 40.0], vec![20.0, 50.0], vec![0.0, 0.0]],
        }
    }

    #[test]
    fn computes_rate_and_channel_stats() {
        let summary = SessionSummary::from_file(&file());
        assert_eq!(summary.samples, 3);
        assert_eq!(summary.duration_secs, 2.0);
        assert_eq!(summary.sample_rate_hz, 1.0);
        assert_eq!(summary.emg_raw[0].mean, 2.0);
        assert!((summary.emg_raw[7].std - (2.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(summary.emg_filtered[3], ChannelStats::default());
    }

    #[test]
    fn selects_angles_by_joint() {
        let summary = SessionSummary::from_file(&file());
        let mcp = summary.angle_columns(Joint::Mcp);
        assert_eq!(mcp.len(), 1);
        assert_eq!(mcp[0].mean, 10.0);
        assert_eq!((mcp[0].min, mcp[0].max), (0.0, 20.0));
        assert!(summary.angle_columns(Joint::Dip).is_empty());
        assert!(summary.to_string().contains("index_pip_flexion"));
    }

    #[test]
    fn single_sample_has_no_rate() {
        let mut f = file();
        f.timestamps.truncate(1);
        f.emg_raw.truncate(1);
        f.emg_filtered.truncate(1);
        f.hand_angles.truncate(1);
        assert_eq!(SessionSummary::from_file(&f).sample_rate_hz, 0.0);
    }
}
