use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use super::config::{SessionConfig, TrialPhase, ValidationError};
use super::container::{ContainerError, SessionFile, SessionMetadata, FILE_EXTENSION, FORMAT_VERSION};
use crate::emg::{FilteredEmgVector, RawEmgSample};
use crate::kernel::state::FrameSnapshot;
use crate::kernel::time::unix_seconds;
use crate::vision::joints::{JointAngleId, JointAngleSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecorderState {
    Idle,
    Armed,
    Recording,
    /// Stopped, but the flush failed. `stop()` retries it.
    FlushPending,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no session configured")]
    NotConfigured,
    #[error("no recording in progress")]
    NotRecording,
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("previous recording has not been flushed yet; call stop again")]
    FlushPending,
    #[error("invalid session config: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to flush session: {0}")]
    Flush(#[from] ContainerError),
}

/// What the recorder keeps of a snapshot. The camera image is not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub timestamp: f64,
    pub emg_raw: RawEmgSample,
    pub emg_filtered: FilteredEmgVector,
    pub angles: JointAngleSet,
}

impl From<&FrameSnapshot> for RecordedFrame {
    fn from(snapshot: &FrameSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            emg_raw: snapshot.emg_raw,
            emg_filtered: snapshot.emg_filtered,
            angles: snapshot.angles,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub label: String,
    pub trial_id: String,
    pub start_time: f64,
    pub end_time: Option<f64>,
    started: Instant,
    frames: Vec<RecordedFrame>,
}

impl RecordingSession {
    fn new(label: String, trial_id: String) -> Self {
        Self {
            label,
            trial_id,
            start_time: unix_seconds(),
            end_time: None,
            started: Instant::now(),
            frames: Vec::new(),
        }
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }
}

/// Where flushed sessions go.
pub trait SessionSink: Send {
    fn write(&mut self, path: &Path, file: &SessionFile) -> Result<(), ContainerError>;
}

/// Writes the zip container to disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerSink;

impl SessionSink for ContainerSink {
    fn write(&mut self, path: &Path, file: &SessionFile) -> Result<(), ContainerError> {
        file.write(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopOutcome {
    pub frames: usize,
    /// `None` when nothing was recorded and no file was written.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub state: RecorderState,
    pub is_recording: bool,
    pub subject_id: Option<String>,
    pub label: Option<String>,
    pub frames: usize,
    pub elapsed_secs: Option<f64>,
    /// Cue position for the active recording.
    pub phase: Option<TrialPhase>,
}

/// Sorted union of the angle names seen in `frames`, and one zero-filled row
/// per frame in that column order.
pub fn angle_matrix(frames: &[RecordedFrame]) -> (Vec<String>, Vec<Vec<f64>>) {
    let columns: BTreeMap<&'static str, JointAngleId> = frames
        .iter()
        .flat_map(|f| f.angles.ids())
        .map(|id| (id.name(), id))
        .collect();

    let rows = frames
        .iter()
        .map(|f| columns.values().map(|id| f.angles.get(*id).unwrap_or(0.0)).collect())
        .collect();
    (columns.keys().map(|name| name.to_string()).collect(), rows)
}

fn file_component(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Session controller: Idle -> Armed -> Recording -> Armed.
pub struct SessionRecorder {
    data_root: PathBuf,
    config: Option<SessionConfig>,
    subject_dir: Option<PathBuf>,
    session: Option<RecordingSession>,
    state: RecorderState,
    sink: Box<dyn SessionSink>,
}

impl SessionRecorder {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self::with_sink(data_root, Box::new(ContainerSink))
    }

    pub fn with_sink(data_root: impl Into<PathBuf>, sink: Box<dyn SessionSink>) -> Self {
        Self {
            data_root: data_root.into(),
            config: None,
            subject_dir: None,
            session: None,
            state: RecorderState::Idle,
            sink,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.config.as_ref()
    }

    pub fn subject_dir(&self) -> Option<&Path> {
        self.subject_dir.as_deref()
    }

    pub fn session(&self) -> Option<&RecordingSession> {
        self.session.as_ref()
    }

    /// Validates and arms. A rejected config leaves the recorder untouched.
    pub fn configure(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        match self.state {
            RecorderState::Recording => return Err(SessionError::AlreadyRecording),
            RecorderState::FlushPending => return Err(SessionError::FlushPending),
            RecorderState::Idle | RecorderState::Armed => {}
        }
        config.validate()?;

        let dir = self.data_root.join("raw").join(config.subject_id.trim());
        info!(
            "Session armed for subject {} ({} hand), actions {:?}, output {}",
            config.subject_id.trim(),
            config.dominant_hand,
            config.selected_actions,
            dir.display()
        );
        self.subject_dir = Some(dir);
        self.config = Some(config);
        self.state = RecorderState::Armed;
        Ok(())
    }

    pub fn start(&mut self, label: &str, trial_id: &str) -> Result<(), SessionError> {
        match self.state {
            RecorderState::Idle => return Err(SessionError::NotConfigured),
            RecorderState::Recording => return Err(SessionError::AlreadyRecording),
            RecorderState::FlushPending => return Err(SessionError::FlushPending),
            RecorderState::Armed => {}
        }
        if label.trim().is_empty() {
            return Err(ValidationError::Missing("label").into());
        }
        if trial_id.trim().is_empty() {
            return Err(ValidationError::Missing("trial_id").into());
        }

        info!("Recording started: {} trial {}", label, trial_id);
        self.session = Some(RecordingSession::new(label.to_string(), trial_id.to_string()));
        self.state = RecorderState::Recording;
        Ok(())
    }

    /// Appends while recording. Returns whether the frame was kept.
    pub fn observe(&mut self, snapshot: &FrameSnapshot) -> bool {
        if self.state != RecorderState::Recording {
            return false;
        }
        match self.session.as_mut() {
            Some(session) => {
                session.frames.push(RecordedFrame::from(snapshot));
                true
            }
            None => false,
        }
    }

    /// Ends the recording and flushes it. After a failed flush the buffer is
    /// kept and calling `stop` again retries the write.
    pub fn stop(&mut self) -> Result<StopOutcome, SessionError> {
        match self.state {
            RecorderState::Recording => {
                if let Some(session) = self.session.as_mut() {
                    session.end_time = Some(unix_seconds());
                }
            }
            RecorderState::FlushPending => info!("Retrying pending session flush"),
            RecorderState::Idle | RecorderState::Armed => return Err(SessionError::NotRecording),
        }
        let Some(session) = self.session.as_ref() else {
            self.state = RecorderState::Armed;
            return Err(SessionError::NotRecording);
        };

        let frames = session.frames.len();
        if frames == 0 {
            info!("Recording stopped with no frames, nothing written");
            self.finish();
            return Ok(StopOutcome { frames, path: None });
        }

        let (path, file) = match (self.build_file(session), self.output_path(session)) {
            (Ok(file), Some(path)) => (path, file),
            (Err(e), _) => return Err(self.fail(e)),
            (_, None) => return Err(SessionError::NotConfigured),
        };
        if let Err(e) = self.sink.write(&path, &file) {
            return Err(self.fail(e));
        }

        info!("Recording saved: {} frames -> {}", frames, path.display());
        self.finish();
        Ok(StopOutcome {
            frames,
            path: Some(path),
        })
    }

    fn fail(&mut self, error: ContainerError) -> SessionError {
        warn!("Session flush failed, keeping {} buffered frames: {}", self.buffered(), error);
        self.state = RecorderState::FlushPending;
        SessionError::Flush(error)
    }

    fn finish(&mut self) {
        self.session = None;
        self.state = RecorderState::Armed;
    }

    fn buffered(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.frames.len())
    }

    /// `<subject>_<label>_<trial>.kmz`, with a numeric suffix when that name
    /// is already taken on disk.
    fn output_path(&self, session: &RecordingSession) -> Option<PathBuf> {
        let config = self.config.as_ref()?;
        let dir = self.subject_dir.as_ref()?;
        let stem = format!(
            "{}_{}_{}",
            file_component(&config.subject_id),
            file_component(&session.label),
            file_component(&session.trial_id)
        );
        let first = dir.join(format!("{}.{}", stem, FILE_EXTENSION));
        if !first.exists() {
            return Some(first);
        }
        (2u32..)
            .map(|n| dir.join(format!("{}_{}.{}", stem, n, FILE_EXTENSION)))
            .find(|path| !path.exists())
    }

    fn build_file(&self, session: &RecordingSession) -> Result<SessionFile, ContainerError> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ContainerError::Malformed("session has no subject config".into()))?;
        let (angle_columns, hand_angles) = angle_matrix(&session.frames);

        Ok(SessionFile {
            metadata: SessionMetadata {
                subject_id: config.subject_id.trim().to_string(),
                dominant_hand: config.dominant_hand,
                action: session.label.clone(),
                trial_timestamp: session.trial_id.clone(),
                recording_start_time: session.start_time,
                recording_end_time: session.end_time.unwrap_or_else(unix_seconds),
                format_version: FORMAT_VERSION,
            },
            timestamps: session.frames.iter().map(|f| f.timestamp).collect(),
            emg_raw: session.frames.iter().map(|f| f.emg_raw.0).collect(),
            emg_filtered: session.frames.iter().map(|f| f.emg_filtered.0).collect(),
            angle_columns,
            hand_angles,
        })
    }

    pub fn status(&self) -> SessionStatus {
        let session = self.session.as_ref();
        let elapsed = session
            .filter(|_| self.state == RecorderState::Recording)
            .map(|s| s.started.elapsed());
        SessionStatus {
            state: self.state,
            is_recording: self.is_recording(),
            subject_id: self.config.as_ref().map(|c| c.subject_id.trim().to_string()),
            label: session.map(|s| s.label.clone()),
            frames: self.buffered(),
            elapsed_secs: elapsed.map(|e| e.as_secs_f64()),
            phase: elapsed.zip(self.config.as_ref()).map(|(e, c)| c.plan().phase_at(e)),
        }
    }
}
