//! Acquisition service: owns the shared store, the recorder and the producer
//! threads. Constructed once at startup and handed to every consumer.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{info, warn};

use crate::config::{ConfigError, PipelineConfig};
use crate::emg::filter::SignalFilterBank;
use crate::emg::processing::EmgProcessor;
use crate::emg::source::EmgSource;
use crate::emg::FilteredEmgVector;
use crate::kernel::cancel::RunFlag;
use crate::kernel::source::Producer;
use crate::kernel::state::{LatestStateStore, ProducerStatus};
use crate::kernel::telemetry::metrics::RateStats;
use crate::session::config::SessionConfig;
use crate::session::recorder::{SessionError, SessionRecorder, SessionStatus, StopOutcome};
use crate::vision::joints::JointAngleSet;
use crate::vision::pipeline::VisionPipeline;
use crate::vision::source::LandmarkSource;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// What a reader gets back from one poll.
#[derive(Debug, Clone, Serialize)]
pub struct LiveSnapshot {
    pub timestamp: f64,
    pub emg_filtered: FilteredEmgVector,
    pub angles: JointAngleSet,
    /// JPEG of the latest camera frame. Transport encoding is up to the caller.
    #[serde(skip)]
    pub frame_jpeg: Option<Vec<u8>>,
    pub emg_rate: RateStats,
    pub camera_rate: RateStats,
}

pub struct AcquisitionService {
    store: Arc<LatestStateStore>,
    recorder: Mutex<SessionRecorder>,
    run_flag: RunFlag,
    workers: Mutex<Vec<JoinHandle<()>>>,
    jpeg_quality: u8,
}

impl AcquisitionService {
    /// Validates `config` and spawns one OS thread per producer.
    pub fn start<E, L>(config: &PipelineConfig, emg: E, camera: L) -> Result<Self, ServiceError>
    where
        E: EmgSource + 'static,
        L: LandmarkSource + 'static,
    {
        config.validate()?;
        let bank = SignalFilterBank::new(config.emg.sample_rate_hz, &config.emg.filter).map_err(ConfigError::from)?;
        let store = Arc::new(LatestStateStore::new());
        let run_flag = RunFlag::new();

        let emg_loop = EmgProcessor::new(
            emg,
            bank,
            store.clone(),
            run_flag.clone(),
            config.emg.retry,
            config.emg.poll_timeout(),
        );
        let camera_loop = VisionPipeline::new(camera, store.clone(), run_flag.clone(), config.camera.retry);

        let mut workers = Vec::with_capacity(2);
        let spawned = std::thread::Builder::new()
            .name("emg-producer".into())
            .spawn(move || emg_loop.run())
            .and_then(|handle| {
                workers.push(handle);
                std::thread::Builder::new()
                    .name("camera-producer".into())
                    .spawn(move || camera_loop.run())
            });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                run_flag.stop();
                for worker in workers {
                    let _ = worker.join();
                }
                return Err(e.into());
            }
        }

        info!(
            "Acquisition service started ({} Hz EMG, data root {})",
            config.emg.sample_rate_hz,
            config.recording.data_root.display()
        );
        Ok(Self {
            store,
            recorder: Mutex::new(SessionRecorder::new(&config.recording.data_root)),
            run_flag,
            workers: Mutex::new(workers),
            jpeg_quality: config.camera.jpeg_quality,
        })
    }

    pub fn store(&self) -> &Arc<LatestStateStore> {
        &self.store
    }

    pub fn run_flag(&self) -> &RunFlag {
        &self.run_flag
    }

    /// Latest state for the reader. While recording, the same snapshot is
    /// appended to the session.
    pub fn get_latest_snapshot(&self) -> LiveSnapshot {
        let snapshot = self.store.snapshot();
        // Store lock is already released; appending never blocks a producer.
        self.recorder.lock().observe(&snapshot);

        let frame_jpeg = snapshot.frame.as_ref().and_then(|frame| {
            frame
                .encode_jpeg(self.jpeg_quality)
                .map_err(|e| warn!("JPEG encoding failed, dropping frame: {}", e))
                .ok()
        });
        LiveSnapshot {
            timestamp: snapshot.timestamp,
            emg_filtered: snapshot.emg_filtered,
            angles: snapshot.angles,
            frame_jpeg,
            emg_rate: self.store.rates(Producer::Emg),
            camera_rate: self.store.rates(Producer::Camera),
        }
    }

    pub fn get_producer_status(&self, producer: Producer) -> ProducerStatus {
        self.store.producer_status(producer)
    }

    pub fn configure_session(&self, config: SessionConfig) -> Result<(), SessionError> {
        self.recorder.lock().configure(config)
    }

    pub fn start_session(&self, label: &str, trial_id: &str) -> Result<(), SessionError> {
        self.recorder.lock().start(label, trial_id)
    }

    /// Blocks on file I/O. Call from a blocking context.
    ///
    /// The recorder lock is held for the whole flush, so concurrent
    /// `get_latest_snapshot` callers wait for the write to finish. Producers
    /// only touch the store and keep running.
    pub fn stop_session(&self) -> Result<StopOutcome, SessionError> {
        self.recorder.lock().stop()
    }

    pub fn session_status(&self) -> SessionStatus {
        self.recorder.lock().status()
    }

    /// Drops the running flag and joins both producers.
    pub fn shutdown(&self) {
        self.run_flag.stop();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        if workers.is_empty() {
            return;
        }
        for worker in workers {
            let name = worker.thread().name().unwrap_or("producer").to_string();
            if worker.join().is_err() {
                warn!("{} thread panicked", name);
            }
        }
        info!("Acquisition service stopped.");
    }
}

impl Drop for AcquisitionService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
