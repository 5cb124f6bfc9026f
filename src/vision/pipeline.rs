use std::sync::Arc;
use tracing::{debug, info, warn};

use super::angles::AngleEngine;
use super::source::LandmarkSource;
use crate::kernel::cancel::RunFlag;
use crate::kernel::retry::{LoopStep, RetryCounter, RetryPolicy};
use crate::kernel::source::Producer;
use crate::kernel::state::LatestStateStore;

/// Camera producer loop: landmark source -> angle engine -> store.
pub struct VisionPipeline<S: LandmarkSource> {
    source: S,
    engine: AngleEngine,
    store: Arc<LatestStateStore>,
    run_flag: RunFlag,
    policy: RetryPolicy,
    retries: RetryCounter,
}

impl<S: LandmarkSource> VisionPipeline<S> {
    pub fn new(source: S, store: Arc<LatestStateStore>, run_flag: RunFlag, policy: RetryPolicy) -> Self {
        Self {
            source,
            engine: AngleEngine::new(),
            store,
            run_flag,
            retries: RetryCounter::new(policy.max_retries),
            policy,
        }
    }

    pub fn engine(&self) -> &AngleEngine {
        &self.engine
    }

    pub fn retry_count(&self) -> u32 {
        self.retries.count()
    }

    /// One iteration, without the trailing pause.
    pub fn step(&mut self) -> LoopStep {
        let outcome = self.source.wait_frame();
        self.store.set_link(Producer::Camera, self.source.link());

        match outcome {
            Ok(Some(frame)) => {
                self.retries.reset();
                // No hand: engine keeps its state, the store shows an empty map.
                let angles = *self.engine.update(frame.hand.as_ref());
                let published = frame.hand.is_some().then_some(angles);
                self.store.publish_camera(published, frame.image);
                LoopStep::Published
            }
            Ok(None) => {
                // The camera answered, so the failure streak is broken.
                self.retries.reset();
                LoopStep::Idle
            }
            Err(e) => {
                let step = LoopStep::from_escalation(self.retries.record_failure());
                match step {
                    LoopStep::ExtendedBackoff => warn!(
                        "Camera unavailable after {} attempts ({}), backing off {:?}",
                        self.policy.max_retries,
                        e,
                        self.policy.extended_backoff()
                    ),
                    LoopStep::Retrying { attempt } => debug!(
                        "Camera read attempt {}/{} failed: {}",
                        attempt, self.policy.max_retries, e
                    ),
                    _ => {}
                }
                step
            }
        }
    }

    /// Runs until the flag drops. Meant for a dedicated OS thread.
    pub fn run(mut self) {
        info!("Vision Pipeline Started. Retry ceiling {}", self.policy.max_retries);
        while self.run_flag.is_running() {
            let step = self.step();
            self.run_flag.sleep(step.pause(&self.policy));
        }
        self.source.close();
        self.store.set_link(Producer::Camera, self.source.link());
        info!("Vision Pipeline Stopped.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::source::{LinkStatus, SourceError};
    use crate::kernel::state::CameraFrame;
    use crate::vision::source::{CapturedFrame, SyntheticHandSource};
    use std::collections::VecDeque;

    struct Scripted(VecDeque<Result<Option<CapturedFrame>, SourceError>>);

    impl LandmarkSource for Scripted {
        fn wait_frame(&mut self) -> Result<Option<CapturedFrame>, SourceError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }

        fn link(&self) -> LinkStatus {
            LinkStatus::READY
        }
    }

    fn frame(hand: bool) -> CapturedFrame {
        CapturedFrame {
            image: CameraFrame::from_rgb8(2, 2, vec![0; 12]).unwrap(),
            hand: hand.then(|| SyntheticHandSource::hand_pose(0.4)),
        }
    }

    #[test]
    fn absent_hand_clears_store_but_keeps_engine() {
        let store = Arc::new(LatestStateStore::new());
        let source = Scripted(vec![Ok(Some(frame(true))), Ok(Some(frame(false)))].into());
        let mut pipeline = VisionPipeline::new(source, store.clone(), RunFlag::new(), RetryPolicy::default());

        assert_eq!(pipeline.step(), LoopStep::Published);
        assert_eq!(store.snapshot().angles.len(), 20);
        let before = *pipeline.engine().latest();

        assert_eq!(pipeline.step(), LoopStep::Published);
        let snapshot = store.snapshot();
        assert!(snapshot.angles.is_empty());
        assert!(snapshot.frame.is_some());
        assert_eq!(*pipeline.engine().latest(), before);
        assert_eq!(store.rates(Producer::Camera).total_frames, 2);
    }

    #[test]
    fn failures_escalate_then_recover() {
        let mut script: VecDeque<_> = (0..5).map(|_| Err(SourceError::Disconnected)).collect();
        script.push_back(Ok(Some(frame(true))));
        let store = Arc::new(LatestStateStore::new());
        let mut pipeline = VisionPipeline::new(Scripted(script), store, RunFlag::new(), RetryPolicy::default());

        let steps: Vec<_> = (0..6).map(|_| pipeline.step()).collect();
        assert_eq!(steps[3], LoopStep::Retrying { attempt: 4 });
        assert_eq!(steps[4], LoopStep::ExtendedBackoff);
        assert_eq!(steps[5], LoopStep::Published);
        assert_eq!(pipeline.retry_count(), 0);
    }

    #[test]
    fn idle_frame_breaks_failure_streak() {
        let mut script: VecDeque<_> = (0..4).map(|_| Err(SourceError::Disconnected)).collect();
        script.push_back(Ok(None));
        script.extend((0..4).map(|_| Err(SourceError::Disconnected)));
        let store = Arc::new(LatestStateStore::new());
        let mut pipeline = VisionPipeline::new(Scripted(script), store, RunFlag::new(), RetryPolicy::default());

        let steps: Vec<_> = (0..9).map(|_| pipeline.step()).collect();
        assert_eq!(steps[4], LoopStep::Idle);
        assert_eq!(pipeline.retry_count(), 4);
        assert!(steps.iter().all(|s| *s != LoopStep::ExtendedBackoff));
        assert_eq!(steps[8], LoopStep::Retrying { attempt: 4 });
    }
}
