use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::filter::SignalFilterBank;
use super::source::EmgSource;
use crate::kernel::cancel::RunFlag;
use crate::kernel::retry::{LoopStep, RetryCounter, RetryPolicy};
use crate::kernel::source::Producer;
use crate::kernel::state::LatestStateStore;

/// EMG producer loop: driver -> filter bank -> store.
pub struct EmgProcessor<S: EmgSource> {
    source: S,
    bank: SignalFilterBank,
    store: Arc<LatestStateStore>,
    run_flag: RunFlag,
    policy: RetryPolicy,
    poll_timeout: Duration,
    retries: RetryCounter,
}

impl<S: EmgSource> EmgProcessor<S> {
    pub fn new(
        source: S,
        bank: SignalFilterBank,
        store: Arc<LatestStateStore>,
        run_flag: RunFlag,
        policy: RetryPolicy,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            source,
            bank,
            store,
            run_flag,
            retries: RetryCounter::new(policy.max_retries),
            policy,
            poll_timeout,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retries.count()
    }

    /// One iteration, without the trailing pause.
    pub fn step(&mut self) -> LoopStep {
        let outcome = self.source.poll(self.poll_timeout);
        self.store.set_link(Producer::Emg, self.source.link());

        match outcome {
            Ok(Some(raw)) => {
                self.retries.reset();
                let filtered = self.bank.ingest(raw);
                self.store.publish_emg(raw, filtered);
                LoopStep::Published
            }
            Ok(None) => {
                self.retries.reset();
                LoopStep::Idle
            }
            Err(e) => {
                let step = LoopStep::from_escalation(self.retries.record_failure());
                match step {
                    LoopStep::ExtendedBackoff => warn!(
                        "EMG device unavailable after {} attempts ({}), backing off {:?}",
                        self.policy.max_retries,
                        e,
                        self.policy.extended_backoff()
                    ),
                    LoopStep::Retrying { attempt } => debug!(
                        "EMG connect attempt {}/{} failed: {}",
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
        info!(
            "EMG Processor Started. Poll timeout {:?}, retry ceiling {}",
            self.poll_timeout, self.policy.max_retries
        );
        while self.run_flag.is_running() {
            let step = self.step();
            // The blocking poll paces the loop while samples flow.
            if step != LoopStep::Published {
                self.run_flag.sleep(step.pause(&self.policy));
            }
        }
        self.source.close();
        self.store.set_link(Producer::Emg, self.source.link());
        info!("EMG Processor Stopped.");
    }
}
