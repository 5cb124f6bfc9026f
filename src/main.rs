use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kinemyo::emg::source::SyntheticEmgSource;
use kinemyo::kernel::source::Producer;
use kinemyo::kernel::time::unix_seconds;
use kinemyo::session::config::{DominantHand, SessionConfig, ACTION_DURATION_SECS};
use kinemyo::session::container::SessionFile;
use kinemyo::session::summary::SessionSummary;
use kinemyo::vision::joints::Joint;
use kinemyo::vision::source::SyntheticHandSource;
use kinemyo::{AcquisitionService, PipelineConfig};

/// Reader cadence, standing in for the dashboard's polling.
const READER_PERIOD: Duration = Duration::from_millis(33);
const STATUS_EVERY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(author, version, about = "Synchronised EMG + hand-pose acquisition", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run both producers and poll the latest state until Ctrl-C.
    Run {
        /// JSON pipeline config; defaults apply to every missing field.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Record one labelled trial, then exit.
        #[arg(long, requires = "subject")]
        record: Option<String>,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long, default_value = "right")]
        hand: DominantHand,
        /// Recording length in seconds.
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
    /// Print a summary of a recorded session file.
    Inspect {
        file: PathBuf,
        /// Only show angles of one joint class (mcp, pip, dip).
        #[arg(long)]
        joint: Option<Joint>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            record,
            subject,
            hand,
            seconds,
        } => {
            let recording = record.zip(subject).map(|(label, subject)| (label, subject, hand, seconds));
            run(config, recording).await
        }
        Commands::Inspect { file, joint } => inspect(&file, joint),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();
}

async fn run(
    config_path: Option<PathBuf>,
    recording: Option<(String, String, DominantHand, u64)>,
) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    tracing::info!("Kinemyo booting...");

    let emg = SyntheticEmgSource::new(config.emg.sample_rate_hz);
    let camera = SyntheticHandSource::new(160, 120);
    let service = Arc::new(AcquisitionService::start(&config, emg, camera)?);

    let deadline = match &recording {
        Some((label, subject, hand, seconds)) => {
            let action = u32::try_from(*seconds)
                .unwrap_or(u32::MAX)
                .clamp(*ACTION_DURATION_SECS.start(), *ACTION_DURATION_SECS.end());
            service.configure_session(SessionConfig {
                subject_id: subject.clone(),
                dominant_hand: *hand,
                action_duration: action,
                repeat_times: 1,
                rest_duration: 2,
                selected_actions: vec![label.clone()],
            })?;
            let trial_id = format!("{}", unix_seconds() as u64);
            service.start_session(label, &trial_id)?;
            Some(tokio::time::Instant::now() + Duration::from_secs(*seconds))
        }
        None => None,
    };

    let mut cadence = tokio::time::interval(READER_PERIOD);
    cadence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut status = tokio::time::interval(STATUS_EVERY);
    status.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!("Acquisition active. Press Ctrl+C to stop.");
    loop {
        tokio::select! {
            _ = cadence.tick() => {
                service.get_latest_snapshot();
                if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                    break;
                }
            }
            _ = status.tick() => {
                let emg = service.get_producer_status(Producer::Emg);
                let cam = service.get_producer_status(Producer::Camera);
                let session = service.session_status();
                tracing::info!(
                    "EMG {:.1} fps ({} total, connected {}) | camera {:.1} fps ({} total) | session {:?}, {} frames",
                    emg.fps, emg.total_frames, emg.connected, cam.fps, cam.total_frames, session.state, session.frames
                );
            }
            _ = &mut ctrl_c => {
                tracing::info!("Ctrl-C received, shutting down");
                break;
            }
            _ = service.run_flag().stopped() => break,
        }
    }

    let worker = service.clone();
    tokio::task::spawn_blocking(move || {
        if worker.session_status().is_recording {
            match worker.stop_session() {
                Ok(outcome) => match outcome.path {
                    Some(path) => tracing::info!("Saved {} frames to {}", outcome.frames, path.display()),
                    None => tracing::info!("No frames recorded"),
                },
                Err(e) => tracing::error!("Session flush failed: {}", e),
            }
        }
        worker.shutdown();
    })
    .await?;
    Ok(())
}

fn inspect(path: &Path, joint: Option<Joint>) -> anyhow::Result<()> {
    let file = SessionFile::open(path).with_context(|| format!("opening {}", path.display()))?;
    let summary = SessionSummary::from_file(&file);
    match joint {
        None => print!("{}", summary),
        Some(joint) => {
            let mut out = String::new();
            summary.write_angles(&mut out, &summary.angle_columns(joint))?;
            println!("{} angles for subject {} / {}:", joint.as_str().to_uppercase(), summary.subject_id, summary.action);
            print!("{}", out);
        }
    }
    Ok(())
}
