use kinemyo::emg::source::SyntheticEmgSource;
use kinemyo::kernel::source::Producer;
use kinemyo::session::config::{DominantHand, SessionConfig};
use kinemyo::session::container::SessionFile;
use kinemyo::session::recorder::{RecorderState, SessionError};
use kinemyo::vision::source::SyntheticHandSource;
use kinemyo::{AcquisitionService, PipelineConfig};
use std::sync::Arc;
use std::time::Duration;

fn start(data_root: &std::path::Path) -> Arc<AcquisitionService> {
    let mut config = PipelineConfig::default();
    config.recording.data_root = data_root.to_path_buf();
    let service = AcquisitionService::start(
        &config,
        SyntheticEmgSource::new(config.emg.sample_rate_hz),
        SyntheticHandSource::new(32, 24),
    )
    .expect("default config should start");
    Arc::new(service)
}

async fn wait_for_frames(service: &AcquisitionService, producer: Producer, count: u64) {
    for _ in 0..200 {
        if service.get_producer_status(producer).total_frames >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{:?} never produced {} frames", producer, count);
}

#[tokio::test]
async fn test_live_snapshot_carries_both_producers() {
    let dir = tempfile::tempdir().unwrap();
    let service = start(dir.path());

    // 1. Both producers come up
    wait_for_frames(&service, Producer::Emg, 20).await;
    wait_for_frames(&service, Producer::Camera, 2).await;
    assert!(service.get_producer_status(Producer::Emg).connected);
    assert!(service.get_producer_status(Producer::Camera).synced);

    // 2. The reader gets filtered EMG, angles and a JPEG frame
    let live = service.get_latest_snapshot();
    assert_eq!(live.emg_filtered.as_slice().len(), 8);
    assert_eq!(live.angles.len(), 20);
    let jpeg = live.frame_jpeg.as_ref().expect("frame should be encoded");
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "JPEG start-of-image marker");
    assert!(live.emg_rate.total_frames >= 20);

    let json = serde_json::to_value(&live).unwrap();
    assert!(json["angles"]["index_mcp_flexion"].is_number());
    assert!(json.get("frame_jpeg").is_none());

    service.shutdown();
    assert!(!service.get_producer_status(Producer::Emg).connected);
}

#[tokio::test]
async fn test_recording_through_service() {
    let dir = tempfile::tempdir().unwrap();
    let service = start(dir.path());
    wait_for_frames(&service, Producer::Camera, 1).await;

    // 1. Misuse is rejected
    assert!(matches!(service.start_session("open", "t1"), Err(SessionError::NotConfigured)));

    // 2. Arm, record a few reader polls, stop off the async runtime
    service
        .configure_session(SessionConfig {
            subject_id: "42".into(),
            dominant_hand: DominantHand::Left,
            action_duration: 3,
            repeat_times: 1,
            rest_duration: 2,
            selected_actions: vec!["open".into()],
        })
        .unwrap();
    service.start_session("open", "t1").unwrap();
    for _ in 0..5 {
        service.get_latest_snapshot();
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(service.session_status().frames, 5);

    let worker = service.clone();
    let outcome = tokio::task::spawn_blocking(move || worker.stop_session())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(service.session_status().state, RecorderState::Armed);

    // 3. The file holds exactly what the reader saw
    let file = SessionFile::open(outcome.path.unwrap()).unwrap();
    assert_eq!(file.len(), 5);
    assert_eq!(file.metadata.dominant_hand, DominantHand::Left);
    assert!(file.timestamps.windows(2).all(|w| w[0] <= w[1]));

    service.shutdown();
}
