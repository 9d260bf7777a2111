//! End-to-end replay into a local Trackio store.

use lossreplay::tracking::LocalStore;
use lossreplay::{
    plan_jobs, FileMapping, FileOutcome, LocalTracker, ProgressEvent, ProgressSink, ReplayConfig, Replayer,
    SpaceMode,
};
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingSink {
    fn on_event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

fn setup() -> (TempDir, ReplayConfig) {
    let temp = TempDir::new().unwrap();
    let data = temp.path().join("data");
    fs::create_dir_all(&data).unwrap();

    fs::write(
        data.join("lr_loss.csv"),
        "run_name,loss,tokens\n\
         lr-1e-3,2.50,1000\n\
         lr-3e-4,2.70,1000\n\
         lr-1e-3,2.10,2000\n\
         lr-3e-4,2.40,2000\n\
         lr-1e-3,1.90,3000\n",
    )
    .unwrap();
    fs::write(data.join("wsd_loss.csv"), "run_name,loss\nwsd,3.0\nwsd,2.5\ncosine,3.1\n").unwrap();
    fs::write(data.join("broken_loss.csv"), "run,loss\nx,1.0\n").unwrap();

    let config = ReplayConfig {
        data_dir: Some(data),
        files: vec![
            FileMapping::new("lr_loss.csv", "lr-loss-comparison"),
            FileMapping::new("wsd_loss.csv", ""),
            FileMapping::new("broken_loss.csv", ""),
            FileMapping::new("absent_loss.csv", ""),
        ],
        ..Default::default()
    };
    (temp, config)
}

#[tokio::test]
async fn test_replay_into_local_store() {
    let (temp, config) = setup();
    let tracker = LocalTracker::new(temp.path().join("trackio"));
    let sink = RecordingSink::default();
    let mode = SpaceMode::Shared { space_id: "me/loss-experiment".to_string() };

    let jobs = plan_jobs(&config, &mode);
    let summary = Replayer::new(&tracker, &sink).replay_all(mode, &jobs).await;

    assert_eq!(summary.total_count(), 4);
    assert_eq!(summary.success_count(), 2);
    assert_eq!(summary.exit_code(), 1);
    assert_eq!(
        summary.outcomes[0].1,
        FileOutcome::Succeeded {
            project: "lr-loss-comparison".to_string(),
            runs: 2,
            points: 5,
            space_id: "me/loss-experiment".to_string()
        }
    );
    assert!(matches!(summary.outcomes[2].1, FileOutcome::Skipped { .. }));
    assert_eq!(summary.outcomes[3].1, FileOutcome::Missing);

    let store = LocalStore::open(&tracker.project_db_path("lr-loss-comparison")).unwrap();
    assert_eq!(store.run_names().unwrap(), vec!["lr-1e-3".to_string(), "lr-3e-4".to_string()]);
    let metrics = store.run_metrics("lr-1e-3").unwrap();
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics[0].0, 0);
    assert_eq!(metrics[2].1["tokens"], 3000.0);

    let store = LocalStore::open(&tracker.project_db_path("wsd-comparison")).unwrap();
    let metrics = store.run_metrics("wsd").unwrap();
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[1].1["step"], 1);
    assert_eq!(store.metric_count("cosine").unwrap(), 1);

    let events = sink.events.lock().unwrap();
    assert!(events.contains(&ProgressEvent::FileMissing { file: "absent_loss.csv".to_string() }));
    assert!(events.contains(&ProgressEvent::ColumnMissing {
        file: "broken_loss.csv".to_string(),
        column: "run_name".to_string()
    }));
}

#[tokio::test]
async fn test_replaying_twice_appends_steps() {
    let (temp, mut config) = setup();
    config.files.truncate(2);
    let tracker = LocalTracker::new(temp.path().join("trackio"));
    let sink = RecordingSink::default();
    let mode = SpaceMode::PerProject { username: "me".to_string() };
    let jobs = plan_jobs(&config, &mode);

    let first = Replayer::new(&tracker, &sink).replay_all(mode.clone(), &jobs).await;
    assert_eq!(first.exit_code(), 0);
    let second = Replayer::new(&tracker, &sink).replay_all(mode, &jobs).await;
    assert_eq!(second.exit_code(), 0);

    let store = LocalStore::open(&tracker.project_db_path("wsd-comparison")).unwrap();
    let steps: Vec<u64> = store.run_metrics("wsd").unwrap().into_iter().map(|(step, _)| step).collect();
    assert_eq!(steps, vec![0, 1, 2, 3]);

    let urls = second.dashboard_urls();
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[1].1, "https://huggingface.co/spaces/me/loss-wsd-comparison");
}
