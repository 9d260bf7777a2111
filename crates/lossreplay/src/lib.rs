//! Loss Replay
//!
//! Replays CSV files of training-loss measurements into Trackio dashboards:
//! - Reading loss tables (`LossTable`) and grouping rows into runs
//! - Deriving project names and Space ids from file names
//! - Driving a `Tracker` backend (local store, hosted Space, dry run)
//! - Reporting progress and a per-file summary

pub mod config;
pub mod error;
pub mod progress;
pub mod project;
pub mod record;
pub mod replay;
pub mod runs;
pub mod summary;
pub mod tracking;

pub use config::{BackendKind, ConfigError, FileMapping, ReplayConfig};
pub use error::{ReplayError, ReplayResult};
pub use progress::{ProgressEvent, ProgressSink, StdoutProgressSink};
pub use project::{project_name_from_file, project_space_id, space_host, space_url};
pub use record::{LossRecord, LossTable};
pub use replay::{plan_jobs, FileJob, ReplayOptions, Replayer, SpaceMode};
pub use runs::{group_runs, RunGroup};
pub use summary::{FileOutcome, ReplaySummary};
pub use tracking::{
    DryRunTracker, HubClient, LocalTracker, MetricEntry, ResumeMode, RunLogger, RunSpec,
    SpaceDirectory, SpaceTracker, Tracker, TrackingError, TrackingResult,
};
