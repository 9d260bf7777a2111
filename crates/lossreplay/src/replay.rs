//! The replay driver.
//!
//! Files are processed one after another. Inside a file, runs are replayed in
//! order of first appearance and every row is logged before the run is
//! finished. A file that fails never stops the files after it.

use crate::config::ReplayConfig;
use crate::error::{ReplayError, ReplayResult};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::project::project_space_id;
use crate::record::LossTable;
use crate::runs::group_runs;
use crate::summary::{FileOutcome, ReplaySummary};
use crate::tracking::{ResumeMode, RunSpec, SpaceDirectory, Tracker};
use serde::Serialize;
use std::path::PathBuf;

/// How projects are spread over Spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SpaceMode {
    /// Every project goes to the same Space.
    Shared { space_id: String },
    /// Each project gets `<username>/loss-<project>`.
    PerProject { username: String },
}

impl SpaceMode {
    #[must_use]
    pub fn space_for(&self, project: &str) -> String {
        match self {
            Self::Shared { space_id } => space_id.clone(),
            Self::PerProject { username } => project_space_id(username, project),
        }
    }
}

/// One file to replay, fully resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileJob {
    pub file: String,
    pub path: PathBuf,
    pub project: String,
    pub space_id: String,
}

/// Resolve the configured file mappings into jobs, keeping their order.
#[must_use]
pub fn plan_jobs(config: &ReplayConfig, mode: &SpaceMode) -> Vec<FileJob> {
    let data_dir = config.data_dir();
    config
        .file_mappings()
        .into_iter()
        .map(|mapping| {
            let project = mapping.project_name();
            FileJob {
                path: data_dir.join(&mapping.file),
                space_id: mode.space_for(&project),
                file: mapping.file,
                project,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Emit a step event every N points (never at point 0).
    pub progress_every: usize,
    pub resume: ResumeMode,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self { progress_every: crate::config::DEFAULT_PROGRESS_EVERY, resume: ResumeMode::Allow }
    }
}

pub struct Replayer<'a> {
    tracker: &'a dyn Tracker,
    progress: &'a dyn ProgressSink,
    directory: Option<&'a dyn SpaceDirectory>,
    options: ReplayOptions,
}

impl<'a> Replayer<'a> {
    pub fn new(tracker: &'a dyn Tracker, progress: &'a dyn ProgressSink) -> Self {
        Self { tracker, progress, directory: None, options: ReplayOptions::default() }
    }

    /// Check each job's Space on the Hub before replaying into it.
    #[must_use]
    pub fn with_directory(mut self, directory: &'a dyn SpaceDirectory) -> Self {
        self.directory = Some(directory);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ReplayOptions) -> Self {
        self.options = options;
        self
    }

    /// Replay every job and collect the outcomes.
    pub async fn replay_all(&self, mode: SpaceMode, jobs: &[FileJob]) -> ReplaySummary {
        let mut summary = ReplaySummary::new(mode);

        for job in jobs {
            if !job.path.exists() {
                self.progress.on_event(ProgressEvent::FileMissing { file: job.file.clone() });
                summary.record(&job.file, FileOutcome::Missing);
                continue;
            }

            let outcome = match self.replay_file(job).await {
                Ok(outcome) => outcome,
                Err(ReplayError::MissingFile(_)) => {
                    self.progress.on_event(ProgressEvent::FileMissing { file: job.file.clone() });
                    FileOutcome::Missing
                }
                Err(ReplayError::MissingColumn { file, column }) => {
                    let reason = format!("no '{column}' column");
                    self.progress.on_event(ProgressEvent::ColumnMissing { file, column: column.to_string() });
                    FileOutcome::Skipped { reason }
                }
                Err(e) => {
                    let error = error_chain(&e);
                    tracing::error!(file = %job.file, error = ?e, "replay failed");
                    self.progress.on_event(ProgressEvent::FileFailed { file: job.file.clone(), error: error.clone() });
                    FileOutcome::Failed { error }
                }
            };
            summary.record(&job.file, outcome);
        }

        summary
    }

    /// Replay a single file into its project.
    pub async fn replay_file(&self, job: &FileJob) -> ReplayResult<FileOutcome> {
        self.progress.on_event(ProgressEvent::FileStarted { file: job.file.clone() });

        let table = LossTable::read(&job.path)?;
        tracing::debug!(
            path = %table.path().display(),
            rows = table.len(),
            tokens = table.has_tokens_column(),
            "loss table loaded"
        );
        self.progress.on_event(ProgressEvent::DataLoaded { file: job.file.clone(), rows: table.len() });

        let runs = group_runs(table.into_records());
        self.progress.on_event(ProgressEvent::RunsFound {
            runs: runs.iter().map(|r| (r.name.clone(), r.len())).collect(),
        });

        self.progress.on_event(ProgressEvent::ProjectResolved {
            project: job.project.clone(),
            space_id: Some(job.space_id.clone()),
        });
        self.check_space(&job.space_id).await;

        let every = self.options.progress_every.max(1);
        let mut points = 0_u64;

        for run in &runs {
            self.progress.on_event(ProgressEvent::RunStarted { run: run.name.clone() });

            let spec = RunSpec::new(&job.project, &run.name).in_space(&job.space_id).with_resume(self.options.resume);
            let mut logger = self.tracker.start_run(&spec).await?;

            let total = run.len();
            self.progress.on_event(ProgressEvent::RunLogging { run: run.name.clone(), points: total });

            for (j, entry) in run.metric_entries().enumerate() {
                logger.log(&entry).await?;
                if j > 0 && j % every == 0 {
                    self.progress.on_event(ProgressEvent::Step { run: run.name.clone(), step: j, total });
                }
            }

            let stats = logger.finish().await?;
            points += stats.points;
            tracing::debug!(project = %job.project, run = %stats.run, points = stats.points, "run finished");
            self.progress.on_event(ProgressEvent::RunFinished { run: run.name.clone() });
        }

        self.progress.on_event(ProgressEvent::FileFinished {
            project: job.project.clone(),
            runs: runs.len(),
            space_id: Some(job.space_id.clone()),
        });

        Ok(FileOutcome::Succeeded {
            project: job.project.clone(),
            runs: runs.len(),
            points,
            space_id: job.space_id.clone(),
        })
    }

    /// Report whether the Space exists. Failures are only reported.
    async fn check_space(&self, space_id: &str) {
        let Some(directory) = self.directory else {
            return;
        };
        match directory.space_exists(space_id).await {
            Ok(exists) => {
                self.progress.on_event(ProgressEvent::SpaceChecked { space_id: space_id.to_string(), exists });
            }
            Err(e) => {
                tracing::warn!(space = %space_id, "space check failed: {}", e);
                self.progress
                    .on_event(ProgressEvent::SpaceCheckFailed { space_id: space_id.to_string(), error: e.to_string() });
            }
        }
    }
}

/// `error: cause: cause` rendering of an error and its sources.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !out.ends_with(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = cause.source();
    }
    out
}
