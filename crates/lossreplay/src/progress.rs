use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    FileStarted { file: String },
    FileMissing { file: String },
    DataLoaded { file: String, rows: usize },
    ColumnMissing { file: String, column: String },
    RunsFound { runs: Vec<(String, usize)> },
    ProjectResolved { project: String, space_id: Option<String> },
    SpaceChecked { space_id: String, exists: bool },
    SpaceCheckFailed { space_id: String, error: String },
    RunStarted { run: String },
    RunLogging { run: String, points: usize },
    Step { run: String, step: usize, total: usize },
    RunFinished { run: String },
    FileFinished { project: String, runs: usize, space_id: Option<String> },
    FileFailed { file: String, error: String },
}

pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: ProgressEvent);
}

/// Prints progress as human-readable lines on stdout.
#[derive(Debug, Default)]
pub struct StdoutProgressSink;

impl ProgressSink for StdoutProgressSink {
    fn on_event(&self, event: ProgressEvent) {
        println!("{}", render(&event));
    }
}

/// Text printed for an event.
#[must_use]
pub fn render(event: &ProgressEvent) -> String {
    match event {
        ProgressEvent::FileStarted { file } => format!("\n🚀 Processing: {file}"),
        ProgressEvent::FileMissing { file } => format!("\n⚠️ File not found: {file}"),
        ProgressEvent::DataLoaded { rows, .. } => format!("📁 Data loaded: {rows} rows"),
        ProgressEvent::ColumnMissing { file, column } => format!("❌ No '{column}' column in {file}"),
        ProgressEvent::RunsFound { runs } => {
            let mut out = format!("🔍 Runs to create ({}):", runs.len());
            for (name, count) in runs {
                out.push_str(&format!("\n  - \"{name}\": {count} points"));
            }
            out
        }
        ProgressEvent::ProjectResolved { project, space_id } => match space_id {
            Some(space_id) => format!("🎯 Trackio project: {project}\n🌐 Space ID: {space_id}"),
            None => format!("🎯 Trackio project: {project}"),
        },
        ProgressEvent::SpaceChecked { space_id, exists: true } => format!("  ✅ Existing Space: {space_id}"),
        ProgressEvent::SpaceChecked { space_id, exists: false } => {
            format!("  🆕 Space {space_id} does not exist yet")
        }
        ProgressEvent::SpaceCheckFailed { space_id, error } => {
            format!("  ⚠️ Could not check Space {space_id}: {error}")
        }
        ProgressEvent::RunStarted { run } => format!("\n🌐 Creating run: \"{run}\""),
        ProgressEvent::RunLogging { points, .. } => format!("📊 Logging {points} points..."),
        ProgressEvent::Step { step, total, .. } => format!("  ✅ Step {step}/{total}"),
        ProgressEvent::RunFinished { run } => format!("✅ Run \"{run}\" finished!"),
        ProgressEvent::FileFinished { project, runs, space_id } => match space_id {
            Some(space_id) => format!("\n🎉 Project {project} created with {runs} runs in Space {space_id}!"),
            None => format!("\n🎉 Project {project} created with {runs} runs!"),
        },
        ProgressEvent::FileFailed { file, error } => format!("❌ Error while logging {file}: {error}"),
    }
}
