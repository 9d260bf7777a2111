use crate::project::space_url;
use crate::replay::SpaceMode;
use serde::Serialize;

/// What happened to one loss file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Succeeded { project: String, runs: usize, points: u64, space_id: String },
    /// The file was not found in the data directory.
    Missing,
    /// A required column was absent.
    Skipped { reason: String },
    Failed { error: String },
}

impl FileOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Outcomes of a whole replay, in processing order.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub mode: SpaceMode,
    pub outcomes: Vec<(String, FileOutcome)>,
}

impl ReplaySummary {
    #[must_use]
    pub fn new(mode: SpaceMode) -> Self {
        Self { mode, outcomes: Vec::new() }
    }

    pub fn record(&mut self, file: impl Into<String>, outcome: FileOutcome) {
        self.outcomes.push((file.into(), outcome));
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.success_count() == self.total_count()
    }

    /// Process exit code: 0 when every file succeeded, 1 otherwise.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_succeeded())
    }

    /// Dashboards to visit, as `(label, url)`.
    ///
    /// Shared mode has a single dashboard; per-project mode lists the Space of
    /// every project that was replayed successfully.
    #[must_use]
    pub fn dashboard_urls(&self) -> Vec<(String, String)> {
        match &self.mode {
            SpaceMode::Shared { space_id } => vec![(space_id.clone(), space_url(space_id))],
            SpaceMode::PerProject { .. } => self
                .outcomes
                .iter()
                .filter_map(|(_, outcome)| match outcome {
                    FileOutcome::Succeeded { project, space_id, .. } => {
                        Some((project.clone(), space_url(space_id)))
                    }
                    _ => None,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeded(project: &str, space_id: &str) -> FileOutcome {
        FileOutcome::Succeeded { project: project.to_string(), runs: 2, points: 10, space_id: space_id.to_string() }
    }

    #[test]
    fn test_exit_code_all_succeeded() {
        let mut summary = ReplaySummary::new(SpaceMode::Shared { space_id: "me/board".to_string() });
        summary.record("a.csv", succeeded("a", "me/board"));
        summary.record("b.csv", succeeded("b", "me/board"));
        assert!(summary.all_succeeded());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_exit_code_with_failures() {
        let mut summary = ReplaySummary::new(SpaceMode::Shared { space_id: "me/board".to_string() });
        summary.record("a.csv", succeeded("a", "me/board"));
        summary.record("b.csv", FileOutcome::Missing);
        summary.record("c.csv", FileOutcome::Failed { error: "boom".to_string() });
        assert_eq!(summary.success_count(), 1);
        assert_eq!(summary.total_count(), 3);
        assert_eq!(summary.exit_code(), 1);
    }

    #[test]
    fn test_empty_summary_succeeds() {
        let summary = ReplaySummary::new(SpaceMode::Shared { space_id: "me/board".to_string() });
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn test_dashboard_urls_shared() {
        let summary = ReplaySummary::new(SpaceMode::Shared { space_id: "tfrere/loss-experiment".to_string() });
        assert_eq!(
            summary.dashboard_urls(),
            vec![(
                "tfrere/loss-experiment".to_string(),
                "https://huggingface.co/spaces/tfrere/loss-experiment".to_string()
            )]
        );
    }

    #[test]
    fn test_dashboard_urls_per_project_lists_successes() {
        let mut summary = ReplaySummary::new(SpaceMode::PerProject { username: "me".to_string() });
        summary.record("a.csv", succeeded("a-comparison", "me/loss-a-comparison"));
        summary.record("b.csv", FileOutcome::Skipped { reason: "no 'loss' column".to_string() });

        let urls = summary.dashboard_urls();
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].0, "a-comparison");
        assert_eq!(urls[0].1, "https://huggingface.co/spaces/me/loss-a-comparison");
    }
}
