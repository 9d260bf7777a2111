//! Naming of Trackio projects and Hugging Face Spaces.

use std::path::Path;

/// Base URL of Space pages on the Hub.
pub const SPACES_BASE_URL: &str = "https://huggingface.co/spaces";

/// Derive a Trackio project name from a loss file name.
///
/// The extension and every `_loss` are dropped, underscores become dashes and
/// `-comparison` is appended: `tp_debug_fix_loss.csv` becomes
/// `tp-debug-fix-comparison`.
#[must_use]
pub fn project_name_from_file(file_name: &str) -> String {
    let stem = Path::new(file_name).file_stem().map_or_else(|| file_name.into(), |s| s.to_string_lossy());
    let project = stem.replace("_loss", "").replace('_', "-");
    format!("{project}-comparison")
}

/// Space id holding the dashboard of a single project: `<username>/loss-<project>`.
#[must_use]
pub fn project_space_id(username: &str, project: &str) -> String {
    format!("{username}/loss-{}", project.to_lowercase())
}

/// Public page of a Space.
#[must_use]
pub fn space_url(space_id: &str) -> String {
    format!("{SPACES_BASE_URL}/{space_id}")
}

/// Host serving the app of a Space (`owner/name` -> `https://owner-name.hf.space`).
#[must_use]
pub fn space_host(space_id: &str) -> String {
    let subdomain: String = space_id
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '/' | '_' | '.') { '-' } else { c })
        .collect();
    format!("https://{subdomain}.hf.space")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name_from_loss_file() {
        assert_eq!(project_name_from_file("lr_loss.csv"), "lr-comparison");
        assert_eq!(project_name_from_file("batch-size_loss.csv"), "batch-size-comparison");
        assert_eq!(project_name_from_file("tp_debug_fix_loss.csv"), "tp-debug-fix-comparison");
    }

    #[test]
    fn test_project_name_from_plain_csv() {
        assert_eq!(project_name_from_file("spike.csv"), "spike-comparison");
        assert_eq!(project_name_from_file("my_runs.csv"), "my-runs-comparison");
        assert_eq!(project_name_from_file("a_loss_b.csv"), "a-b-comparison");
    }

    #[test]
    fn test_project_name_without_extension() {
        assert_eq!(project_name_from_file("notes"), "notes-comparison");
    }

    #[test]
    fn test_project_space_id_is_lowercased() {
        assert_eq!(project_space_id("tfrere", "LR-loss-comparison"), "tfrere/loss-lr-loss-comparison");
    }

    #[test]
    fn test_space_urls() {
        assert_eq!(space_url("tfrere/loss-experiment"), "https://huggingface.co/spaces/tfrere/loss-experiment");
        assert_eq!(space_host("tfrere/Loss_Experiment.v2"), "https://tfrere-loss-experiment-v2.hf.space");
    }
}
