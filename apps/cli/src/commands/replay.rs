//! The replay command, in shared or per-project Space mode.

use anyhow::{Context, Result, bail};
use colored::Colorize;
use comfy_table::{Cell, Color as ComfyColor, Table};
use lossreplay::config::hf_token_from_env;
use lossreplay::{
    BackendKind, DryRunTracker, FileOutcome, HubClient, LocalTracker, ReplayConfig, ReplayOptions, ReplaySummary,
    Replayer, SpaceMode, SpaceTracker, StdoutProgressSink, Tracker, plan_jobs,
};

/// Which Space layout to replay into.
#[derive(Debug, Clone)]
pub enum Target {
    Shared { space: Option<String> },
    PerProject { username: Option<String> },
}

#[derive(Debug)]
pub struct ReplayArgs {
    pub config: ReplayConfig,
    pub target: Target,
}

/// Execute the replay and return the process exit code.
pub async fn execute(args: ReplayArgs) -> Result<u8> {
    let ReplayArgs { mut config, target } = args;

    let mode = match target {
        Target::Shared { space } => {
            if space.is_some() {
                config.shared_space = space;
            }
            config.validate().context("Invalid shared Space")?;
            SpaceMode::Shared { space_id: config.shared_space().to_string() }
        }
        Target::PerProject { username } => {
            if username.is_some() {
                config.username = username;
            }
            SpaceMode::PerProject { username: config.username().to_string() }
        }
    };

    let backend = config.backend();
    let token = hf_token_from_env();
    let tracker = build_tracker(&config, backend, token.clone())?;

    print_header(&mode, backend, &config);

    let jobs = plan_jobs(&config, &mode);
    tracing::debug!(files = jobs.len(), tracker = tracker.id(), "planned replay");

    let sink = StdoutProgressSink;
    let options = ReplayOptions { progress_every: config.progress_every(), ..Default::default() };
    let hub = HubClient::new(config.hub_endpoint(), token);

    let mut replayer = Replayer::new(&*tracker, &sink).with_options(options);
    if matches!(mode, SpaceMode::PerProject { .. }) && backend != BackendKind::DryRun {
        replayer = replayer.with_directory(&hub);
    }

    let summary = replayer.replay_all(mode, &jobs).await;
    print_summary(&summary);

    Ok(u8::try_from(summary.exit_code()).unwrap_or(1))
}

fn build_tracker(config: &ReplayConfig, backend: BackendKind, token: Option<String>) -> Result<Box<dyn Tracker>> {
    Ok(match backend {
        BackendKind::DryRun => Box::new(DryRunTracker::new()),
        BackendKind::Local => Box::new(LocalTracker::new(config.trackio_dir())),
        BackendKind::Space => {
            let Some(token) = token else {
                bail!("HF_TOKEN is not set; it is required to log into a Space (use --backend local to log locally)");
            };
            Box::new(
                SpaceTracker::new(LocalTracker::new(config.trackio_dir()), token)
                    .with_batch_size(config.batch_size()),
            )
        }
    })
}

fn print_header(mode: &SpaceMode, backend: BackendKind, config: &ReplayConfig) {
    let rule = "=".repeat(60);
    println!("{}", "🎯 Logging every loss file to Trackio".bold().cyan());
    println!("{rule}");
    match mode {
        SpaceMode::Shared { space_id } => println!("🔄 One Trackio project per loss file, in Space {space_id}"),
        SpaceMode::PerProject { username } => println!("🔄 One Trackio Space per loss project, owned by {username}"),
    }
    println!("  Backend:  {}", backend.to_string().cyan());
    println!("  Data dir: {}", config.data_dir().display().to_string().cyan());
    if backend != BackendKind::DryRun {
        println!("  Store:    {}", config.trackio_dir().display().to_string().cyan());
    }
    println!("{rule}");
}

fn print_summary(summary: &ReplaySummary) {
    let rule = "=".repeat(60);
    println!("\n{rule}");
    println!("{}", "📊 SUMMARY".bold());
    println!("{rule}");

    let mut table = Table::new();
    table.set_header(vec!["", "File", "Project", "Runs", "Points", "Space"]);
    for (file, outcome) in &summary.outcomes {
        let row = match outcome {
            FileOutcome::Succeeded { project, runs, points, space_id } => vec![
                Cell::new("✅").fg(ComfyColor::Green),
                Cell::new(file),
                Cell::new(project),
                Cell::new(runs),
                Cell::new(points),
                Cell::new(space_id),
            ],
            FileOutcome::Missing => vec![
                Cell::new("⚠️").fg(ComfyColor::Yellow),
                Cell::new(file),
                Cell::new("file not found").fg(ComfyColor::Yellow),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ],
            FileOutcome::Skipped { reason } => vec![
                Cell::new("❌").fg(ComfyColor::Red),
                Cell::new(file),
                Cell::new(reason).fg(ComfyColor::Red),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ],
            FileOutcome::Failed { error } => vec![
                Cell::new("❌").fg(ComfyColor::Red),
                Cell::new(file),
                Cell::new(error).fg(ComfyColor::Red),
                Cell::new(""),
                Cell::new(""),
                Cell::new(""),
            ],
        };
        table.add_row(row);
    }
    println!("{table}");

    let line = format!("{}/{} files logged successfully!", summary.success_count(), summary.total_count());
    if summary.all_succeeded() {
        println!("\n🎉 {}", line.green());
    } else {
        println!("\n⚠️ {}", line.yellow());
    }

    match &summary.mode {
        SpaceMode::Shared { .. } => {
            for (_, url) in summary.dashboard_urls() {
                println!("📊 Dashboard: {}", url.cyan());
            }
        }
        SpaceMode::PerProject { .. } => {
            let urls = summary.dashboard_urls();
            if !urls.is_empty() {
                println!("\n🌐 Space URLs:");
            }
            for (project, url) in urls {
                println!("  - {project}: {}", url.cyan());
            }
        }
    }
}
