//! lossreplay - replay CSV loss curves into Trackio dashboards
//!
//! Reads the configured loss files, groups their rows by run and logs every
//! point into a Trackio project, either in one shared Space or in one Space
//! per project.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, shells};
use lossreplay::BackendKind;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::replay::{self, ReplayArgs, Target};

/// Replay training-loss CSV files into Trackio.
///
/// Every mapped file becomes a Trackio project and every distinct
/// `run_name` in it becomes a run.
#[derive(Parser, Debug)]
#[command(name = "lossreplay", author, version, about = "Replay training-loss CSV files into Trackio dashboards")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Extra configuration file, applied over the discovered ones
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the loss CSV files (overrides LOSSREPLAY_DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Where to log: space, local or dry-run (overrides LOSSREPLAY_BACKEND)
    #[arg(short, long, global = true)]
    backend: Option<BackendKind>,

    /// Read and group everything but log nothing (same as --backend dry-run)
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log every project into the shared Space (default)
    Shared {
        /// Space id to log into (defaults to the configured shared Space)
        #[arg(long)]
        space: Option<String>,
    },

    /// Log each project into its own Space, `<username>/loss-<project>`
    Spaces {
        /// Hub user owning the Spaces (defaults to the configured username)
        #[arg(short, long)]
        username: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Handle completion generation
    if let Ok(shell) = std::env::var("LOSSREPLAY_GENERATE_COMPLETIONS") {
        let mut cmd = Args::command();
        match shell.as_str() {
            "bash" => generate(shells::Bash, &mut cmd, "lossreplay", &mut std::io::stdout()),
            "zsh" => generate(shells::Zsh, &mut cmd, "lossreplay", &mut std::io::stdout()),
            "fish" => generate(shells::Fish, &mut cmd, "lossreplay", &mut std::io::stdout()),
            "powershell" => generate(shells::PowerShell, &mut cmd, "lossreplay", &mut std::io::stdout()),
            "elvish" => generate(shells::Elvish, &mut cmd, "lossreplay", &mut std::io::stdout()),
            _ => {
                eprintln!("Unknown shell: {}. Supported: bash, zsh, fish, powershell, elvish", shell);
                return Ok(ExitCode::FAILURE);
            }
        }
        return Ok(ExitCode::SUCCESS);
    }

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration, then let flags win
    let mut config = config::load_config(args.config.as_deref())?;
    if let Some(dir) = args.data_dir {
        config.data_dir = Some(dir);
    }
    if args.dry_run {
        config.backend = Some(BackendKind::DryRun);
    } else if let Some(backend) = args.backend {
        config.backend = Some(backend);
    }

    let target = match args.command.unwrap_or(Command::Shared { space: None }) {
        Command::Shared { space } => Target::Shared { space },
        Command::Spaces { username } => Target::PerProject { username },
    };

    let code = replay::execute(ReplayArgs { config, target }).await?;
    Ok(ExitCode::from(code))
}
