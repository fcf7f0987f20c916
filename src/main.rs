use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use launcher_core::core::progress::DEFAULT_PROGRESS_CAPACITY;
use launcher_core::core::state::total_ram_mb;
use launcher_core::{AppState, LauncherPaths, ProgressEvent, ProgressSink};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(
    name = "launcher-core",
    version,
    about = "Keep a build's runtime version and mods in sync with the server."
)]
struct Cli {
    /// Launcher data directory (default: platform data dir).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Install the required version if missing, then reconcile mods.
    Prepare {
        build: String,
        required_version: String,
    },
    /// Delete a build's directory.
    Destroy { build: String },
    /// List builds on disk.
    List,
    /// Validate the launcher configuration.
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let paths = cli
        .data_dir
        .map(LauncherPaths::new)
        .unwrap_or_else(LauncherPaths::platform_default);
    launcher_core::init_tracing(Some(&paths.log_path()));

    let state = match AppState::open(paths) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to open launcher data: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.cmd {
        Command::Prepare {
            build,
            required_version,
        } => prepare(&state, build, required_version).await,
        Command::Destroy { build } => match state.build_manager.destroy(&build).await {
            Ok(()) => {
                println!("Build '{build}' deleted.");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to delete build '{}': {}", build, e);
                ExitCode::FAILURE
            }
        },
        Command::List => match state.build_manager.list().await {
            Ok(builds) => {
                for record in builds {
                    println!("{}\t{}\t{}", record.name, record.version_id, record.state);
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("Failed to list builds: {}", e);
                ExitCode::FAILURE
            }
        },
        Command::CheckConfig => {
            let problems = state.config.problems(total_ram_mb());
            if problems.is_empty() {
                println!("Configuration OK ({:?})", state.paths.config_path());
                return ExitCode::SUCCESS;
            }
            for problem in problems {
                println!("{problem}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn prepare(state: &AppState, build: String, required_version: String) -> ExitCode {
    if let Err(e) = state.config.validate(total_ram_mb()) {
        warn!("{}", e);
    }

    let (sink, mut events) = ProgressSink::channel(DEFAULT_PROGRESS_CAPACITY);
    let cancel = CancellationToken::new();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping after the current step");
            ctrl_c.cancel();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event {
                ProgressEvent::ModFailed { .. } => eprintln!("{}", event.status_line()),
                _ => println!("{}", event.status_line()),
            }
        }
    });

    let task = state
        .build_manager
        .spawn_prepare(build, required_version, sink, cancel);

    let code = match task.await {
        Ok(Ok(outcome)) if outcome.report.failure_count() > 0 => {
            warn!(
                "{} mod(s) could not be downloaded",
                outcome.report.failure_count()
            );
            ExitCode::SUCCESS
        }
        Ok(Ok(_)) => ExitCode::SUCCESS,
        Ok(Err(_)) => ExitCode::FAILURE,
        Err(e) => {
            error!("Prepare task panicked: {}", e);
            ExitCode::FAILURE
        }
    };

    let _ = printer.await;
    code
}
