pub mod core;

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

pub use crate::core::build::{BuildManager, BuildRecord, BuildState, PrepareOutcome};
pub use crate::core::error::{LauncherError, LauncherResult, TransferFailure};
pub use crate::core::mods::{ModDecision, ReconcileReport};
pub use crate::core::progress::{ProgressEvent, ProgressSink, TransferProgress};
pub use crate::core::remote::{HttpRemote, ModManifest, RemoteSource, VersionDescriptor};
pub use crate::core::state::{AppState, LauncherConfig, LauncherPaths};

/// Install the global `tracing` subscriber.
///
/// Logs go to stderr and, when `log_file` is given, are appended to that
/// file without ANSI colors. `RUST_LOG` wins when set; otherwise the crate
/// logs at debug and everything else at info. Calling this twice is harmless.
pub fn init_tracing(log_file: Option<&Path>) {
    let (file, open_error) = match log_file.map(open_log_file) {
        Some(Ok(file)) => (Some(file), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    };

    let _ = tracing::subscriber::set_global_default(build_subscriber(file));

    if let (Some(path), Some(e)) = (log_file, open_error) {
        tracing::warn!("Logging to stderr only, cannot open {:?}: {}", path, e);
    }
}

fn build_subscriber(log_file: Option<File>) -> impl Subscriber + Send + Sync {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,launcher_core=debug"));

    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}
