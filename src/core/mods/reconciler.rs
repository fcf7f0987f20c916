use std::path::Path;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::hasher;
use crate::core::progress::{ProgressEvent, ProgressSink};

use super::plan::{plan, DownloadReason, ModDecision};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModAction {
    Download,
    Delete,
}

/// One mod that could not be brought in line with the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModFailure {
    pub name: String,
    pub action: ModAction,
    pub reason: String,
}

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub kept: Vec<String>,
    pub downloaded: Vec<String>,
    pub deleted: Vec<String>,
    pub failures: Vec<ModFailure>,
}

impl ReconcileReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Nothing was downloaded or deleted.
    pub fn is_noop(&self) -> bool {
        self.downloaded.is_empty() && self.deleted.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} kept, {} downloaded, {} removed, {} failed",
            self.kept.len(),
            self.downloaded.len(),
            self.deleted.len(),
            self.failures.len()
        )
    }
}

/// Converges a build's `mods/` directory onto the remote manifest.
pub struct Reconciler<'a> {
    downloader: &'a Downloader,
}

impl<'a> Reconciler<'a> {
    pub fn new(downloader: &'a Downloader) -> Self {
        Self { downloader }
    }

    /// Fetch the manifest, then delete stale mods and download missing or
    /// outdated ones.
    ///
    /// Only a manifest failure or cancellation is an `Err`; individual mod
    /// failures end up in [`ReconcileReport::failures`].
    #[instrument(skip(self, mods_dir, sink, cancel))]
    pub async fn reconcile(
        &self,
        build: &str,
        mods_dir: &Path,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> LauncherResult<ReconcileReport> {
        let remote = self.downloader.remote();

        // Nothing may be deleted on the strength of a partial answer.
        let manifest = remote.fetch_mod_manifest(build).await?;

        tokio::fs::create_dir_all(mods_dir)
            .await
            .map_err(LauncherError::io(mods_dir))?;

        let local = hasher::local_inventory(mods_dir).await?;
        let decisions = plan(&local, &manifest);
        info!(
            "Reconciling {}: {} local, {} remote, {} decisions",
            build,
            local.len(),
            manifest.len(),
            decisions.len()
        );

        let mut report = ReconcileReport::default();
        let mut downloads = Vec::new();

        for decision in decisions {
            match decision {
                ModDecision::Delete { name } => {
                    if cancel.is_cancelled() {
                        return Err(LauncherError::Cancelled);
                    }
                    self.delete_mod(mods_dir, name, sink, &mut report).await;
                }
                ModDecision::Keep { name } => report.kept.push(name),
                ModDecision::Download { name, reason } => {
                    let message = match reason {
                        DownloadReason::Missing => {
                            format!("Mod {name} is missing locally. Downloading...")
                        }
                        DownloadReason::Outdated => {
                            format!("Mod {name} does not match the server. Updating...")
                        }
                    };
                    info!("{}", message);
                    sink.status(message);

                    let url = remote.mod_url(build, &name)?;
                    downloads.push(DownloadEntry {
                        url,
                        dest: mods_dir.join(&name),
                        sha256: manifest.get(&name).map(str::to_owned),
                        size: None,
                        label: name,
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        let results = self.downloader.download_batch(downloads, sink, cancel).await;
        for (entry, result) in results {
            match result {
                Ok(_) => {
                    info!("Mod {} downloaded", entry.label);
                    sink.status(format!("Mod {} downloaded", entry.label));
                    report.downloaded.push(entry.label);
                }
                Err(LauncherError::Cancelled) => {}
                Err(e) => {
                    warn!("Failed to download mod {}: {}", entry.label, e);
                    sink.emit(ProgressEvent::ModFailed {
                        name: entry.label.clone(),
                        reason: e.to_string(),
                    });
                    report.failures.push(ModFailure {
                        name: entry.label,
                        action: ModAction::Download,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        report.downloaded.sort();
        report.failures.sort_by(|a, b| a.name.cmp(&b.name));
        info!("Reconciled {}: {}", build, report.summary());
        Ok(report)
    }

    async fn delete_mod(
        &self,
        mods_dir: &Path,
        name: String,
        sink: &ProgressSink,
        report: &mut ReconcileReport,
    ) {
        sink.status(format!("Removing mod: {name}"));
        let path = mods_dir.join(&name);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Removed mod: {}", name);
                report.deleted.push(name);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                report.deleted.push(name);
            }
            Err(e) => {
                warn!("Cannot remove mod {:?}: {}", path, e);
                sink.emit(ProgressEvent::ModFailed {
                    name: name.clone(),
                    reason: e.to_string(),
                });
                report.failures.push(ModFailure {
                    name,
                    action: ModAction::Delete,
                    reason: e.to_string(),
                });
            }
        }
    }
}
