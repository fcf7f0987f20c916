use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::model::{BuildRecord, BuildState, PrepareOutcome, RECORD_FILE};
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::installer;
use crate::core::mods::Reconciler;
use crate::core::progress::{ProgressEvent, ProgressSink};
use crate::core::remote::{is_plain_file_name, VersionDescriptor};
use crate::core::version::gate;

/// Names of builds with a `prepare` or `destroy` in flight.
type InFlight = Arc<Mutex<HashSet<String>>>;

/// Held for the duration of one operation on a build.
struct BuildLease {
    name: String,
    in_flight: InFlight,
}

impl Drop for BuildLease {
    fn drop(&mut self) {
        let mut names = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        names.remove(&self.name);
    }
}

/// Owns the builds root and drives bootstrap, reconciliation and removal.
pub struct BuildManager {
    /// Root directory where all builds live.
    builds_dir: PathBuf,
    downloader: Downloader,
    in_flight: InFlight,
}

impl BuildManager {
    pub fn new(builds_dir: PathBuf, downloader: Downloader) -> Self {
        Self {
            builds_dir,
            downloader,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn builds_dir(&self) -> &Path {
        &self.builds_dir
    }

    pub fn build_dir(&self, name: &str) -> PathBuf {
        self.builds_dir.join(name)
    }

    fn claim(&self, name: &str) -> LauncherResult<BuildLease> {
        if !is_plain_file_name(name) || name.starts_with('.') {
            return Err(LauncherError::InvalidBuildName(name.to_string()));
        }

        let mut names = self.in_flight.lock().unwrap_or_else(|p| p.into_inner());
        if !names.insert(name.to_string()) {
            return Err(LauncherError::BuildBusy(name.to_string()));
        }
        Ok(BuildLease {
            name: name.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    // ── Prepare ─────────────────────────────────────────

    /// Make `name` launchable: install `required_version` if it is missing,
    /// then reconcile the mod set.
    ///
    /// Errors come only from the version step, the manifest fetch or
    /// cancellation. Mod failures are listed in the outcome's report.
    #[instrument(skip(self, sink, cancel))]
    pub async fn prepare(
        &self,
        name: &str,
        required_version: &str,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> LauncherResult<PrepareOutcome> {
        let _lease = self.claim(name)?;

        let result = self.run_prepare(name, required_version, sink, cancel).await;
        match &result {
            Ok(outcome) => {
                let summary = format!("Build {} is ready: {}", name, outcome.report.summary());
                info!("{}", summary);
                sink.emit(ProgressEvent::Finished {
                    success: true,
                    summary,
                });
            }
            Err(e) => {
                let summary = format!("Build {} could not be prepared: {}", name, e);
                error!("{}", summary);
                sink.emit(ProgressEvent::Finished {
                    success: false,
                    summary,
                });
            }
        }
        result
    }

    /// Run [`prepare`](Self::prepare) on the tokio scheduler.
    pub fn spawn_prepare(
        self: &Arc<Self>,
        name: String,
        required_version: String,
        sink: ProgressSink,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<LauncherResult<PrepareOutcome>> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager
                .prepare(&name, &required_version, &sink, &cancel)
                .await
        })
    }

    async fn run_prepare(
        &self,
        name: &str,
        required_version: &str,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> LauncherResult<PrepareOutcome> {
        let build_dir = self.build_dir(name);
        let mut record = match self.load(name).await {
            Ok(record) => record,
            Err(_) => BuildRecord::new(name, required_version, &self.builds_dir),
        };
        record.version_id = required_version.to_string();

        let bootstrapped = if gate::is_installed(&build_dir, required_version).await? {
            info!("Required version {} already installed", required_version);
            sink.status(format!(
                "Required version {required_version} is already installed."
            ));
            false
        } else {
            info!("Required version {} not found, bootstrapping", required_version);
            sink.status(format!(
                "Required version {required_version} not found. Starting download..."
            ));

            // Nothing is written for the build until the server has named
            // the right version.
            let descriptor = self.resolve_version(name, required_version).await?;
            self.set_state(&mut record, BuildState::Bootstrapping).await?;

            if let Err(e) = self
                .bootstrap(name, &build_dir, &descriptor, sink, cancel)
                .await
            {
                self.mark_failed(&mut record).await;
                return Err(e);
            }
            true
        };

        if cancel.is_cancelled() {
            self.mark_failed(&mut record).await;
            return Err(LauncherError::Cancelled);
        }

        self.set_state(&mut record, BuildState::Reconciling).await?;
        let report = match Reconciler::new(&self.downloader)
            .reconcile(name, &record.mods_dir(), sink, cancel)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                self.mark_failed(&mut record).await;
                return Err(e);
            }
        };

        record.mark_ready(&report);
        self.save(&record).await?;

        Ok(PrepareOutcome {
            build: name.to_string(),
            version_id: required_version.to_string(),
            bootstrapped,
            report,
        })
    }

    /// Fetch the descriptor for `name` and check it offers `required_version`.
    async fn resolve_version(
        &self,
        name: &str,
        required_version: &str,
    ) -> LauncherResult<VersionDescriptor> {
        let descriptor = self
            .downloader
            .remote()
            .fetch_version_descriptor(name)
            .await?;
        if descriptor.id != required_version {
            return Err(LauncherError::VersionMismatch {
                build: name.to_string(),
                required: required_version.to_string(),
                offered: descriptor.id,
            });
        }
        Ok(descriptor)
    }

    /// Download the version archive into the build and unpack it.
    ///
    /// Succeeds only if the gate sees the version afterwards.
    async fn bootstrap(
        &self,
        name: &str,
        build_dir: &Path,
        descriptor: &VersionDescriptor,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        let archive = build_dir.join(format!(".bootstrap-{}.zip", Uuid::new_v4().simple()));
        let entry = DownloadEntry {
            url: self.downloader.remote().archive_url(descriptor)?,
            dest: archive.clone(),
            sha256: descriptor.sha256.clone(),
            size: descriptor.size,
            label: format!("version {}", descriptor.id),
        };

        self.downloader.download_file(&entry, sink, cancel).await?;
        sink.status("Download complete.");

        if cancel.is_cancelled() {
            if let Err(e) = tokio::fs::remove_file(&archive).await {
                warn!("Could not remove archive {:?}: {}", archive, e);
            }
            return Err(LauncherError::Cancelled);
        }

        sink.status("Unpacking files...");
        installer::install(&archive, build_dir).await?;

        if !gate::is_installed(build_dir, &descriptor.id).await? {
            return Err(LauncherError::VersionMissing {
                build: name.to_string(),
                version: descriptor.id.clone(),
            });
        }
        sink.status(format!("Version {} installed.", descriptor.id));
        Ok(())
    }

    // ── Destroy ─────────────────────────────────────────

    /// Remove the build's whole directory. A missing build is not an error.
    #[instrument(skip(self))]
    pub async fn destroy(&self, name: &str) -> LauncherResult<()> {
        let _lease = self.claim(name)?;
        let build_dir = self.build_dir(name);

        match tokio::fs::remove_dir_all(&build_dir).await {
            Ok(()) => {
                info!("Deleted build '{}'", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Build '{}' does not exist, nothing to delete", name);
                Ok(())
            }
            Err(source) => Err(LauncherError::Io {
                path: build_dir,
                source,
            }),
        }
    }

    // ── Records ─────────────────────────────────────────

    /// Current lifecycle state as seen on disk.
    pub async fn state(&self, name: &str) -> LauncherResult<BuildState> {
        if !self.build_dir(name).exists() {
            return Ok(BuildState::Absent);
        }
        match self.load(name).await {
            Ok(record) => Ok(record.state),
            Err(LauncherError::BuildNotFound(_)) => Ok(BuildState::Absent),
            Err(e) => Err(e),
        }
    }

    /// Load a single build record by name.
    pub async fn load(&self, name: &str) -> LauncherResult<BuildRecord> {
        let record_path = self.build_dir(name).join(RECORD_FILE);
        let json = match tokio::fs::read_to_string(&record_path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LauncherError::BuildNotFound(name.to_string()));
            }
            Err(source) => {
                return Err(LauncherError::Io {
                    path: record_path,
                    source,
                })
            }
        };

        let mut record: BuildRecord = serde_json::from_str(&json)?;
        record.path = self.build_dir(name);
        Ok(record)
    }

    /// List all builds that carry a record.
    pub async fn list(&self) -> LauncherResult<Vec<BuildRecord>> {
        let mut builds = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.builds_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(builds),
            Err(source) => {
                return Err(LauncherError::Io {
                    path: self.builds_dir.clone(),
                    source,
                })
            }
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(LauncherError::io(&self.builds_dir))?
        {
            if !entry.path().is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            match self.load(&name).await {
                Ok(record) => builds.push(record),
                Err(LauncherError::BuildNotFound(_)) => {}
                Err(e) => warn!("Skipping build {:?}: {}", name, e),
            }
        }

        builds.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(builds)
    }

    /// Persist the record through a temp file so readers never see half of it.
    async fn save(&self, record: &BuildRecord) -> LauncherResult<()> {
        tokio::fs::create_dir_all(&record.path)
            .await
            .map_err(LauncherError::io(&record.path))?;

        let json = serde_json::to_string_pretty(record)?;
        let record_path = record.record_path();
        let tmp_path = record_path.with_extension("json.tmp");

        tokio::fs::write(&tmp_path, json)
            .await
            .map_err(LauncherError::io(&tmp_path))?;
        tokio::fs::rename(&tmp_path, &record_path)
            .await
            .map_err(LauncherError::io(&record_path))?;
        Ok(())
    }

    async fn set_state(&self, record: &mut BuildRecord, state: BuildState) -> LauncherResult<()> {
        record.state = state;
        self.save(record).await
    }

    /// Best effort: the caller already has the error that caused this.
    async fn mark_failed(&self, record: &mut BuildRecord) {
        if let Err(e) = self.set_state(record, BuildState::Failed).await {
            warn!("Could not record failure for {}: {}", record.name, e);
        }
    }
}
