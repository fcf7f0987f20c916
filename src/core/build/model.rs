use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::mods::ReconcileReport;

/// Name of the per-build metadata file.
pub const RECORD_FILE: &str = "build.json";

/// Subdirectory holding the reconciled mod set.
pub const MODS_DIR: &str = "mods";

/// Where a build is in its lifecycle.
///
/// `Absent -> Bootstrapping -> Reconciling -> Ready`, with `Failed` reached
/// when bootstrap (or the manifest fetch) fails. Mod failures do not leave
/// `Ready`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    /// No directory on disk. Never persisted.
    Absent,
    Bootstrapping,
    Reconciling,
    Ready,
    Failed,
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildState::Absent => write!(f, "absent"),
            BuildState::Bootstrapping => write!(f, "bootstrapping"),
            BuildState::Reconciling => write!(f, "reconciling"),
            BuildState::Ready => write!(f, "ready"),
            BuildState::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted as `<builds>/<name>/build.json`.
///
/// Each build directory holds:
/// - `versions/<id>/`: installed runtime version(s)
/// - `mods/`: exactly the reconciled mod set
/// - `build.json`: this serialized struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub name: String,
    pub version_id: String,
    pub state: BuildState,
    pub created_at: DateTime<Utc>,
    pub last_prepared_at: Option<DateTime<Utc>>,
    /// Mods that failed during the last reconciliation.
    #[serde(default)]
    pub last_failed_mods: Vec<String>,

    #[serde(skip)]
    pub path: PathBuf,
}

impl BuildRecord {
    pub fn new(name: &str, version_id: &str, builds_dir: &std::path::Path) -> Self {
        Self {
            name: name.to_string(),
            version_id: version_id.to_string(),
            state: BuildState::Absent,
            created_at: Utc::now(),
            last_prepared_at: None,
            last_failed_mods: Vec::new(),
            path: builds_dir.join(name),
        }
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.path.join(MODS_DIR)
    }

    pub fn record_path(&self) -> PathBuf {
        self.path.join(RECORD_FILE)
    }

    /// Fold a finished reconciliation into the record.
    pub fn mark_ready(&mut self, report: &ReconcileReport) {
        self.state = BuildState::Ready;
        self.last_prepared_at = Some(Utc::now());
        self.last_failed_mods = report.failures.iter().map(|f| f.name.clone()).collect();
    }
}

/// Result of a successful `prepare`.
#[derive(Debug, Clone, Serialize)]
pub struct PrepareOutcome {
    pub build: String,
    pub version_id: String,
    /// Whether the runtime version had to be downloaded and installed.
    pub bootstrapped: bool,
    pub report: ReconcileReport,
}
