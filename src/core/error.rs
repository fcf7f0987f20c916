use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why a single transfer did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferFailure {
    /// The server answered with a non-2xx status.
    Status(u16),
    /// The connection failed before or during the body.
    Network(String),
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferFailure::Status(code) => write!(f, "HTTP {code}"),
            TransferFailure::Network(reason) => write!(f, "network error: {reason}"),
        }
    }
}

/// Central error type for the launcher core.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Remote ──────────────────────────────────────────
    #[error("Remote unavailable at {url}: {reason}")]
    RemoteUnavailable { url: String, reason: String },

    #[error("Transfer failed for {url}: {failure}")]
    TransferFailed { url: String, failure: TransferFailure },

    // ── Integrity ───────────────────────────────────────
    #[error("SHA-256 mismatch for {path:?}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // ── Archive ─────────────────────────────────────────
    #[error("Corrupt archive {path:?}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Build ───────────────────────────────────────────
    #[error("Build not found: {0}")]
    BuildNotFound(String),

    #[error("Invalid build name: {0:?}")]
    InvalidBuildName(String),

    #[error("Build '{0}' already has an operation in flight")]
    BuildBusy(String),

    #[error("Server offers version {offered} for build '{build}', but {required} is required")]
    VersionMismatch {
        build: String,
        required: String,
        offered: String,
    },

    #[error("Version {version} is still not installed in build '{build}' after unpacking")]
    VersionMissing { build: String, version: String },

    #[error("Operation cancelled")]
    Cancelled,

    // ── Config ──────────────────────────────────────────
    #[error("Invalid configuration: {0}")]
    Config(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

impl LauncherError {
    /// Attach a path to an IO error, for use with `map_err`.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LauncherError {
        let path = path.into();
        move |source| LauncherError::Io { path, source }
    }

    /// Whether the caller may retry the same operation and expect a different result.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LauncherError::RemoteUnavailable { .. }
                | LauncherError::TransferFailed {
                    failure: TransferFailure::Network(_),
                    ..
                }
                | LauncherError::BuildBusy(_)
        )
    }
}
