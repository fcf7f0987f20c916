use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult, TransferFailure};
use crate::core::progress::ProgressSink;
use crate::core::remote::{RemoteBody, RemoteSource};

/// Indeterminate transfers report at most once per this many bytes.
const INDETERMINATE_STEP: u64 = 1024 * 1024;

/// A single file to download with optional SHA-256 for validation.
#[derive(Debug, Clone)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub sha256: Option<String>,
    /// Expected length, used when the server sends no `Content-Length`.
    pub size: Option<u64>,
    /// Shown in progress events.
    pub label: String,
}

/// Streaming downloader that only ever exposes complete files.
///
/// Bytes go to a sibling `.part` file which is renamed onto the destination
/// once the body is complete and its digest checks out.
pub struct Downloader {
    remote: Arc<dyn RemoteSource>,
    /// Maximum number of parallel downloads in a batch.
    concurrency: usize,
}

impl Downloader {
    pub fn new(remote: Arc<dyn RemoteSource>) -> Self {
        Self {
            remote,
            concurrency: 4,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn remote(&self) -> &Arc<dyn RemoteSource> {
        &self.remote
    }

    // ── Single file download ────────────────────────────

    /// Download `entry.url` to `entry.dest`, returning the byte count.
    ///
    /// On any failure the destination is left exactly as it was.
    pub async fn download_file(
        &self,
        entry: &DownloadEntry,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> LauncherResult<u64> {
        if cancel.is_cancelled() {
            return Err(LauncherError::Cancelled);
        }

        if let Some(parent) = entry.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(LauncherError::io(parent))?;
        }

        let body = self.remote.open(&entry.url).await?;
        let part = part_path(&entry.dest);

        let written = match write_body(body, &part, entry, sink, cancel).await {
            Ok(written) => written,
            Err(e) => {
                discard(&part).await;
                return Err(e);
            }
        };

        if let Err(source) = tokio::fs::rename(&part, &entry.dest).await {
            discard(&part).await;
            return Err(LauncherError::Io {
                path: entry.dest.clone(),
                source,
            });
        }

        debug!("Downloaded: {} -> {:?} ({} bytes)", entry.url, entry.dest, written);
        Ok(written)
    }

    // ── Batch concurrent downloads ──────────────────────

    /// Download many files concurrently using `buffer_unordered`.
    ///
    /// Every entry gets a result; one failure never stops the others.
    /// Entries not yet started when `cancel` fires resolve to `Cancelled`.
    pub async fn download_batch(
        &self,
        entries: Vec<DownloadEntry>,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Vec<(DownloadEntry, LauncherResult<u64>)> {
        info!(
            "Starting batch download: {} files, concurrency={}",
            entries.len(),
            self.concurrency
        );

        stream::iter(entries)
            .map(|entry| async move {
                let result = self.download_file(&entry, sink, cancel).await;
                (entry, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

async fn write_body(
    body: RemoteBody,
    part: &Path,
    entry: &DownloadEntry,
    sink: &ProgressSink,
    cancel: &CancellationToken,
) -> LauncherResult<u64> {
    let RemoteBody { total, mut chunks } = body;
    let total = total.or(entry.size.filter(|len| *len > 0));
    let mut throttle = ProgressThrottle::new(total.unwrap_or(0));
    let mut hasher = Sha256::new();
    let mut written = 0u64;

    // Write inside a block so the handle is dropped before the rename
    {
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(LauncherError::io(part))?;

        sink.transfer(0, throttle.total, &entry.label);

        while let Some(chunk) = chunks.next().await {
            if cancel.is_cancelled() {
                return Err(LauncherError::Cancelled);
            }
            let chunk = chunk?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(LauncherError::io(part))?;

            written = written.saturating_add(chunk.len() as u64);
            if throttle.advance(written) {
                sink.transfer(written, throttle.total, &entry.label);
            }
        }

        file.flush().await.map_err(LauncherError::io(part))?;
        file.sync_all().await.map_err(LauncherError::io(part))?;
    }

    if let Some(total) = total {
        if written != total {
            return Err(LauncherError::TransferFailed {
                url: entry.url.clone(),
                failure: TransferFailure::Network(format!(
                    "body ended after {written} of {total} bytes"
                )),
            });
        }
    }

    if let Some(expected) = entry.sha256.as_deref() {
        let actual = hex::encode(hasher.finalize());
        if !actual.eq_ignore_ascii_case(expected) {
            return Err(LauncherError::DigestMismatch {
                path: entry.dest.clone(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    Ok(written)
}

/// `<dir>/.<name>.<uuid>.part`, unique per transfer.
fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4().simple()))
}

async fn discard(part: &Path) {
    if let Err(e) = tokio::fs::remove_file(part).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove partial download {:?}: {}", part, e);
        }
    }
}

/// Decides when a transfer is worth reporting.
#[derive(Debug)]
struct ProgressThrottle {
    total: u64,
    last_percent: u64,
    last_bytes: u64,
}

impl ProgressThrottle {
    fn new(total: u64) -> Self {
        Self {
            total,
            last_percent: 0,
            last_bytes: 0,
        }
    }

    /// True when the integer percentage moved, or, with an unknown total,
    /// when another [`INDETERMINATE_STEP`] arrived.
    fn advance(&mut self, done: u64) -> bool {
        if self.total == 0 {
            if done.saturating_sub(self.last_bytes) >= INDETERMINATE_STEP {
                self.last_bytes = done;
                return true;
            }
            return false;
        }

        let percent = (done.saturating_mul(100) / self.total).min(100);
        if percent > self.last_percent {
            self.last_percent = percent;
            return true;
        }
        false
    }
}
