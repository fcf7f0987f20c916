//! Content digests for local files.
//!
//! Digests are lowercase hex SHA-256, the same form the remote manifest uses.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

const READ_CHUNK: usize = 64 * 1024;

/// Hash a file's full contents.
///
/// The handle is dropped as soon as the last chunk is read.
pub async fn sha256_file(path: &Path) -> LauncherResult<String> {
    let mut hasher = Sha256::new();
    {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(LauncherError::io(path))?;
        let mut buf = vec![0u8; READ_CHUNK];
        loop {
            let read = file.read(&mut buf).await.map_err(LauncherError::io(path))?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash an in-memory buffer.
pub fn sha256_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// File name to digest for every file in a mods directory.
///
/// `None` marks a file that is present but could not be hashed.
pub type Inventory = BTreeMap<String, Option<String>>;

/// Hash every file directly inside `dir`, keyed by file name.
///
/// Symlinks are followed. Files that cannot be read (dangling links included)
/// are listed without a digest, so reconciliation replaces or removes them.
/// Names that are not UTF-8 can never appear in a manifest and are skipped
/// with a warning. A missing directory is an empty inventory.
pub async fn local_inventory(dir: &Path) -> LauncherResult<Inventory> {
    inventory_with(dir, |path| async move { sha256_file(&path).await }).await
}

async fn inventory_with<F, Fut>(dir: &Path, hash: F) -> LauncherResult<Inventory>
where
    F: Fn(PathBuf) -> Fut,
    Fut: Future<Output = LauncherResult<String>>,
{
    let mut inventory = Inventory::new();

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(inventory),
        Err(source) => {
            return Err(LauncherError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
    };

    while let Some(entry) = entries.next_entry().await.map_err(LauncherError::io(dir))? {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!("Skipping non UTF-8 file name {:?}", path);
            continue;
        };

        let is_file = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.is_file(),
            // Dangling symlink
            Err(_) => entry
                .file_type()
                .await
                .map(|t| t.is_symlink())
                .unwrap_or(false),
        };
        if !is_file {
            continue;
        }

        match hash(path.clone()).await {
            Ok(digest) => {
                debug!("{} -> {}", name, digest);
                inventory.insert(name, Some(digest));
            }
            Err(e) => {
                warn!("Cannot hash {:?}, treating as absent: {}", path, e);
                inventory.insert(name, None);
            }
        }
    }

    Ok(inventory)
}
