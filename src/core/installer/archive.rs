use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::core::error::{LauncherError, LauncherResult};

/// Unpack `archive_path` (zip) into `destination`, then delete the archive.
///
/// Entries are extracted into a staging directory first and renamed into
/// place only once the whole archive has been read, so a corrupt archive
/// never leaves half of its files in the build. Existing files are
/// overwritten. On failure the archive is kept for inspection.
#[instrument(skip_all, fields(archive = %archive_path.display()))]
pub async fn install(archive_path: &Path, destination: &Path) -> LauncherResult<()> {
    tokio::fs::create_dir_all(destination)
        .await
        .map_err(LauncherError::io(destination))?;

    let staging = destination.join(format!(".staging-{}", Uuid::new_v4().simple()));
    let archive = archive_path.to_path_buf();
    let dest = destination.to_path_buf();
    let staged = staging.clone();

    let result = tokio::task::spawn_blocking(move || -> LauncherResult<usize> {
        let count = extract::extract_zip_file(&archive, &staged)?;
        extract::promote(&staged, &dest)?;
        Ok(count)
    })
    .await
    .map_err(|e| LauncherError::Other(format!("Task join error: {e}")))?;

    if staging.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(&staging).await {
            warn!("Could not remove staging directory {:?}: {}", staging, e);
        }
    }

    let count = result?;
    info!("Installed {} entries into {:?}", count, destination);

    tokio::fs::remove_file(archive_path)
        .await
        .map_err(LauncherError::io(archive_path))?;
    debug!("Removed archive {:?}", archive_path);
    Ok(())
}

mod extract {
    use super::*;

    use std::fs::{self, File};

    fn corrupt(archive: &Path, reason: impl ToString) -> LauncherError {
        LauncherError::CorruptArchive {
            path: archive.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Extract every entry below `root`. Returns the number of files written.
    pub fn extract_zip_file(zip_path: &Path, root: &Path) -> LauncherResult<usize> {
        let zip_file = File::open(zip_path).map_err(LauncherError::io(zip_path))?;
        let mut archive = zip::ZipArchive::new(zip_file).map_err(|e| corrupt(zip_path, e))?;

        fs::create_dir_all(root).map_err(LauncherError::io(root))?;

        let mut files = 0;
        for index in 0..archive.len() {
            let mut zipped = archive.by_index(index).map_err(|e| corrupt(zip_path, e))?;

            let rel_path = zipped.enclosed_name().ok_or_else(|| {
                corrupt(zip_path, format!("entry {:?} escapes the archive", zipped.name()))
            })?;
            let out_path = root.join(rel_path);

            if zipped.is_dir() {
                fs::create_dir_all(&out_path).map_err(LauncherError::io(&out_path))?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent).map_err(LauncherError::io(parent))?;
            }

            let mut out = File::create(&out_path).map_err(LauncherError::io(&out_path))?;
            std::io::copy(&mut zipped, &mut out)
                .map_err(|e| corrupt(zip_path, format!("{}: {e}", zipped.name())))?;

            #[cfg(unix)]
            if let Some(mode) = zipped.unix_mode() {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o777))
                    .map_err(LauncherError::io(&out_path))?;
            }

            files += 1;
        }

        Ok(files)
    }

    /// Move everything under `staging` to the same relative path under `dest`.
    pub fn promote(staging: &Path, dest: &Path) -> LauncherResult<()> {
        let mut pending: Vec<PathBuf> = vec![PathBuf::new()];

        while let Some(rel) = pending.pop() {
            let from_dir = staging.join(&rel);
            for entry in fs::read_dir(&from_dir).map_err(LauncherError::io(&from_dir))? {
                let entry = entry.map_err(LauncherError::io(&from_dir))?;
                let rel_path = rel.join(entry.file_name());
                let target = dest.join(&rel_path);
                let file_type = entry.file_type().map_err(LauncherError::io(entry.path()))?;

                if file_type.is_dir() {
                    fs::create_dir_all(&target).map_err(LauncherError::io(&target))?;
                    pending.push(rel_path);
                } else {
                    fs::rename(entry.path(), &target).map_err(LauncherError::io(&target))?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::version_archive;

    #[tokio::test]
    async fn installs_and_removes_archive() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("base.zip");
        std::fs::write(
            &archive,
            version_archive("1.20.1", &[("libraries/lib.jar", b"lib")]),
        )
        .unwrap();
        let build = dir.path().join("build");

        install(&archive, &build).await.unwrap();

        assert!(build.join("versions/1.20.1/1.20.1.json").is_file());
        assert_eq!(std::fs::read(build.join("libraries/lib.jar")).unwrap(), b"lib");
        assert!(!archive.exists());
        let leftovers: Vec<_> = std::fs::read_dir(&build)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .filter(|n| n.starts_with(".staging-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn overwrites_existing_files_and_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("build");
        std::fs::create_dir_all(build.join("libraries")).unwrap();
        std::fs::create_dir_all(build.join("mods")).unwrap();
        std::fs::write(build.join("libraries/lib.jar"), b"stale").unwrap();
        std::fs::write(build.join("mods/a.jar"), b"mod").unwrap();

        let archive = dir.path().join("base.zip");
        std::fs::write(
            &archive,
            version_archive("1.20.1", &[("libraries/lib.jar", b"fresh")]),
        )
        .unwrap();

        install(&archive, &build).await.unwrap();

        assert_eq!(std::fs::read(build.join("libraries/lib.jar")).unwrap(), b"fresh");
        assert_eq!(std::fs::read(build.join("mods/a.jar")).unwrap(), b"mod");
    }

    #[tokio::test]
    async fn corrupt_archive_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("base.zip");
        std::fs::write(&archive, b"this is not a zip file").unwrap();
        let build = dir.path().join("build");

        let err = install(&archive, &build).await.unwrap_err();

        assert!(matches!(err, LauncherError::CorruptArchive { .. }));
        assert!(archive.exists());
        assert_eq!(std::fs::read_dir(&build).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn truncated_archive_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = version_archive("1.20.1", &[("big.bin", &[5u8; 4096])]);
        bytes.truncate(bytes.len() / 2);
        let archive = dir.path().join("base.zip");
        std::fs::write(&archive, bytes).unwrap();

        let err = install(&archive, &dir.path().join("build")).await.unwrap_err();
        assert!(matches!(err, LauncherError::CorruptArchive { .. }));
        assert!(archive.exists());
    }
}
