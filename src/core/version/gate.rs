// ─── Version gate ───
// Answers "is this runtime version already installed in the build?"
// without touching the network.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

/// Directory (inside a build) holding one folder per installed version.
pub const VERSIONS_DIR: &str = "versions";

/// A version found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledVersion {
    pub id: String,
    pub dir: PathBuf,
}

/// `versions/<id>/` counts as installed when it holds `<id>.json`.
pub async fn installed_versions(build_dir: &Path) -> LauncherResult<Vec<InstalledVersion>> {
    let versions_dir = build_dir.join(VERSIONS_DIR);
    let mut versions = Vec::new();

    let mut entries = match tokio::fs::read_dir(&versions_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
        Err(source) => {
            return Err(LauncherError::Io {
                path: versions_dir,
                source,
            })
        }
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(LauncherError::io(&versions_dir))?
    {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(id) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if dir.join(format!("{id}.json")).is_file() {
            versions.push(InstalledVersion { id, dir });
        }
    }

    versions.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(versions)
}

/// Exact, case-sensitive match against the installed version ids.
pub async fn is_installed(build_dir: &Path, required_version_id: &str) -> LauncherResult<bool> {
    let installed = installed_versions(build_dir).await?;
    let found = installed.iter().any(|v| v.id == required_version_id);
    debug!(
        "Version {} installed in {:?}: {} (have {:?})",
        required_version_id,
        build_dir,
        found,
        installed.iter().map(|v| v.id.as_str()).collect::<Vec<_>>()
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn install_version(build: &Path, id: &str) {
        let dir = build.join(VERSIONS_DIR).join(id);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{id}.json")), "{}").unwrap();
    }

    #[tokio::test]
    async fn missing_build_has_nothing_installed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_installed(&dir.path().join("nope"), "1.20.1").await.unwrap());
    }

    #[tokio::test]
    async fn exact_match_only() {
        let dir = tempfile::tempdir().unwrap();
        install_version(dir.path(), "fabric-loader-0.15.11-1.20.1");

        assert!(is_installed(dir.path(), "fabric-loader-0.15.11-1.20.1")
            .await
            .unwrap());
        assert!(!is_installed(dir.path(), "Fabric-Loader-0.15.11-1.20.1")
            .await
            .unwrap());
        assert!(!is_installed(dir.path(), "fabric-loader-0.15.11-1.20.1 ")
            .await
            .unwrap());
        assert!(!is_installed(dir.path(), "1.20.1").await.unwrap());
    }

    #[tokio::test]
    async fn directory_without_descriptor_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(VERSIONS_DIR).join("1.20.1")).unwrap();
        install_version(dir.path(), "1.19.4");

        let ids: Vec<String> = installed_versions(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, vec!["1.19.4".to_string()]);
    }
}
