use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use super::config::LauncherConfig;
use crate::core::build::BuildManager;
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::remote::{HttpRemote, RemoteSource};

const APP_DIR_NAME: &str = "yummycraft";
const CONFIG_FILE: &str = "launcher_config.json";
const LOG_FILE: &str = "launcher_logs.txt";
const BUILDS_DIR: &str = "builds";

/// Where the launcher keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    data_dir: PathBuf,
}

impl LauncherPaths {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// `<platform data dir>/yummycraft`, or `./yummycraft` without one.
    pub fn platform_default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(APP_DIR_NAME))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn builds_dir(&self) -> PathBuf {
        self.data_dir.join(BUILDS_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    pub fn ensure(&self) -> LauncherResult<()> {
        for dir in [self.data_dir.clone(), self.builds_dir()] {
            std::fs::create_dir_all(&dir).map_err(LauncherError::io(&dir))?;
        }
        Ok(())
    }
}

/// Everything a host needs to drive builds.
pub struct AppState {
    pub paths: LauncherPaths,
    pub config: LauncherConfig,
    pub build_manager: Arc<BuildManager>,
}

impl AppState {
    /// Create directories, load (or create) the config and wire the engine
    /// against the configured HTTP server.
    pub fn open(paths: LauncherPaths) -> LauncherResult<Self> {
        paths.ensure()?;
        let config = LauncherConfig::load_or_create(&paths.config_path())?;

        let http_client = build_http_client(Duration::from_secs(config.request_timeout_secs))
            .map_err(|e| LauncherError::Other(format!("Failed to build HTTP client: {e}")))?;
        let remote: Arc<dyn RemoteSource> =
            Arc::new(HttpRemote::new(http_client, &config.api_base_url)?);

        let state = Self::with_remote(paths, config, remote);
        info!("Launcher data directory: {:?}", state.paths.data_dir());
        Ok(state)
    }

    /// Wire the engine against any `RemoteSource`.
    pub fn with_remote(
        paths: LauncherPaths,
        config: LauncherConfig,
        remote: Arc<dyn RemoteSource>,
    ) -> Self {
        let downloader = Downloader::new(remote).with_concurrency(config.max_parallel_downloads);
        let build_manager = Arc::new(BuildManager::new(paths.builds_dir(), downloader));

        Self {
            paths,
            config,
            build_manager,
        }
    }

    pub fn save_config(&self) -> LauncherResult<()> {
        self.config.save(&self.paths.config_path())
    }
}
