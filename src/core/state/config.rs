use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::error::{LauncherError, LauncherResult};

pub const DEFAULT_API_BASE_URL: &str = "https://yummycraft.pro/launcher";
const DEFAULT_RAM_MB: u32 = 1024;
const MAX_NICKNAME_LEN: usize = 16;

/// User settings, persisted as `launcher_config.json`.
///
/// Only the fields below are recognized; unknown keys are ignored on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Root of the remote build server.
    pub api_base_url: String,
    pub nickname: String,
    pub ram_megabytes: u32,
    /// Extra JVM flags, whitespace separated.
    pub extra_jvm_args: String,
    pub resolution_width: Option<u32>,
    pub resolution_height: Option<u32>,
    pub java_executable_path: Option<PathBuf>,
    pub max_parallel_downloads: usize,
    pub request_timeout_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            nickname: String::new(),
            ram_megabytes: DEFAULT_RAM_MB,
            extra_jvm_args: String::new(),
            resolution_width: None,
            resolution_height: None,
            java_executable_path: None,
            max_parallel_downloads: 4,
            request_timeout_secs: 120,
        }
    }
}

impl LauncherConfig {
    /// Read the config, writing defaults first if the file does not exist.
    pub fn load_or_create(path: &Path) -> LauncherResult<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            info!("Created default config at {:?}", path);
            return Ok(config);
        }

        let raw = std::fs::read_to_string(path).map_err(LauncherError::io(path))?;
        let config: Self = serde_json::from_str(&raw)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> LauncherResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(LauncherError::io(parent))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(LauncherError::io(path))
    }

    /// Every problem that would stop a launch. Empty means valid.
    pub fn problems(&self, total_ram_mb: u64) -> Vec<String> {
        let mut problems = Vec::new();

        match Url::parse(&self.api_base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => problems.push(format!(
                "api_base_url {:?} is not an http(s) URL",
                self.api_base_url
            )),
        }

        let nickname = self.nickname.trim();
        if nickname.is_empty() {
            problems.push("nickname is required".to_string());
        } else if nickname.chars().count() > MAX_NICKNAME_LEN {
            problems.push(format!(
                "nickname is longer than {MAX_NICKNAME_LEN} characters"
            ));
        } else if !nickname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            problems.push("nickname may only contain letters, digits and '_'".to_string());
        }

        if self.ram_megabytes == 0 {
            problems.push("ram_megabytes must be greater than zero".to_string());
        } else if total_ram_mb > 0 && u64::from(self.ram_megabytes) > total_ram_mb {
            problems.push(format!(
                "ram_megabytes ({}) exceeds physical memory ({} MB)",
                self.ram_megabytes, total_ram_mb
            ));
        }

        match (self.resolution_width, self.resolution_height) {
            (Some(0), _) | (_, Some(0)) => {
                problems.push("resolution dimensions must be greater than zero".to_string())
            }
            (Some(_), None) | (None, Some(_)) => problems
                .push("resolution_width and resolution_height must be set together".to_string()),
            _ => {}
        }

        if self.max_parallel_downloads == 0 {
            problems.push("max_parallel_downloads must be at least 1".to_string());
        }

        problems
    }

    /// Fail with every problem joined, or succeed.
    pub fn validate(&self, total_ram_mb: u64) -> LauncherResult<()> {
        let problems = self.problems(total_ram_mb);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(LauncherError::Config(problems.join("; ")))
        }
    }

    /// `-Xmx` from the RAM setting followed by the user's extra flags.
    pub fn jvm_arguments(&self) -> Vec<String> {
        let mut args = vec![format!("-Xmx{}M", self.ram_megabytes)];
        args.extend(self.extra_jvm_args.split_whitespace().map(str::to_owned));
        args
    }

    pub fn custom_resolution(&self) -> Option<(u32, u32)> {
        match (self.resolution_width, self.resolution_height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    pub fn java_executable(&self) -> PathBuf {
        self.java_executable_path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("java"))
    }
}

/// Physical memory in MB, as reported by the OS.
pub fn total_ram_mb() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.total_memory() / (1024 * 1024)
}
