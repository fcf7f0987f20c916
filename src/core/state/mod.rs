pub mod app_state;
pub mod config;

pub use app_state::{AppState, LauncherPaths};
pub use config::{total_ram_mb, LauncherConfig};
