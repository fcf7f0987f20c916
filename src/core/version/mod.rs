pub mod gate;

pub use gate::{installed_versions, is_installed, InstalledVersion, VERSIONS_DIR};
