pub mod manager;
pub mod model;

pub use manager::BuildManager;
pub use model::{BuildRecord, BuildState, PrepareOutcome};
