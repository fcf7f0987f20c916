pub mod plan;
pub mod reconciler;

pub use plan::{plan, DownloadReason, ModDecision};
pub use reconciler::{ModAction, ModFailure, ReconcileReport, Reconciler};
