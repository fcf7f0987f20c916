// ─── Progress reporting ───
// Events flow from the engine to a single consumer (GUI, CLI) over a bounded
// channel. Delivery is best-effort: the engine never waits on the consumer.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

/// Default capacity for channels created with [`ProgressSink::channel`].
pub const DEFAULT_PROGRESS_CAPACITY: usize = 256;

/// A snapshot of one in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub bytes_done: u64,
    /// 0 when the server did not announce a length.
    pub bytes_total: u64,
    pub label: String,
}

impl TransferProgress {
    /// Integer percentage, or `None` when the total is unknown.
    pub fn percent(&self) -> Option<u8> {
        if self.bytes_total == 0 {
            return None;
        }
        let pct = self.bytes_done.saturating_mul(100) / self.bytes_total;
        Some(pct.min(100) as u8)
    }

    pub fn is_indeterminate(&self) -> bool {
        self.bytes_total == 0
    }
}

/// Everything the engine tells its observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProgressEvent {
    Transfer(TransferProgress),
    /// Human-readable milestone.
    Status { message: String },
    /// A single mod could not be brought up to date.
    ModFailed { name: String, reason: String },
    /// Terminal summary of a `prepare` call.
    Finished { success: bool, summary: String },
}

impl ProgressEvent {
    /// Render the event as the status line a user would see.
    pub fn status_line(&self) -> String {
        match self {
            ProgressEvent::Transfer(progress) => match progress.percent() {
                Some(pct) => format!("Downloading {}: {}%", progress.label, pct),
                None => format!(
                    "Downloading {}: {} KiB",
                    progress.label,
                    progress.bytes_done / 1024
                ),
            },
            ProgressEvent::Status { message } => message.clone(),
            ProgressEvent::ModFailed { name, reason } => {
                format!("Could not download {name}: {reason}")
            }
            ProgressEvent::Finished { summary, .. } => summary.clone(),
        }
    }
}

/// Sending half handed into `prepare`/`reconcile`.
///
/// Cloning is cheap; all clones feed the same consumer.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::Sender<ProgressEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink that discards every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Create a bounded channel and the sink feeding it.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Deliver without waiting. Full or closed channels drop the event.
    pub fn emit(&self, event: ProgressEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(err) = tx.try_send(event) {
            match err {
                mpsc::error::TrySendError::Full(dropped) => {
                    debug!("Progress consumer lagging, dropped: {:?}", dropped);
                }
                mpsc::error::TrySendError::Closed(_) => {}
            }
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Status {
            message: message.into(),
        });
    }

    pub fn transfer(&self, bytes_done: u64, bytes_total: u64, label: &str) {
        self.emit(ProgressEvent::Transfer(TransferProgress {
            bytes_done,
            bytes_total,
            label: label.to_string(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_none_for_unknown_total() {
        let progress = TransferProgress {
            bytes_done: 4096,
            bytes_total: 0,
            label: "base.zip".into(),
        };
        assert_eq!(progress.percent(), None);
        assert!(progress.is_indeterminate());
        assert_eq!(
            ProgressEvent::Transfer(progress).status_line(),
            "Downloading base.zip: 4 KiB"
        );
    }

    #[test]
    fn percent_is_clamped() {
        let progress = TransferProgress {
            bytes_done: 150,
            bytes_total: 100,
            label: "x".into(),
        };
        assert_eq!(progress.percent(), Some(100));
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let (sink, mut rx) = ProgressSink::channel(1);
        sink.status("first");
        sink.status("second");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.status_line(), "first");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disabled_sink_is_silent() {
        ProgressSink::disabled().status("nobody listens");
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let json = serde_json::to_value(ProgressEvent::ModFailed {
            name: "a.jar".into(),
            reason: "HTTP 404".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "mod_failed");
        assert_eq!(json["name"], "a.jar");
    }
}
