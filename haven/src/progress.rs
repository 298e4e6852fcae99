use tokio::sync::mpsc;
use tracing::info;

use crate::upload::UploadStage;

/// Human readable status update emitted while a long running operation makes progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Upload stage the message belongs to, `None` for bucket provisioning and other work.
    pub stage: Option<UploadStage>,
    pub message: String,
}

/// Optional side channel for [`ProgressEvent`]s.
///
/// Reporting never blocks and never fails: without a listener, or after the listener went away,
/// events are only logged.
#[derive(Clone, Debug, Default)]
pub struct Progress {
    tx: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl Progress {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn report(&self, message: impl Into<String>) {
        self.emit(None, message.into());
    }

    pub fn stage(&self, stage: UploadStage, message: impl Into<String>) {
        self.emit(Some(stage), message.into());
    }

    fn emit(&self, stage: Option<UploadStage>, message: String) {
        match stage {
            Some(stage) => info!(%stage, "{message}"),
            None => info!("{message}"),
        }
        if let Some(tx) = &self.tx {
            let _ = tx.send(ProgressEvent { stage, message });
        }
    }
}
