//! Batch cancellation

use std::sync::Arc;
use tokio::sync::watch;

/// How a batch is being stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Admit no new records; in-flight jobs run to completion
    Graceful,
    /// Admit no new records; in-flight jobs resolve as cancelled at once
    Hard,
}

/// Shared handle for cancelling a running batch
///
/// Cloning is cheap and every clone controls the same batch. A hard cancel
/// may follow a graceful one; the reverse is ignored.
///
/// # Examples
///
/// ```
/// use docket_pipeline::{CancelHandle, CancelMode};
///
/// let handle = CancelHandle::new();
/// assert!(!handle.is_cancelled());
///
/// handle.graceful();
/// assert_eq!(handle.mode(), Some(CancelMode::Graceful));
///
/// handle.hard();
/// handle.graceful();
/// assert_eq!(handle.mode(), Some(CancelMode::Hard));
/// ```
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<Option<CancelMode>>>,
}

impl CancelHandle {
    /// Create a handle for a batch that is not cancelled
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Stop admitting records and let in-flight jobs finish
    pub fn graceful(&self) {
        let changed = self.sender.send_if_modified(|mode| {
            if mode.is_none() {
                *mode = Some(CancelMode::Graceful);
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Graceful cancellation requested");
        }
    }

    /// Stop admitting records and abandon in-flight jobs
    pub fn hard(&self) {
        let changed = self.sender.send_if_modified(|mode| {
            if *mode != Some(CancelMode::Hard) {
                *mode = Some(CancelMode::Hard);
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Hard cancellation requested");
        }
    }

    /// Current cancellation mode, if any
    pub fn mode(&self) -> Option<CancelMode> {
        *self.sender.borrow()
    }

    /// Whether any cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.mode().is_some()
    }

    /// Receiver that observes mode changes
    pub fn subscribe(&self) -> watch::Receiver<Option<CancelMode>> {
        self.sender.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve once a hard cancel is requested; never resolve otherwise
pub(crate) async fn hard_cancelled(mut receiver: watch::Receiver<Option<CancelMode>>) {
    if receiver
        .wait_for(|mode| *mode == Some(CancelMode::Hard))
        .await
        .is_err()
    {
        std::future::pending::<()>().await;
    }
}
