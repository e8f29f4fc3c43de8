//! Wearable companion link
//!
//! The wearable sends a flag (the current wall-clock time) when the referee or
//! coach presses its button, and shows whether the phone is recording. The
//! transport itself is external; the recorder only depends on the narrow
//! `WearableLink` interface, injected at construction.

use fencing_common::time::now_unix_seconds;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Callback receiving a flag as absolute UNIX seconds
pub type FlagHandler = Arc<dyn Fn(f64) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WearableError {
    #[error("Wearable is not reachable")]
    Unreachable,
}

/// Transport to the wearable companion
pub trait WearableLink: Send + Sync {
    /// Emit a flag stamped with the current time (the wearable's button press)
    fn send_flag_signal(&self) -> Result<(), WearableError>;

    /// Register the receiver for incoming flags
    fn on_flag_received(&self, handler: FlagHandler);

    /// Tell the wearable whether a recording is in progress
    fn send_recording_state(&self, recording: bool);
}

/// In-process wearable link
///
/// Delivers flags synchronously to the registered handler. `deliver_flag`
/// lets callers inject arbitrary (late or reordered) timestamps the way a real
/// transport would hand them over.
pub struct LocalWearableLink {
    handler: Mutex<Option<FlagHandler>>,
    reachable: AtomicBool,
    recording_tx: watch::Sender<bool>,
}

impl LocalWearableLink {
    pub fn new() -> Self {
        let (recording_tx, _) = watch::channel(false);
        Self {
            handler: Mutex::new(None),
            reachable: AtomicBool::new(true),
            recording_tx,
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        info!(reachable, "Wearable reachability changed");
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Hand a flag timestamp to the registered handler
    pub fn deliver_flag(&self, absolute_unix_seconds: f64) {
        let handler = self
            .handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        match handler {
            Some(handler) => handler(absolute_unix_seconds),
            None => warn!(
                flag_timestamp = absolute_unix_seconds,
                "Flag received with no handler registered"
            ),
        }
    }

    /// Recording state as seen by the wearable
    pub fn recording_state(&self) -> watch::Receiver<bool> {
        self.recording_tx.subscribe()
    }

    pub fn is_recording(&self) -> bool {
        *self.recording_tx.borrow()
    }
}

impl Default for LocalWearableLink {
    fn default() -> Self {
        Self::new()
    }
}

impl WearableLink for LocalWearableLink {
    fn send_flag_signal(&self) -> Result<(), WearableError> {
        if !self.is_reachable() {
            warn!("Wearable flag not sent: link unreachable");
            return Err(WearableError::Unreachable);
        }
        self.deliver_flag(now_unix_seconds());
        Ok(())
    }

    fn on_flag_received(&self, handler: FlagHandler) {
        let mut slot = self
            .handler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if slot.is_some() {
            warn!("Replacing previously registered flag handler");
        }
        *slot = Some(handler);
    }

    fn send_recording_state(&self, recording: bool) {
        debug!(recording, "Sending recording state to wearable");
        self.recording_tx.send_replace(recording);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_flag_signal_reaches_handler() {
        let link = LocalWearableLink::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        link.on_flag_received(Arc::new(move |ts| sink.lock().unwrap().push(ts)));

        link.send_flag_signal().unwrap();
        link.deliver_flag(42.0);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert!(received[0] > 946_684_800.0);
        assert_eq!(received[1], 42.0);
    }

    #[test]
    fn test_unreachable_link_refuses_flags() {
        let link = LocalWearableLink::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        link.on_flag_received(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        link.set_reachable(false);
        assert_eq!(link.send_flag_signal(), Err(WearableError::Unreachable));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_recording_state_is_published() {
        let link = LocalWearableLink::new();
        let mut rx = link.recording_state();
        assert!(!*rx.borrow());

        link.send_recording_state(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
        assert!(link.is_recording());
    }
}
