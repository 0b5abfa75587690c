use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::{Receiver, Sender};
use tokio::sync::Mutex;

/// Shared handle used to stop a run between steps, or to cancel in-flight device work.
///
/// A shutdown is sticky: listeners created after [ShutdownHandle::shutdown] was called still
/// observe it.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
    requested: Arc<AtomicBool>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
            requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn shutdown(&self) {
        if self.requested.swap(true, Ordering::SeqCst) {
            log::trace!("Shutdown already requested");
            return;
        }

        if let Err(e) = self.sender.send(()) {
            // Nobody is waiting right now, the flag is enough for later checks.
            log::debug!("No active shutdown listeners: {e:?}");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener::new(self.sender.subscribe(), self.requested.clone())
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    requested: Arc<AtomicBool>,
}

impl DelegatedShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>, requested: Arc<AtomicBool>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            requested,
        }
    }

    /// Point in time check if the shutdown signal has been received. If this returns true then
    /// no further steps should be started.
    pub fn should_shutdown(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Wait for the shutdown signal. Safe to race with other futures so that a shutdown can
    /// cancel device commands or captures in progress.
    pub async fn wait_for_shutdown(&mut self) {
        if self.should_shutdown() {
            return;
        }

        let mut receiver = self.receiver.lock().await;
        // Either a message or a closed channel means the run is over.
        let _ = receiver.recv().await;
    }
}

#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_created_after_shutdown_sees_it() {
        let handle = ShutdownHandle::new();
        handle.shutdown();

        let listener = handle.new_listener();
        assert!(listener.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn listener_not_shutdown_by_default() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();
        assert!(!listener.should_shutdown());
    }

    #[tokio::test]
    async fn wait_for_shutdown_returns_after_signal() {
        let handle = ShutdownHandle::new();
        let mut listener = handle.new_listener();

        let waiter = tokio::spawn(async move {
            listener.wait_for_shutdown().await;
        });

        handle.shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), waiter)
            .await
            .expect("listener did not observe shutdown")
            .unwrap();
    }
}
