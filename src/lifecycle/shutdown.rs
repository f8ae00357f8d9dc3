//! Shutdown coordination and process exit reasons.

use tokio::sync::{broadcast, mpsc};

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Why the process is about to exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The startup script terminated with this exit code.
    ScriptExited(i32),
    /// An allow-list lookup failed while serving.
    StoreFailure(String),
    /// SIGINT/SIGTERM received and connections drained.
    Interrupted,
    /// The server task ended on its own.
    ServerStopped,
}

impl ExitReason {
    /// Process exit code for this reason.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExitReason::ScriptExited(code) => *code,
            ExitReason::StoreFailure(_) => 1,
            ExitReason::Interrupted => 0,
            ExitReason::ServerStopped => 1,
        }
    }
}

/// Sending side of the exit channel, cloned into every component that may
/// end the process.
#[derive(Debug, Clone)]
pub struct ExitHandle {
    tx: mpsc::UnboundedSender<ExitReason>,
}

impl ExitHandle {
    /// Request process exit. The first reason received wins.
    pub fn exit(&self, reason: ExitReason) {
        let _ = self.tx.send(reason);
    }
}

/// Create the exit channel. The receiver belongs to the startup orchestrator.
pub fn exit_channel() -> (ExitHandle, mpsc::UnboundedReceiver<ExitReason>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ExitHandle { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitReason::ScriptExited(0).exit_code(), 0);
        assert_eq!(ExitReason::ScriptExited(42).exit_code(), 42);
        assert_eq!(ExitReason::StoreFailure("timeout".into()).exit_code(), 1);
        assert_eq!(ExitReason::Interrupted.exit_code(), 0);
        assert_eq!(ExitReason::ServerStopped.exit_code(), 1);
    }

    #[tokio::test]
    async fn exit_handle_delivers_reasons_in_order() {
        let (handle, mut rx) = exit_channel();
        handle.clone().exit(ExitReason::StoreFailure("boom".into()));
        handle.exit(ExitReason::ScriptExited(3));

        assert_eq!(rx.recv().await, Some(ExitReason::StoreFailure("boom".into())));
        assert_eq!(rx.recv().await, Some(ExitReason::ScriptExited(3)));
    }

    #[tokio::test]
    async fn shutdown_reaches_subscribers() {
        let shutdown = Shutdown::new();
        let mut a = shutdown.subscribe();
        let mut b = shutdown.subscribe();
        assert_eq!(shutdown.receiver_count(), 2);

        shutdown.trigger();
        assert!(a.recv().await.is_ok());
        assert!(b.recv().await.is_ok());
    }
}
