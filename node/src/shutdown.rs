//! Shutdown coordination for the docket node's background loops.
//!
//! Every loop the node spawns is registered here. Stopping the node is
//! one call: broadcast the signal, join each registered task, and abort
//! whatever ignores the deadline so nothing keeps running detached.

use std::time::Duration;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    /// Loops to join on drain, in spawn order.
    handles: Vec<JoinHandle<()>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            handles: Vec::new(),
        }
    }

    /// Receiver for a loop to `select!` on alongside its interval.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Track a spawned loop so [`drain`](Self::drain) can join it.
    pub fn register(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }

    /// Broadcast the shutdown signal without waiting for anyone.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }

    /// Signal shutdown and join every registered loop, all within one
    /// shared `timeout`. A loop still running at the deadline gets
    /// aborted; the count of aborted loops is returned.
    pub async fn drain(&mut self, timeout: Duration) -> usize {
        self.shutdown();
        let deadline = tokio::time::Instant::now() + timeout;
        let mut aborted = 0;
        for mut handle in self.handles.drain(..) {
            if tokio::time::timeout_at(deadline, &mut handle).await.is_err() {
                handle.abort();
                aborted += 1;
            }
        }
        if aborted > 0 {
            warn!(aborted, "loops did not drain in time and were aborted");
        }
        aborted
    }

    /// Wait for SIGTERM or SIGINT, then broadcast shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down"),
            _ = terminate => info!("received SIGTERM, shutting down"),
        }

        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
