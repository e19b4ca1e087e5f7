//! Graceful shutdown via `CancellationToken`.
//!
//! The root token stops the accept loop. Every connection holds a child
//! token, so cancelling the root also closes every live socket. Connection
//! writer tasks are tracked so shutdown can wait for their Close frames.

use std::future::Future;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the root cancellation token for a server.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    connection_tasks: Mutex<JoinSet<()>>,
}

impl ShutdownCoordinator {
    /// Create a coordinator that has not been triggered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the root token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// A token cancelled with the root, but cancellable on its own.
    pub fn connection_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Spawn a per-connection task that shutdown waits for.
    pub fn spawn_connection_task<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.connection_tasks.lock();
        // Reap finished tasks so the set does not grow with every connection.
        while tasks.try_join_next().is_some() {}
        let _ = tasks.spawn(task);
    }

    /// Number of tracked connection tasks not yet reaped.
    pub fn connection_task_count(&self) -> usize {
        self.connection_tasks.lock().len()
    }

    /// Trigger shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been triggered.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown, then wait up to `timeout` for `handles` and every
    /// tracked connection task to finish.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Duration) {
        self.shutdown();
        let mut connections = std::mem::take(&mut *self.connection_tasks.lock());
        info!(
            task_count = handles.len(),
            connection_tasks = connections.len(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "draining server tasks"
        );

        let drain = async {
            let _ = futures::future::join_all(handles).await;
            while let Some(result) = connections.join_next().await {
                if let Err(e) = result {
                    warn!(error = %e, "connection task failed");
                }
            }
        };
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!(?timeout, "shutdown timed out, abandoning remaining tasks");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn starts_running() {
        assert!(!ShutdownCoordinator::new().is_shutting_down());
    }

    #[test]
    fn shutdown_cancels_root_and_children() {
        let coord = ShutdownCoordinator::new();
        let root = coord.token();
        let child = coord.connection_token();
        coord.shutdown();
        coord.shutdown();
        assert!(coord.is_shutting_down());
        assert!(root.is_cancelled());
        assert!(child.is_cancelled());
    }

    #[test]
    fn cancelling_a_child_leaves_root_running() {
        let coord = ShutdownCoordinator::new();
        let child = coord.connection_token();
        child.cancel();
        assert!(!coord.is_shutting_down());
    }

    #[tokio::test]
    async fn graceful_shutdown_waits_for_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move { token.cancelled().await });

        coord
            .graceful_shutdown(vec![handle], Duration::from_secs(1))
            .await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_shutdown_gives_up_after_timeout() {
        let coord = ShutdownCoordinator::new();
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });

        let started = tokio::time::Instant::now();
        coord
            .graceful_shutdown(vec![stuck], Duration::from_millis(100))
            .await;
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn graceful_shutdown_waits_for_connection_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.connection_token();
        let flushed = Arc::new(AtomicBool::new(false));
        let done = Arc::clone(&flushed);
        coord.spawn_connection_task(async move {
            token.cancelled().await;
            tokio::task::yield_now().await;
            done.store(true, Ordering::SeqCst);
        });
        assert_eq!(coord.connection_task_count(), 1);

        coord.graceful_shutdown(Vec::new(), Duration::from_secs(1)).await;
        assert!(flushed.load(Ordering::SeqCst));
        assert_eq!(coord.connection_task_count(), 0);
    }

    #[tokio::test]
    async fn finished_connection_tasks_are_reaped_on_spawn() {
        let coord = ShutdownCoordinator::new();
        coord.spawn_connection_task(async {});
        tokio::time::sleep(Duration::from_millis(20)).await;
        coord.spawn_connection_task(std::future::pending());
        assert_eq!(coord.connection_task_count(), 1);
    }
}
