use std::future::Future;

use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

struct Completed<T> {
    epoch: u64,
    output: T,
}

/// Runs at most one background task at a time on behalf of a flow.
///
/// Every attempt runs under an epoch. Starting a new attempt or cancelling
/// bumps the epoch, aborts the running task and makes sure nothing it
/// might still deliver is ever observed.
pub struct CancellableOperation<T> {
    epoch: u64,
    task: Option<JoinHandle<()>>,
    completed_tx: mpsc::UnboundedSender<Completed<T>>,
    completed_rx: mpsc::UnboundedReceiver<Completed<T>>,
}

impl<T: Send + 'static> CancellableOperation<T> {
    pub fn new() -> Self {
        let (completed_tx, completed_rx) = mpsc::unbounded_channel();
        Self {
            epoch: 0,
            task: None,
            completed_tx,
            completed_rx,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Starts a new attempt, superseding the current one.
    pub fn launch<F>(&mut self, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.abort();
        self.epoch = self.epoch.wrapping_add(1);
        self.spawn(fut);
    }

    /// Runs the next step of the current attempt.
    pub fn continue_with<F>(&mut self, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.abort();
        self.spawn(fut);
    }

    pub fn cancel(&mut self) {
        self.abort();
        self.epoch = self.epoch.wrapping_add(1);
        debug!("Operation cancelled, now at epoch {}", self.epoch);
    }

    /// Waits for the output of the current attempt. Outputs of superseded
    /// attempts are dropped. Pending forever when nothing runs.
    pub async fn next_completed(&mut self) -> T {
        loop {
            let Some(completed) = self.completed_rx.recv().await else {
                return std::future::pending().await;
            };
            if completed.epoch != self.epoch {
                debug!(
                    "Dropping result of epoch {}, current epoch is {}",
                    completed.epoch, self.epoch
                );
                continue;
            }
            self.task = None;
            return completed.output;
        }
    }

    fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = T> + Send + 'static,
    {
        let epoch = self.epoch;
        let completed_tx = self.completed_tx.clone();
        self.task = Some(tokio::spawn(async move {
            let output = fut.await;
            // The receiver lives as long as the operation.
            let _ = completed_tx.send(Completed { epoch, output });
        }));
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<T: Send + 'static> Default for CancellableOperation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for CancellableOperation<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
