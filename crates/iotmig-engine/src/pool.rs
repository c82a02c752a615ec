//! Fixed-size worker pool
//!
//! `size` workers drain one shared, unbounded task queue. Each task yields
//! exactly one [`DeviceOutcome`], which is sent on a result channel sized by
//! the caller (normally the device count) so workers never wait on a slow
//! reader. A panicking task still yields an outcome.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{MigrationError, MigrationResult};
use crate::outcome::{contexts, DeviceOutcome, ErrorLog};
use crate::progress::ProgressReporter;

/// One unit of work: migrate a single device.
pub struct Task {
    device_id: String,
    work: BoxFuture<'static, DeviceOutcome>,
}

impl Task {
    pub fn new<F>(device_id: impl Into<String>, work: F) -> Self
    where
        F: Future<Output = DeviceOutcome> + Send + 'static,
    {
        Self {
            device_id: device_id.into(),
            work: work.boxed(),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

type TaskQueue = Arc<Mutex<mpsc::UnboundedReceiver<Task>>>;

/// Bounded set of workers over an unbounded task queue.
pub struct WorkerPool {
    size: usize,
    tasks_tx: Option<mpsc::UnboundedSender<Task>>,
    tasks_rx: TaskQueue,
    results_tx: Option<mpsc::Sender<DeviceOutcome>>,
    progress: Arc<dyn ProgressReporter>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool and the receiving end of its result channel.
    pub fn new(
        size: usize,
        result_capacity: usize,
        progress: Arc<dyn ProgressReporter>,
    ) -> (Self, mpsc::Receiver<DeviceOutcome>) {
        let (tasks_tx, tasks_rx) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::channel(result_capacity.max(1));

        let pool = Self {
            size: size.max(1),
            tasks_tx: Some(tasks_tx),
            tasks_rx: Arc::new(Mutex::new(tasks_rx)),
            results_tx: Some(results_tx),
            progress,
            handles: Vec::new(),
        };
        (pool, results_rx)
    }

    /// Start the workers. Calling it again does nothing.
    pub fn run(&mut self) {
        let Some(results_tx) = self.results_tx.take() else {
            return;
        };

        debug!(workers = self.size, "Starting worker pool");
        for worker in 0..self.size {
            self.handles.push(tokio::spawn(worker_loop(
                worker,
                Arc::clone(&self.tasks_rx),
                results_tx.clone(),
                Arc::clone(&self.progress),
            )));
        }
    }

    /// Enqueue a task. Fails once the queue has been closed.
    pub fn add_task(&self, task: Task) -> MigrationResult<()> {
        let sender = self
            .tasks_tx
            .as_ref()
            .ok_or_else(|| MigrationError::invalid_config("task queue is closed"))?;
        sender
            .send(task)
            .map_err(|_| MigrationError::invalid_config("task queue is closed"))
    }

    /// Stop accepting tasks. Workers exit once the queue is drained.
    pub fn close(&mut self) {
        self.tasks_tx = None;
    }

    /// Close the queue and wait for every worker to exit.
    pub async fn join(mut self) -> MigrationResult<()> {
        self.close();
        self.results_tx = None;

        for (worker, handle) in self.handles.drain(..).enumerate() {
            if let Err(e) = handle.await {
                error!(worker, error = %e, "Worker terminated abnormally");
                return Err(MigrationError::WorkerPanicked { worker });
            }
        }
        Ok(())
    }
}

async fn worker_loop(
    worker: usize,
    tasks: TaskQueue,
    results: mpsc::Sender<DeviceOutcome>,
    progress: Arc<dyn ProgressReporter>,
) {
    loop {
        // Release the queue lock before running the task.
        let next = tasks.lock().await.recv().await;
        let Some(Task { device_id, work }) = next else {
            break;
        };

        let outcome = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(worker, device_id = %device_id, panic = %message, "Migration task panicked");
                DeviceOutcome::failed(ErrorLog::new(device_id, contexts::WORKER_PANIC, message))
            }
        };

        progress.inc(1);
        if results.send(outcome).await.is_err() {
            warn!(worker, "Result receiver dropped, stopping worker");
            break;
        }
    }
    debug!(worker, "Worker stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgress;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingProgress {
        count: AtomicU64,
    }

    impl ProgressReporter for CountingProgress {
        fn inc(&self, delta: u64) {
            self.count.fetch_add(delta, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_one_outcome_per_task() {
        let progress = Arc::new(CountingProgress::default());
        let (mut pool, mut results) = WorkerPool::new(3, 20, progress.clone());
        pool.run();

        for i in 0..20 {
            let id = format!("dev-{i}");
            let task_id = id.clone();
            pool.add_task(Task::new(id, async move { DeviceOutcome::success(task_id) }))
                .unwrap();
        }
        pool.close();

        let mut ids = Vec::new();
        for _ in 0..20 {
            ids.push(results.recv().await.unwrap().device_id);
        }
        pool.join().await.unwrap();

        assert!(results.recv().await.is_none());
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 20);
        assert_eq!(progress.count.load(Ordering::SeqCst), 20);
    }

    async fn explode() -> DeviceOutcome {
        panic!("remote returned garbage")
    }

    #[tokio::test]
    async fn test_panicking_task_still_reports() {
        let (mut pool, mut results) = WorkerPool::new(2, 2, Arc::new(NoopProgress));
        pool.run();

        pool.add_task(Task::new("boom", explode())).unwrap();
        pool.add_task(Task::new("ok", async { DeviceOutcome::success("ok") }))
            .unwrap();
        pool.close();

        let mut outcomes = vec![
            results.recv().await.unwrap(),
            results.recv().await.unwrap(),
        ];
        pool.join().await.unwrap();
        outcomes.sort_by(|a, b| a.device_id.cmp(&b.device_id));

        let failure = outcomes[0].failure.as_ref().unwrap();
        assert_eq!(outcomes[0].device_id, "boom");
        assert_eq!(failure.context, contexts::WORKER_PANIC);
        assert_eq!(failure.error, "remote returned garbage");
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn test_add_task_after_close_fails() {
        let (mut pool, _results) = WorkerPool::new(1, 1, Arc::new(NoopProgress));
        pool.close();
        let err = pool
            .add_task(Task::new("late", async { DeviceOutcome::success("late") }))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }
}
