//! The deferred-task machinery backing the shutdown pipeline: a
//! single-slot, cancellable repeating timer, plus the handler trait that
//! decides whether the managed system is actually willing to power off.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Asked, on a fixed interval, whether the managed system can power off now.
/// `VdrSubcontroller` is the only implementation: it asks VDR to confirm
/// shutdown and, if VDR agrees, synthesizes the remote `Power` keypress.
#[async_trait]
pub trait ShutdownHandler: Send + Sync {
    async fn attempt_shutdown(&self) -> bool;
}

struct RunningTask {
    join: JoinHandle<()>,
    cancel: Arc<Notify>,
}

/// Runs a callback after `interval`, then every `interval` again as long as
/// it returns `true` and nobody has called `stop`. `start` is a no-op while
/// a task from a previous `start` is still running; `stop` cancels
/// immediately and waits for the runner to actually exit.
#[derive(Default)]
pub struct DelayedRepeatableTask {
    running: Mutex<Option<RunningTask>>,
}

impl DelayedRepeatableTask {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start<F, Fut>(&self, interval: Duration, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut guard = self.running.lock().await;
        if let Some(running) = guard.as_ref() {
            if !running.join.is_finished() {
                return;
            }
        }
        let cancel = Arc::new(Notify::new());
        let cancel_for_task = cancel.clone();
        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_for_task.notified() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                if !callback().await {
                    return;
                }
            }
        });
        *guard = Some(RunningTask { join, cancel });
    }

    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            running.cancel.notify_waiters();
            let _ = running.join.await;
        }
    }
}

/// A bounded, size-1 deferred-task queue: `delay`/`repeat` hand a boxed
/// future off to a single dedicated worker so scheduling never blocks on
/// execution. Kept as the original's general-purpose deferred-task
/// primitive alongside `DelayedRepeatableTask`; the shutdown pipeline itself
/// is built on the latter.
#[derive(Clone)]
pub struct ShutdownQueue {
    tx: mpsc::Sender<BoxFuture>,
}

pub struct ShutdownWorker {
    rx: mpsc::Receiver<BoxFuture>,
}

impl ShutdownQueue {
    pub fn new() -> (Self, ShutdownWorker) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, ShutdownWorker { rx })
    }

    pub fn is_empty(&self) -> bool {
        self.tx.capacity() == self.tx.max_capacity()
    }

    /// Sleeps `wait`, then enqueues `fut` for the worker to run once.
    pub fn delay<F>(&self, wait: Duration, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let _ = tx.send(Box::pin(fut)).await;
        });
    }

    /// Re-enqueues `make_fut()` after every `interval`, until `cancel` fires.
    pub fn repeat<F, Fut>(&self, interval: Duration, cancel: Arc<Notify>, make_fut: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.notified() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                if tx.send(Box::pin(make_fut())).await.is_err() {
                    return;
                }
            }
        });
    }
}

impl ShutdownWorker {
    pub async fn run(mut self) {
        while let Some(fut) = self.rx.recv().await {
            fut.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn repeats_while_true_then_stops() {
        let task = DelayedRepeatableTask::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_cb = calls.clone();
        task.start(Duration::from_secs(1), move || {
            let calls = calls_for_cb.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                n < 3
            }
        })
        .await;
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn start_is_idempotent_while_running() {
        let task = DelayedRepeatableTask::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let calls = calls.clone();
            task.start(Duration::from_secs(3600), move || {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    false
                }
            })
            .await;
        }
        task.stop().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_runs_deferred_task() {
        let (queue, worker) = ShutdownQueue::new();
        let done = Arc::new(Notify::new());
        let done_for_worker = done.clone();
        tokio::spawn(async move {
            worker.run().await;
            done_for_worker.notify_one();
        });
        assert!(queue.is_empty());
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_for_task = ran.clone();
        queue.delay(Duration::from_secs(1), async move {
            ran_for_task.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_repeat_stops_on_cancel() {
        let (queue, worker) = ShutdownQueue::new();
        tokio::spawn(worker.run());
        let cancel = Arc::new(Notify::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_repeat = calls.clone();
        queue.repeat(Duration::from_secs(1), cancel.clone(), move || {
            let calls = calls_for_repeat.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
            }
        });
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        cancel.notify_waiters();
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
