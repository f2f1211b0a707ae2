//! A small fixed-size worker pool that runs Round Engine transitions off the
//! caller's task, so `learner_completed_task` can acknowledge the RPC
//! promptly instead of stalling behind dispatch work.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::sync::{mpsc, Mutex};

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Reference pool size.
pub const DEFAULT_WORKERS: usize = 2;

pub struct SchedulingPool {
    submit_tx: mpsc::UnboundedSender<BoxFuture>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl SchedulingPool {
    pub fn new(num_workers: usize) -> Self {
        let (submit_tx, submit_rx) = mpsc::unbounded_channel();
        let submit_rx = Arc::new(Mutex::new(submit_rx));
        let workers = (0..num_workers.max(1))
            .map(|_| {
                let submit_rx = Arc::clone(&submit_rx);
                tokio::spawn(Self::worker_loop(submit_rx))
            })
            .collect();
        Self { submit_tx, workers }
    }

    /// Non-blocking enqueue: FIFO per worker, not strictly serialized across
    /// the pool. Mutual exclusion for the state a job touches is the job's
    /// own responsibility (the learners lock inside `schedule_tasks`).
    pub fn submit(&self, job: impl Future<Output = ()> + Send + 'static) {
        let _ = self.submit_tx.send(Box::pin(job));
    }

    async fn worker_loop(submit_rx: Arc<Mutex<mpsc::UnboundedReceiver<BoxFuture>>>) {
        loop {
            let job = {
                let mut rx = submit_rx.lock().await;
                rx.recv().await
            };
            match job {
                Some(job) => job.await,
                None => break,
            }
        }
    }

    /// Waits for every queued transition to finish before returning.
    pub async fn shutdown(self) {
        drop(self.submit_tx);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}
