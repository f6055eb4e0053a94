//! Dedicated worker thread with a two-level priority queue.
//!
//! Every renderer event, every asynchronous mode-change pass and every
//! outbound notification runs on this one thread, so they are observed in
//! the order they were posted.  `High` tasks are always drained before the
//! next `Normal` task is started; within one priority the queue is FIFO.
//!
//! # Relation to Tokio (for beginners)
//!
//! The topology and display state are guarded by blocking `parking_lot`
//! mutexes and the renderer calls are synchronous, so tasks posted here may
//! block.  The worker is a plain OS thread fed by two `crossbeam-channel`
//! queues and never runs on the Tokio runtime.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{bounded, select_biased, unbounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, error};

type Task = Box<dyn FnOnce() + Send + 'static>;

/// Scheduling class of a posted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPriority {
    High,
    Normal,
}

/// Error returned when the worker thread could not be started.
#[derive(Debug, Error)]
#[error("failed to spawn worker thread: {0}")]
pub struct WorkerSpawnError(#[from] std::io::Error);

/// Cloneable handle used to post work onto the worker thread.
#[derive(Clone)]
pub struct WorkerQueue {
    high: Sender<Task>,
    normal: Sender<Task>,
}

/// Owns the worker thread; joining happens once every [`WorkerQueue`] clone
/// has been dropped.
pub struct WorkerHandle {
    join: Option<JoinHandle<()>>,
}

impl WorkerQueue {
    /// Spawns the worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerSpawnError`] if the OS refuses to create the thread.
    pub fn start(name: &str) -> Result<(WorkerQueue, WorkerHandle), WorkerSpawnError> {
        let (high_tx, high_rx) = unbounded::<Task>();
        let (normal_tx, normal_rx) = unbounded::<Task>();

        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_worker(high_rx, normal_rx))?;

        debug!(worker = name, "worker thread started");
        Ok((
            WorkerQueue { high: high_tx, normal: normal_tx },
            WorkerHandle { join: Some(join) },
        ))
    }

    /// Posts a task with `Normal` priority.
    pub fn post<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.post_with_priority(TaskPriority::Normal, task);
    }

    /// Posts a task with the given priority.
    ///
    /// Tasks posted after the worker has shut down are dropped.
    pub fn post_with_priority<F>(&self, priority: TaskPriority, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = match priority {
            TaskPriority::High => &self.high,
            TaskPriority::Normal => &self.normal,
        };
        if sender.send(Box::new(task)).is_err() {
            debug!(?priority, "worker stopped; task dropped");
        }
    }

    /// Blocks until every task posted before this call has run.
    ///
    /// Returns `false` on timeout.  Must not be called from the worker thread
    /// itself.
    pub fn flush(&self, timeout: Duration) -> bool {
        let (ack_tx, ack_rx) = bounded::<()>(1);
        self.post(move || {
            let _ = ack_tx.send(());
        });
        ack_rx.recv_timeout(timeout).is_ok()
    }
}

impl WorkerHandle {
    /// Waits for the worker thread to finish draining its queues.
    pub fn join(mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}

fn run_worker(high: Receiver<Task>, normal: Receiver<Task>) {
    loop {
        // `high` is listed first, so it wins whenever both queues are ready.
        select_biased! {
            recv(high) -> msg => match msg {
                Ok(task) => run_task(task),
                Err(_) => break,
            },
            recv(normal) -> msg => match msg {
                Ok(task) => run_task(task),
                Err(_) => break,
            },
        }
    }
    // Senders are gone; finish whatever is still queued.
    for task in high.try_iter().chain(normal.try_iter()) {
        run_task(task);
    }
    debug!("worker thread stopped");
}

fn run_task(task: Task) {
    if catch_unwind(AssertUnwindSafe(task)).is_err() {
        error!("worker task panicked");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    const FLUSH: Duration = Duration::from_secs(2);

    #[test]
    fn test_worker_runs_normal_tasks_in_fifo_order() {
        // Arrange
        let (queue, _handle) = WorkerQueue::start("test-fifo").expect("spawn");
        let seen = Arc::new(Mutex::new(Vec::new()));

        // Act
        for i in 0..5 {
            let seen = Arc::clone(&seen);
            queue.post(move || seen.lock().expect("lock poisoned").push(i));
        }
        assert!(queue.flush(FLUSH));

        // Assert
        assert_eq!(*seen.lock().expect("lock poisoned"), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_high_priority_task_runs_before_queued_normal_tasks() {
        // Arrange: block the worker so both queues fill up
        let (queue, _handle) = WorkerQueue::start("test-priority").expect("spawn");
        let (gate_tx, gate_rx) = bounded::<()>(0);
        queue.post(move || {
            let _ = gate_rx.recv();
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            queue.post(move || seen.lock().expect("lock poisoned").push("normal"));
        }
        {
            let seen = Arc::clone(&seen);
            queue.post_with_priority(TaskPriority::High, move || {
                seen.lock().expect("lock poisoned").push("high")
            });
        }

        // Act
        gate_tx.send(()).expect("worker waiting on gate");
        assert!(queue.flush(FLUSH));

        // Assert
        assert_eq!(*seen.lock().expect("lock poisoned"), vec!["high", "normal"]);
    }

    #[test]
    fn test_high_task_posted_by_normal_task_runs_before_next_normal() {
        // Arrange: both queues filled before the worker loop starts
        let (high_tx, high_rx) = unbounded::<Task>();
        let (normal_tx, normal_rx) = unbounded::<Task>();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let seen = Arc::clone(&seen);
            let high_tx = high_tx.clone();
            normal_tx
                .send(Box::new(move || {
                    seen.lock().expect("lock poisoned").push(format!("normal-{i}"));
                    let seen = Arc::clone(&seen);
                    let _ = high_tx.send(Box::new(move || {
                        seen.lock().expect("lock poisoned").push(format!("high-{i}"))
                    }));
                }))
                .expect("queue open");
        }
        {
            let seen = Arc::clone(&seen);
            high_tx
                .send(Box::new(move || seen.lock().expect("lock poisoned").push("high-first".to_string())))
                .expect("queue open");
        }
        drop(high_tx);
        drop(normal_tx);

        // Act: run the loop on this thread until the queues are drained
        run_worker(high_rx, normal_rx);

        // Assert
        assert_eq!(
            *seen.lock().expect("lock poisoned"),
            vec!["high-first", "normal-0", "high-0", "normal-1", "high-1", "normal-2", "high-2"]
        );
    }

    #[test]
    fn test_panicking_task_does_not_stop_worker() {
        let (queue, _handle) = WorkerQueue::start("test-panic").expect("spawn");
        let ran = Arc::new(Mutex::new(false));

        queue.post(|| panic!("boom"));
        {
            let ran = Arc::clone(&ran);
            queue.post(move || *ran.lock().expect("lock poisoned") = true);
        }

        assert!(queue.flush(FLUSH));
        assert!(*ran.lock().expect("lock poisoned"));
    }

    #[test]
    fn test_join_returns_after_last_queue_is_dropped() {
        let (queue, handle) = WorkerQueue::start("test-join").expect("spawn");
        let ran = Arc::new(Mutex::new(false));
        {
            let ran = Arc::clone(&ran);
            queue.post(move || *ran.lock().expect("lock poisoned") = true);
        }

        drop(queue);
        handle.join();

        assert!(*ran.lock().expect("lock poisoned"));
    }
}
