//! Deferred-work seam for media copies and document conversion.
//!
//! Renderers may queue follow-up work (attachment copies, thumbnail
//! extraction) while records stream through the pipeline. The orchestrator
//! only ever drives the queue through the [`TaskManager`] trait: submit,
//! poll the outstanding count, block until drained, or cancel everything.
//! [`WorkerPool`] is the built-in implementation; cancellation drops queued
//! work but lets the task already running finish, so it is cooperative,
//! never preemptive.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait TaskManager: Send + Sync {
    fn submit(&self, description: &str, task: Task);

    /// Queued plus running tasks, with a short description of the queue head.
    fn outstanding(&self) -> (usize, String);

    /// Block until no work remains or `timeout` elapses; true when drained.
    fn wait_until_drained(&self, timeout: Duration) -> bool;

    /// Drop all queued tasks. Running tasks complete normally.
    fn cancel_all(&self);
}

struct PoolState {
    queue: VecDeque<(String, Task)>,
    running: usize,
    shutdown: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    work_ready: Condvar,
    work_done: Condvar,
    cancelled: AtomicBool,
}

impl PoolInner {
    fn outstanding_locked(state: &PoolState) -> usize {
        state.queue.len() + state.running
    }
}

/// Fixed-size worker pool backing the built-in task manager.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(worker_count: usize) -> Self {
        let inner = Arc::new(PoolInner {
            state: Mutex::new(PoolState { queue: VecDeque::new(), running: 0, shutdown: false }),
            work_ready: Condvar::new(),
            work_done: Condvar::new(),
            cancelled: AtomicBool::new(false),
        });

        let workers = (0..worker_count.max(1))
            .map(|_| {
                let inner = Arc::clone(&inner);
                thread::spawn(move || worker_loop(inner))
            })
            .collect();

        Self { inner, workers }
    }
}

fn worker_loop(inner: Arc<PoolInner>) {
    loop {
        let task = {
            let mut state = inner.state.lock().expect("task pool lock poisoned");
            loop {
                if let Some((_, task)) = state.queue.pop_front() {
                    state.running += 1;
                    break task;
                }
                if state.shutdown {
                    return;
                }
                state = inner.work_ready.wait(state).expect("task pool lock poisoned");
            }
        };

        task();

        let mut state = inner.state.lock().expect("task pool lock poisoned");
        state.running -= 1;
        drop(state);
        inner.work_done.notify_all();
    }
}

impl TaskManager for WorkerPool {
    fn submit(&self, description: &str, task: Task) {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return;
        }
        let mut state = self.inner.state.lock().expect("task pool lock poisoned");
        state.queue.push_back((description.to_string(), task));
        drop(state);
        self.inner.work_ready.notify_one();
    }

    fn outstanding(&self) -> (usize, String) {
        let state = self.inner.state.lock().expect("task pool lock poisoned");
        let description = state.queue.front().map(|(d, _)| d.clone()).unwrap_or_default();
        (PoolInner::outstanding_locked(&state), description)
    }

    fn wait_until_drained(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().expect("task pool lock poisoned");
        while PoolInner::outstanding_locked(&state) > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .inner
                .work_done
                .wait_timeout(state, deadline - now)
                .expect("task pool lock poisoned");
            state = next;
        }
        true
    }

    fn cancel_all(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let mut state = self.inner.state.lock().expect("task pool lock poisoned");
        state.queue.clear();
        drop(state);
        self.inner.work_done.notify_all();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        {
            let mut state = self.inner.state.lock().expect("task pool lock poisoned");
            state.shutdown = true;
        }
        self.inner.work_ready.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
