//! Shared plumbing for the inference worker pools.
//!
//! A pool owns one `JobQueue` and a set of OS threads, each holding its own
//! model instance. Callers enqueue a job carrying a oneshot sender; the
//! worker resolves it after the model run. `oneshot::Sender::send` wakes the
//! owning runtime without running any continuation on the worker thread,
//! and is a no-op when the receiver has been torn down.

use crate::error::SttError;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::thread::JoinHandle;
use tokio::sync::oneshot;

pub(crate) struct Job<T, R> {
    pub payload: T,
    pub done: oneshot::Sender<Result<R, SttError>>,
}

struct QueueState<T, R> {
    closed: bool,
    jobs: VecDeque<Job<T, R>>,
}

/// Unbounded multi-producer queue drained by the pool's worker threads.
///
/// Close-then-drain: after `close`, `push` is rejected but `pop` keeps
/// returning queued jobs until the queue is empty, so every accepted job is
/// resolved exactly once.
pub(crate) struct JobQueue<T, R> {
    state: Mutex<QueueState<T, R>>,
    available: Condvar,
}

impl<T, R> JobQueue<T, R> {
    pub fn new() -> Self {
        JobQueue {
            state: Mutex::new(QueueState {
                closed: false,
                jobs: VecDeque::new(),
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueue a job; hands it back if the queue is closed.
    pub fn push(&self, job: Job<T, R>) -> Result<(), Job<T, R>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.closed {
            return Err(job);
        }
        state.jobs.push_back(job);
        self.available.notify_one();
        Ok(())
    }

    /// Dequeue the next job, blocking while the queue is open and empty.
    /// `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<Job<T, R>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    pub fn close(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.closed {
            state.closed = true;
            self.available.notify_all();
        }
    }
}

/// Run jobs against a worker's model until the queue is closed and drained.
pub(crate) fn run_worker<T, R, M>(
    queue: &JobQueue<T, R>,
    model: &mut M,
    mut run: impl FnMut(&mut M, T) -> Result<R, SttError>,
) {
    while let Some(job) = queue.pop() {
        let result = run(model, job.payload);
        // The caller may be gone (connection dropped); discard silently.
        let _ = job.done.send(result);
    }
}

/// A receiver that already holds its result; used to reject submissions
/// against a pool that is not accepting work.
pub(crate) fn resolved<R>(result: Result<R, SttError>) -> oneshot::Receiver<Result<R, SttError>> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(result);
    rx
}

/// Pool lifecycle: started at most once, closed at most once.
pub(crate) enum Lifecycle {
    Idle,
    Running(Vec<JoinHandle<()>>),
    Closed,
}

impl Lifecycle {
    /// Move to Closed, returning worker handles to join if any were running.
    pub fn shut_down(&mut self) -> Vec<JoinHandle<()>> {
        match std::mem::replace(self, Lifecycle::Closed) {
            Lifecycle::Running(handles) => handles,
            _ => Vec::new(),
        }
    }
}
