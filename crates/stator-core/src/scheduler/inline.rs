// ── Deterministic executor ──
//
// Runs jobs on the submitting thread. Whoever holds the committer lock
// drains the queue, so every job submitted before `submit` returns has run.
// A job submitted from inside a running job (same thread) is queued behind
// it instead of re-entering the committer; a job submitted from another
// thread waits for the current drain and then runs.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::{Committer, Executor, Job};
use crate::broadcast::Hub;
use crate::error::StoreError;
use crate::snapshot::Snapshot;

pub(crate) struct InlineExecutor<S: Snapshot> {
    queue: Mutex<VecDeque<Job<S>>>,
    committer: Mutex<Committer<S>>,
    /// Thread currently draining, if any.
    drainer: Mutex<Option<ThreadId>>,
    hub: Arc<Hub<S>>,
    cancel: CancellationToken,
}

/// Marks the current thread as the drainer. Cleared on drop, including
/// during unwinding.
struct DrainGuard<'a> {
    drainer: &'a Mutex<Option<ThreadId>>,
}

impl<'a> DrainGuard<'a> {
    fn enter(drainer: &'a Mutex<Option<ThreadId>>) -> Self {
        *drainer.lock() = Some(thread::current().id());
        Self { drainer }
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        *self.drainer.lock() = None;
    }
}

impl<S: Snapshot> InlineExecutor<S> {
    pub(crate) fn new(committer: Committer<S>, hub: Arc<Hub<S>>, cancel: CancellationToken) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            committer: Mutex::new(committer),
            drainer: Mutex::new(None),
            hub,
            cancel,
        }
    }

    fn pop(&self) -> Option<Job<S>> {
        self.queue.lock().pop_front()
    }

    fn draining_here(&self) -> bool {
        *self.drainer.lock() == Some(thread::current().id())
    }

    /// Run queued jobs until the queue is empty. Blocks while another
    /// thread is draining; by the time the lock is ours, our job has either
    /// run already or is still queued for us.
    fn drain(&self) {
        {
            let mut committer = self.committer.lock();
            let _guard = DrainGuard::enter(&self.drainer);
            while let Some(job) = self.pop() {
                if self.cancel.is_cancelled() {
                    trace!(kind = job.kind(), "discarding queued job");
                    break;
                }
                if let Some(snapshot) = committer.run(job) {
                    self.hub.publish_now(snapshot);
                }
            }
        }

        if self.cancel.is_cancelled() {
            self.shut_down();
        }
    }

    fn shut_down(&self) {
        let discarded = {
            let mut queue = self.queue.lock();
            let n = queue.len();
            queue.clear();
            n
        };
        self.hub.close();
        if discarded > 0 {
            debug!(discarded, "deterministic store closed with queued jobs");
        }
    }
}

impl<S: Snapshot> Executor<S> for InlineExecutor<S> {
    fn submit(&self, job: Job<S>) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            self.shut_down();
            return Err(StoreError::Closed);
        }
        self.queue.lock().push_back(job);
        if !self.draining_here() {
            self.drain();
        }
        Ok(())
    }

    fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}
