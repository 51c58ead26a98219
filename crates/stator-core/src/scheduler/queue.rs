// ── Concurrent executor ──
//
// Producers push onto an unbounded mpsc queue; one spawned worker task owns
// the `Committer` outright and drains the queue in FIFO order until the
// store's scope is cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, trace};

use super::{Committer, Executor, Job};
use crate::broadcast::Hub;
use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// Sending half of the job queue.
pub(crate) struct QueueExecutor<S: Snapshot> {
    tx: mpsc::UnboundedSender<Job<S>>,
    /// Jobs submitted but not yet taken by the worker.
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
}

impl<S: Snapshot> Executor<S> for QueueExecutor<S> {
    fn submit(&self, job: Job<S>) -> Result<(), StoreError> {
        if self.cancel.is_cancelled() {
            return Err(StoreError::Closed);
        }
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.tx.send(job).map_err(|_| {
            self.depth.fetch_sub(1, Ordering::AcqRel);
            StoreError::Closed
        })
    }

    fn pending(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

/// Spawn the worker on `handle` and return the executor feeding it.
pub(crate) fn spawn_worker<S: Snapshot>(
    handle: &Handle,
    committer: Committer<S>,
    hub: Arc<Hub<S>>,
    cancel: CancellationToken,
) -> (QueueExecutor<S>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    let worker = handle.spawn(worker_task(
        committer,
        hub,
        rx,
        Arc::clone(&depth),
        cancel.clone(),
        cancel.clone().drop_guard(),
    ));
    (QueueExecutor { tx, depth, cancel }, worker)
}

async fn worker_task<S: Snapshot>(
    mut committer: Committer<S>,
    hub: Arc<Hub<S>>,
    mut rx: mpsc::UnboundedReceiver<Job<S>>,
    depth: Arc<AtomicUsize>,
    cancel: CancellationToken,
    // Owned by the future from creation: a worker that panics or is dropped
    // unpolled still closes the store.
    _closed_on_exit: DropGuard,
) {
    debug!(policy = %hub.policy(), "store worker started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            job = rx.recv() => {
                let Some(job) = job else { break };
                depth.fetch_sub(1, Ordering::AcqRel);
                let Some(snapshot) = committer.run(job) else { continue };
                // A stalled subscriber must not keep a cancelled store alive.
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = hub.publish(snapshot) => {}
                }
            }
        }
    }

    // Pending jobs are dropped, not applied. Readers awaiting a reply see
    // their oneshot close and report `Closed`.
    rx.close();
    let mut discarded = 0_usize;
    while let Ok(job) = rx.try_recv() {
        trace!(kind = job.kind(), "discarding queued job");
        depth.fetch_sub(1, Ordering::AcqRel);
        discarded += 1;
    }
    hub.close();
    debug!(discarded, "store worker stopped");
}
