// ── Single-writer state store ──
//
// Cheaply cloneable handle over one committed snapshot. Writes go through
// the scheduler; reads either queue behind pending writes (`get`,
// `with_state`) or peek at the latest commit lock-free (`state`).

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use super::builder::StoreBuilder;
use crate::broadcast::Hub;
use crate::config::{OverflowPolicy, SchedulingMode, StoreConfig};
use crate::error::{StoreError, panic_message};
use crate::scheduler::{Executor, Job, ReadCell};
use crate::snapshot::Snapshot;
use crate::stream::Subscription;

/// Concurrent single-writer state container.
///
/// Mutators are applied one at a time, in the order `set` was called. A
/// result equal to the previous commit is discarded; every distinct result
/// is committed and broadcast to all subscribers.
///
/// Cheaply cloneable via `Arc<StoreInner>`. The store lives until its scope
/// is cancelled, [`close`](Self::close) is called, or the last handle is
/// dropped; at that point queued jobs are discarded and every subscription
/// completes.
pub struct Store<S: Snapshot> {
    inner: Arc<StoreInner<S>>,
}

pub(super) struct StoreInner<S: Snapshot> {
    pub(super) config: StoreConfig,
    pub(super) executor: Box<dyn Executor<S>>,
    pub(super) hub: Arc<Hub<S>>,
    pub(super) cell: Arc<ReadCell<S>>,
    pub(super) cancel: CancellationToken,
    pub(super) worker: Mutex<Option<JoinHandle<()>>>,
    /// Cancels `cancel` when the last handle goes away.
    pub(super) _guard: DropGuard,
}

impl<S: Snapshot> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Snapshot> Store<S> {
    /// Create a concurrent, conflating store bound to `scope`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(initial: S, scope: &CancellationToken) -> Result<Self, StoreError> {
        Self::builder(initial).build(scope)
    }

    /// Start configuring a store.
    pub fn builder(initial: S) -> StoreBuilder<S> {
        StoreBuilder::new(initial)
    }

    pub(super) fn from_inner(inner: StoreInner<S>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Queue a mutator. Never blocks.
    ///
    /// On a closed store the mutator is dropped (logged at debug level).
    /// Use [`try_set`](Self::try_set) to observe that case.
    pub fn set<F>(&self, mutator: F)
    where
        F: FnOnce(&S) -> S + Send + 'static,
    {
        if self.try_set(mutator).is_err() {
            debug!("set on closed store dropped");
        }
    }

    /// Queue a mutator, reporting [`StoreError::Closed`] if the store has
    /// shut down.
    pub fn try_set<F>(&self, mutator: F) -> Result<(), StoreError>
    where
        F: FnOnce(&S) -> S + Send + 'static,
    {
        self.inner.executor.submit(Job::Mutate(Box::new(mutator)))
    }

    /// Queue a fallible mutator. An `Err` leaves the state unchanged and is
    /// handed to the error sink as [`StoreError::MutatorFailed`].
    pub fn try_update<F, E>(&self, mutator: F) -> Result<(), StoreError>
    where
        F: FnOnce(&S) -> Result<S, E> + Send + 'static,
        E: fmt::Display,
    {
        self.inner
            .executor
            .submit(Job::TryMutate(Box::new(move |s: &S| {
                mutator(s).map_err(|e| e.to_string())
            })))
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Run `reader` against the committed snapshot after every mutation
    /// queued before it.
    ///
    /// In deterministic mode the reader has run by the time this returns,
    /// even when another thread is mid-mutation (this call waits for it).
    /// Called from inside a running mutator, the reader is queued and runs
    /// right after that mutator. In concurrent mode it runs on the worker; use
    /// [`with_state`](Self::with_state) to wait for it.
    pub fn get<F>(&self, reader: F)
    where
        F: FnOnce(&S) + Send + 'static,
    {
        if self
            .inner
            .executor
            .submit(Job::Read(Box::new(reader)))
            .is_err()
        {
            debug!("get on closed store dropped");
        }
    }

    /// Queue `reader` behind pending mutations and await its result.
    ///
    /// A panicking reader is reported here as
    /// [`StoreError::ReaderPanicked`]; it never reaches the error sink.
    pub async fn with_state<F, R>(&self, reader: F) -> Result<R, StoreError>
    where
        F: FnOnce(&S) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.inner.executor.submit(Job::Read(Box::new(move |s: &S| {
            let result = catch_unwind(AssertUnwindSafe(|| reader(s))).map_err(|payload| {
                StoreError::ReaderPanicked {
                    message: panic_message(payload.as_ref()),
                }
            });
            let _ = tx.send(result);
        })))?;

        rx.await.map_err(|_| StoreError::Closed)?
    }

    /// Latest committed snapshot, without waiting for queued mutations.
    pub fn state(&self) -> Arc<S> {
        self.inner.cell.load()
    }

    /// Number of commits since creation. The initial snapshot is version 0.
    pub fn version(&self) -> u64 {
        self.inner.cell.version()
    }

    /// Jobs submitted but not yet run.
    pub fn pending_jobs(&self) -> usize {
        self.inner.executor.pending()
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Subscribe to committed snapshots, starting with the current one.
    ///
    /// Each call returns an independent cursor.
    pub fn subscribe(&self) -> Subscription<S> {
        Subscription::new(self.inner.hub.subscribe(), &self.inner.cancel)
    }

    /// Live subscriptions. Zero once the store is closed, whatever the
    /// overflow policy.
    pub fn subscriber_count(&self) -> usize {
        if self.is_closed() {
            return 0;
        }
        self.inner.hub.subscriber_count()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Stop this store. Queued jobs are discarded and subscriptions
    /// complete; the parent scope is left untouched.
    pub fn close(&self) {
        self.inner.cancel.cancel();
    }

    /// Close and wait for the worker to exit.
    pub async fn shutdown(&self) {
        self.close();
        let worker = self.inner.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }

    /// Resolves once the store's scope is cancelled.
    pub async fn closed(&self) {
        self.inner.cancel.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// The token this store's lifetime is bound to (a child of the scope
    /// it was built with).
    pub fn scope(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    // ── Configuration ────────────────────────────────────────────

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> SchedulingMode {
        self.inner.config.mode
    }

    pub fn overflow_policy(&self) -> OverflowPolicy {
        self.inner.config.overflow
    }
}

impl<S: Snapshot + fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state())
            .field("version", &self.version())
            .field("mode", &self.inner.config.mode)
            .field("overflow", &self.inner.config.overflow)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
