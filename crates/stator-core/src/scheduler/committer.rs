// ── Commit slot ──
//
// Owns the last committed snapshot. Only the party draining the job queue
// ever holds a `Committer`, so writes are single-threaded by construction;
// everyone else reads through the lock-free `ReadCell`.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use tracing::{trace, warn};

use super::{ErrorSink, Job};
use crate::error::{StoreError, panic_message};
use crate::snapshot::Snapshot;

/// Latest commit, readable from any thread without locking.
pub(crate) struct ReadCell<S> {
    snapshot: ArcSwap<S>,
    version: AtomicU64,
}

impl<S> ReadCell<S> {
    pub(crate) fn new(initial: Arc<S>) -> Self {
        Self {
            snapshot: ArcSwap::new(initial),
            version: AtomicU64::new(0),
        }
    }

    pub(crate) fn load(&self) -> Arc<S> {
        self.snapshot.load_full()
    }

    pub(crate) fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    fn store(&self, snapshot: Arc<S>, version: u64) {
        self.snapshot.store(snapshot);
        self.version.store(version, Ordering::Release);
    }
}

/// The single writer. Applies jobs and decides what gets committed.
pub(crate) struct Committer<S: Snapshot> {
    current: Arc<S>,
    version: u64,
    cell: Arc<ReadCell<S>>,
    errors: ErrorSink,
}

impl<S: Snapshot> Committer<S> {
    pub(crate) fn new(cell: Arc<ReadCell<S>>, errors: ErrorSink) -> Self {
        Self {
            current: cell.load(),
            version: cell.version(),
            cell,
            errors,
        }
    }

    /// Run one job against the committed snapshot.
    ///
    /// Returns the new snapshot when the job produced a value different from
    /// the previous commit. Failing jobs are reported and leave the committed
    /// snapshot untouched.
    pub(crate) fn run(&mut self, job: Job<S>) -> Option<Arc<S>> {
        let current = Arc::clone(&self.current);
        match job {
            Job::Mutate(mutator) => match catch_unwind(AssertUnwindSafe(|| mutator(current.as_ref()))) {
                Ok(next) => self.commit(next),
                Err(payload) => {
                    self.report(StoreError::MutatorPanicked {
                        message: panic_message(payload.as_ref()),
                    });
                    None
                }
            },
            Job::TryMutate(mutator) => match catch_unwind(AssertUnwindSafe(|| mutator(current.as_ref()))) {
                Ok(Ok(next)) => self.commit(next),
                Ok(Err(message)) => {
                    self.report(StoreError::MutatorFailed { message });
                    None
                }
                Err(payload) => {
                    self.report(StoreError::MutatorPanicked {
                        message: panic_message(payload.as_ref()),
                    });
                    None
                }
            },
            Job::Read(reader) => {
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| reader(current.as_ref()))) {
                    self.report(StoreError::ReaderPanicked {
                        message: panic_message(payload.as_ref()),
                    });
                }
                None
            }
        }
    }

    fn commit(&mut self, next: S) -> Option<Arc<S>> {
        let unchanged = match catch_unwind(AssertUnwindSafe(|| next == *self.current)) {
            Ok(unchanged) => unchanged,
            Err(payload) => {
                self.report(StoreError::MutatorPanicked {
                    message: panic_message(payload.as_ref()),
                });
                return None;
            }
        };
        if unchanged {
            trace!(version = self.version, "mutation produced an equal snapshot; skipped");
            return None;
        }
        let next = Arc::new(next);
        self.version += 1;
        self.current = Arc::clone(&next);
        self.cell.store(Arc::clone(&next), self.version);
        trace!(version = self.version, "snapshot committed");
        Some(next)
    }

    /// Hand a failure to the sink. A panicking sink is logged and ignored.
    fn report(&self, err: StoreError) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| (self.errors)(err))) {
            warn!(
                panic = %panic_message(payload.as_ref()),
                "error sink panicked; failure dropped"
            );
        }
    }
}
