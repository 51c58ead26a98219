// ── Mutation scheduler ──
//
// Serializes every state transition. Mutators and readers share one FIFO,
// so a reader queued behind N mutators observes all N. The queue is drained
// by exactly one party at a time: a spawned worker task (concurrent mode) or
// whichever caller currently holds the inline trampoline (deterministic mode).

mod committer;
mod inline;
mod queue;

use std::sync::Arc;

use tracing::warn;

use crate::error::StoreError;
use crate::snapshot::Snapshot;

pub(crate) use committer::{Committer, ReadCell};
pub(crate) use inline::InlineExecutor;
pub(crate) use queue::spawn_worker;

/// Pure transformation producing the next snapshot.
pub(crate) type Mutator<S> = Box<dyn FnOnce(&S) -> S + Send>;

/// Fallible transformation; the error message goes to the error sink.
pub(crate) type TryMutator<S> = Box<dyn FnOnce(&S) -> Result<S, String> + Send>;

/// Callback invoked once with the committed snapshot.
pub(crate) type Reader<S> = Box<dyn FnOnce(&S) + Send>;

/// Receives mutator and reader failures. The worker keeps running.
pub type ErrorSink = Arc<dyn Fn(StoreError) + Send + Sync>;

/// Default sink: log and continue.
pub(crate) fn log_error_sink() -> ErrorSink {
    Arc::new(|err: StoreError| {
        warn!(error = %err, "store job failed (non-fatal)");
    })
}

/// One queued unit of work.
pub(crate) enum Job<S: Snapshot> {
    Mutate(Mutator<S>),
    TryMutate(TryMutator<S>),
    Read(Reader<S>),
}

impl<S: Snapshot> Job<S> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Mutate(_) => "mutate",
            Self::TryMutate(_) => "try-mutate",
            Self::Read(_) => "read",
        }
    }
}

/// Scheduling strategy selected at construction.
pub(crate) trait Executor<S: Snapshot>: Send + Sync {
    /// Queue a job behind everything submitted before it.
    ///
    /// Never blocks. Fails with [`StoreError::Closed`] once the store's
    /// scope has been cancelled.
    fn submit(&self, job: Job<S>) -> Result<(), StoreError>;

    /// Number of jobs waiting to run.
    fn pending(&self) -> usize;
}
