// ── Store construction ──

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::state_store::{Store, StoreInner};
use crate::broadcast::Hub;
use crate::config::{OverflowPolicy, SchedulingMode, StoreConfig};
use crate::error::StoreError;
use crate::scheduler::{
    Committer, ErrorSink, Executor, InlineExecutor, ReadCell, log_error_sink, spawn_worker,
};
use crate::snapshot::Snapshot;

/// Configures and creates a [`Store`].
///
/// ```no_run
/// # use stator_core::{OverflowPolicy, Store};
/// # use tokio_util::sync::CancellationToken;
/// # async fn demo() -> Result<(), stator_core::StoreError> {
/// let scope = CancellationToken::new();
/// let store = Store::builder(0_u32)
///     .overflow(OverflowPolicy::BufferUnbounded)
///     .build(&scope)?;
/// store.set(|n| n + 1);
/// # Ok(())
/// # }
/// ```
pub struct StoreBuilder<S: Snapshot> {
    initial: S,
    config: StoreConfig,
    errors: Option<ErrorSink>,
}

impl<S: Snapshot> StoreBuilder<S> {
    pub(crate) fn new(initial: S) -> Self {
        Self {
            initial,
            config: StoreConfig::default(),
            errors: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn mode(mut self, mode: SchedulingMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Shorthand for [`SchedulingMode::Deterministic`].
    pub fn deterministic(self) -> Self {
        self.mode(SchedulingMode::Deterministic)
    }

    pub fn overflow(mut self, policy: OverflowPolicy) -> Self {
        self.config.overflow = policy;
        self
    }

    pub fn subscriber_capacity(mut self, capacity: usize) -> Self {
        self.config.subscriber_capacity = capacity;
        self
    }

    /// Where mutator and reader failures go. Defaults to a `tracing` warning.
    pub fn error_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(StoreError) + Send + Sync + 'static,
    {
        self.errors = Some(Arc::new(sink));
        self
    }

    /// Create the store, bound to a child of `scope`.
    ///
    /// Concurrent mode spawns the worker on the current tokio runtime and
    /// fails with [`StoreError::NoRuntime`] outside one. Deterministic mode
    /// needs no runtime.
    pub fn build(self, scope: &CancellationToken) -> Result<Store<S>, StoreError> {
        let Self {
            initial,
            config,
            errors,
        } = self;
        config.validate()?;

        let cancel = scope.child_token();
        let cell = Arc::new(ReadCell::new(Arc::new(initial)));
        let hub = Arc::new(Hub::new(
            cell.load(),
            config.overflow,
            config.subscriber_capacity,
        ));
        let committer = Committer::new(Arc::clone(&cell), errors.unwrap_or_else(log_error_sink));

        let (executor, worker): (Box<dyn Executor<S>>, _) = match config.mode {
            SchedulingMode::Concurrent => {
                let handle = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
                let (executor, worker) =
                    spawn_worker(&handle, committer, Arc::clone(&hub), cancel.clone());
                (Box::new(executor), Some(worker))
            }
            SchedulingMode::Deterministic => (
                Box::new(InlineExecutor::new(committer, Arc::clone(&hub), cancel.clone())),
                None,
            ),
        };

        debug!(mode = %config.mode, overflow = %config.overflow, "store created");

        Ok(Store::from_inner(StoreInner {
            config,
            executor,
            hub,
            cell,
            worker: Mutex::new(worker),
            _guard: cancel.clone().drop_guard(),
            cancel,
        }))
    }
}
