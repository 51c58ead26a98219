//! Single-writer state container with ordered mutations and multicast
//! snapshot delivery.
//!
//! - **[`Store`]**: Cheaply cloneable façade owning one immutable snapshot.
//!   [`set()`](Store::set) queues a pure mutator, [`get()`](Store::get) and
//!   [`with_state()`](Store::with_state) queue a reader behind every pending
//!   mutation, and [`subscribe()`](Store::subscribe) opens a cursor over
//!   committed snapshots.
//!
//! - **Scheduler**: Mutators and readers share one FIFO. Exactly one party
//!   drains it: a spawned worker task ([`SchedulingMode::Concurrent`]) or the
//!   calling thread ([`SchedulingMode::Deterministic`], for tests). A result
//!   equal to the previous commit is dropped; failures go to an error sink
//!   and never stop the worker.
//!
//! - **[`Subscription`]**: Independent per-subscriber cursor. Starts with
//!   the current snapshot, then follows commits in order. Slow subscribers
//!   are handled per [`OverflowPolicy`]: conflate to the latest (default),
//!   buffer everything, or suspend the publisher.
//!
//! - **Lifecycle**: A store is bound to a child of a [`CancellationToken`]
//!   scope. Cancelling it discards queued jobs and completes every
//!   subscription.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod broadcast;
pub mod config;
pub mod error;
mod scheduler;
pub mod snapshot;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_SUBSCRIBER_CAPACITY, OverflowPolicy, SchedulingMode, StoreConfig};
pub use error::StoreError;
pub use scheduler::ErrorSink;
pub use snapshot::Snapshot;
pub use store::{Store, StoreBuilder};
pub use stream::Subscription;
