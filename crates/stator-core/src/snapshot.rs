// ── Snapshot bound ──
//
// A snapshot is the entire observable state at one instant. The store only
// needs to clone it, compare it by value, and share it across threads.

/// Marker for values a [`Store`](crate::Store) can hold.
///
/// Blanket-implemented for every `Clone + PartialEq + Send + Sync + 'static`
/// type. Committed snapshots are handed out as `Arc<S>` and never mutated;
/// a mutator always returns a fresh value.
pub trait Snapshot: Clone + PartialEq + Send + Sync + 'static {}

impl<T> Snapshot for T where T: Clone + PartialEq + Send + Sync + 'static {}
