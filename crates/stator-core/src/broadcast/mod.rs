// ── Multicast hub ──
//
// One upstream (the committer) fanned out to N independent cursors.
// Conflated subscribers share a `watch` channel where every receiver keeps
// its own version cursor; buffered subscribers each own an `mpsc` queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream, WatchStream};
use tracing::trace;

use crate::config::OverflowPolicy;
use crate::snapshot::Snapshot;
use crate::stream::Cursor;

/// Delivery endpoint for one buffered subscriber.
enum Sink<S> {
    Unbounded(mpsc::UnboundedSender<Arc<S>>),
    Bounded(mpsc::Sender<Arc<S>>),
}

impl<S> Sink<S> {
    fn is_closed(&self) -> bool {
        match self {
            Self::Unbounded(tx) => tx.is_closed(),
            Self::Bounded(tx) => tx.is_closed(),
        }
    }

    /// Non-blocking delivery. Returns `false` once the subscriber is gone.
    /// Bounded sinks are fed by [`Hub::publish`] only.
    fn deliver_now(&self, snap: &Arc<S>) -> bool {
        match self {
            Self::Unbounded(tx) => tx.send(Arc::clone(snap)).is_ok(),
            Self::Bounded(tx) => !tx.is_closed(),
        }
    }
}

struct HubState<S> {
    current: Arc<S>,
    sinks: Vec<Sink<S>>,
    closed: bool,
}

/// Fan-out point between the committer and every live subscription.
pub(crate) struct Hub<S: Snapshot> {
    policy: OverflowPolicy,
    capacity: usize,
    /// Conflated cursors. Unused by the buffered policies.
    watch: watch::Sender<Arc<S>>,
    state: Mutex<HubState<S>>,
}

impl<S: Snapshot> Hub<S> {
    pub(crate) fn new(initial: Arc<S>, policy: OverflowPolicy, capacity: usize) -> Self {
        let (watch, _) = watch::channel(Arc::clone(&initial));
        Self {
            policy,
            capacity,
            watch,
            state: Mutex::new(HubState {
                current: initial,
                sinks: Vec::new(),
                closed: false,
            }),
        }
    }

    pub(crate) fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Open a new cursor. Its first item is the current snapshot.
    pub(crate) fn subscribe(&self) -> Cursor<S> {
        match self.policy {
            OverflowPolicy::Conflate => Cursor::Watch(WatchStream::new(self.watch.subscribe())),
            OverflowPolicy::BufferUnbounded => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.register(|current| {
                    let _ = tx.send(current);
                    Sink::Unbounded(tx)
                });
                Cursor::Unbounded(UnboundedReceiverStream::new(rx))
            }
            OverflowPolicy::SuspendPublisher => {
                let (tx, rx) = mpsc::channel(self.capacity);
                self.register(|current| {
                    // Fresh channel with capacity >= 1: cannot be full.
                    let _ = tx.try_send(current);
                    Sink::Bounded(tx)
                });
                Cursor::Bounded(ReceiverStream::new(rx))
            }
        }
    }

    /// Seed and register a buffered sink under the lock, so a concurrent
    /// publish either sees this sink or has already advanced `current`,
    /// never both or neither. Detached sinks are pruned here as well.
    fn register(&self, seed: impl FnOnce(Arc<S>) -> Sink<S>) {
        let mut state = self.state.lock();
        let sink = seed(Arc::clone(&state.current));
        if state.closed {
            return;
        }
        state.sinks.retain(|live| !live.is_closed());
        state.sinks.push(sink);
    }

    /// Publish without waiting. Used by every policy except
    /// `SuspendPublisher`, which always goes through [`publish`](Self::publish).
    pub(crate) fn publish_now(&self, snap: Arc<S>) {
        debug_assert_ne!(
            self.policy,
            OverflowPolicy::SuspendPublisher,
            "suspend-publisher hubs publish asynchronously"
        );
        if self.policy == OverflowPolicy::Conflate {
            self.watch.send_replace(snap);
            return;
        }

        let mut state = self.state.lock();
        state.current = Arc::clone(&snap);
        let before = state.sinks.len();
        state.sinks.retain(|sink| sink.deliver_now(&snap));
        let pruned = before - state.sinks.len();
        if pruned > 0 {
            trace!(pruned, "detached subscribers pruned");
        }
    }

    /// Publish, waiting for buffer space under `SuspendPublisher`.
    pub(crate) async fn publish(&self, snap: Arc<S>) {
        if self.policy != OverflowPolicy::SuspendPublisher {
            self.publish_now(snap);
            return;
        }

        let targets: Vec<mpsc::Sender<Arc<S>>> = {
            let mut state = self.state.lock();
            state.current = Arc::clone(&snap);
            state.sinks.retain(|sink| !sink.is_closed());
            state
                .sinks
                .iter()
                .filter_map(|sink| match sink {
                    Sink::Bounded(tx) => Some(tx.clone()),
                    Sink::Unbounded(_) => None,
                })
                .collect()
        };

        for tx in targets {
            if tx.send(Arc::clone(&snap)).await.is_err() {
                trace!("subscriber detached while publisher was waiting");
            }
        }
    }

    /// Number of cursors that can still receive snapshots. Zero once closed.
    pub(crate) fn subscriber_count(&self) -> usize {
        let state = self.state.lock();
        if state.closed {
            return 0;
        }
        if self.policy == OverflowPolicy::Conflate {
            return self.watch.receiver_count();
        }
        state.sinks.iter().filter(|sink| !sink.is_closed()).count()
    }

    /// Release every buffered sink. Cursors still drain what they hold.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.sinks.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::{FutureExt, StreamExt};
    use pretty_assertions::assert_eq;

    use super::*;

    fn ready_values(cursor: &mut Cursor<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(Some(v)) = cursor.next().now_or_never() {
            out.push(*v);
        }
        out
    }

    #[test]
    fn buffered_cursor_sees_current_then_every_publish() {
        let hub = Hub::new(Arc::new(1), OverflowPolicy::BufferUnbounded, 4);
        let mut cursor = hub.subscribe();
        for n in 2..=4 {
            hub.publish_now(Arc::new(n));
        }
        assert_eq!(ready_values(&mut cursor), vec![1, 2, 3, 4]);
    }

    #[test]
    fn late_buffered_cursor_starts_at_latest() {
        let hub = Hub::new(Arc::new(1), OverflowPolicy::BufferUnbounded, 4);
        hub.publish_now(Arc::new(2));
        let mut cursor = hub.subscribe();
        hub.publish_now(Arc::new(3));
        assert_eq!(ready_values(&mut cursor), vec![2, 3]);
    }

    #[tokio::test]
    async fn conflated_cursor_only_keeps_latest() {
        let hub = Hub::new(Arc::new(1), OverflowPolicy::Conflate, 4);
        let mut cursor = hub.subscribe();
        assert_eq!(*cursor.next().await.unwrap(), 1);

        for n in 2..=5 {
            hub.publish_now(Arc::new(n));
        }
        assert_eq!(*cursor.next().await.unwrap(), 5);
        assert!(cursor.next().now_or_never().is_none());
    }

    #[test]
    fn dropped_cursors_are_pruned() {
        let hub = Hub::new(Arc::new(0), OverflowPolicy::BufferUnbounded, 4);
        let keep = hub.subscribe();
        let gone = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        drop(gone);
        hub.publish_now(Arc::new(1));
        assert_eq!(hub.subscriber_count(), 1);
        drop(keep);
    }

    #[test]
    fn conflated_subscriber_count_tracks_receivers() {
        let hub = Hub::new(Arc::new(0), OverflowPolicy::Conflate, 4);
        let a = hub.subscribe();
        let b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);
        drop(a);
        assert_eq!(hub.subscriber_count(), 1);
        drop(b);
    }

    #[tokio::test]
    async fn suspend_publisher_waits_for_space() {
        let hub = Arc::new(Hub::new(Arc::new(0), OverflowPolicy::SuspendPublisher, 1));
        // Buffer already holds the initial snapshot.
        let mut cursor = hub.subscribe();

        let publisher = {
            let hub = Arc::clone(&hub);
            tokio::spawn(async move { hub.publish(Arc::new(1)).await })
        };
        tokio::task::yield_now().await;
        assert!(!publisher.is_finished());

        assert_eq!(*cursor.next().await.unwrap(), 0);
        publisher.await.unwrap();
        assert_eq!(*cursor.next().await.unwrap(), 1);
    }

    #[test]
    fn detached_cursors_are_pruned_on_subscribe() {
        let hub = Hub::new(Arc::new(0), OverflowPolicy::BufferUnbounded, 4);
        for _ in 0..10 {
            drop(hub.subscribe());
        }
        let _live = hub.subscribe();
        assert_eq!(hub.state.lock().sinks.len(), 1);
    }

    #[test]
    fn closed_hub_reports_no_subscribers_for_every_policy() {
        for policy in [
            OverflowPolicy::Conflate,
            OverflowPolicy::BufferUnbounded,
            OverflowPolicy::SuspendPublisher,
        ] {
            let hub = Hub::new(Arc::new(0), policy, 4);
            let _cursor = hub.subscribe();
            assert_eq!(hub.subscriber_count(), 1, "{policy}");
            hub.close();
            assert_eq!(hub.subscriber_count(), 0, "{policy}");
        }
    }

    #[test]
    fn close_releases_sinks() {
        let hub = Hub::new(Arc::new(0), OverflowPolicy::BufferUnbounded, 4);
        let mut cursor = hub.subscribe();
        hub.close();
        assert_eq!(hub.subscriber_count(), 0);
        // Buffered initial value drains, then the cursor ends.
        assert_eq!(*cursor.next().now_or_never().unwrap().unwrap(), 0);
        assert!(cursor.next().now_or_never().unwrap().is_none());
    }
}
