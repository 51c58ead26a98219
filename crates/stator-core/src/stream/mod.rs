// ── Snapshot subscriptions ──
//
// Subscription types for consuming committed snapshots from a Store.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream, WatchStream};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::snapshot::Snapshot;

/// Per-subscriber read position, one variant per overflow policy.
pub(crate) enum Cursor<S: Snapshot> {
    Watch(WatchStream<Arc<S>>),
    Unbounded(UnboundedReceiverStream<Arc<S>>),
    Bounded(ReceiverStream<Arc<S>>),
}

impl<S: Snapshot> Stream for Cursor<S> {
    type Item = Arc<S>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Every wrapped stream is Unpin, so the enum is too.
        match self.get_mut() {
            Self::Watch(inner) => Pin::new(inner).poll_next(cx),
            Self::Unbounded(inner) => Pin::new(inner).poll_next(cx),
            Self::Bounded(inner) => Pin::new(inner).poll_next(cx),
        }
    }
}

/// A live subscription to a store's committed snapshots.
///
/// Yields the snapshot current at subscribe time, then every later commit
/// in commit order (subject to the store's overflow policy). Never ends on
/// its own: it completes once the store's scope is cancelled. Dropping it
/// detaches the cursor without affecting the store or other subscribers.
pub struct Subscription<S: Snapshot> {
    cursor: Cursor<S>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    done: bool,
}

impl<S: Snapshot> Subscription<S> {
    pub(crate) fn new(cursor: Cursor<S>, scope: &CancellationToken) -> Self {
        Self {
            cursor,
            cancelled: Box::pin(scope.clone().cancelled_owned()),
            done: false,
        }
    }

    /// Wait for the next snapshot. `None` once the store has shut down.
    pub async fn next_snapshot(&mut self) -> Option<Arc<S>> {
        self.next().await
    }

    /// Detach from the store. Equivalent to dropping the subscription.
    pub fn cancel(self) {
        drop(self);
    }

    /// True once the subscription has yielded its final `None`.
    pub fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<S: Snapshot> Stream for Subscription<S> {
    type Item = Arc<S>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.done = true;
            return Poll::Ready(None);
        }
        match Pin::new(&mut this.cursor).poll_next(cx) {
            Poll::Ready(None) => {
                this.done = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<S: Snapshot> fmt::Debug for Subscription<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.cursor {
            Cursor::Watch(_) => "conflate",
            Cursor::Unbounded(_) => "buffer-unbounded",
            Cursor::Bounded(_) => "suspend-publisher",
        };
        f.debug_struct("Subscription")
            .field("policy", &kind)
            .field("done", &self.done)
            .finish()
    }
}
