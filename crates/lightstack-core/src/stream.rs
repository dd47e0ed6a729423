// ── Reactive snapshot streams ──
//
// Subscription type for consuming stack snapshots from the controller.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::watch;
use tokio_stream::Stream;
use tokio_stream::wrappers::WatchStream;

use crate::controller::StackSnapshot;

/// A subscription to the controller's published snapshots.
///
/// Provides both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting to a `Stream`.
pub struct SnapshotStream {
    current: Arc<StackSnapshot>,
    receiver: watch::Receiver<Arc<StackSnapshot>>,
}

impl SnapshotStream {
    pub(crate) fn new(receiver: watch::Receiver<Arc<StackSnapshot>>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation time (or at the last `changed`).
    pub fn current(&self) -> &Arc<StackSnapshot> {
        &self.current
    }

    /// The latest snapshot, which may be newer than `current`.
    pub fn latest(&self) -> Arc<StackSnapshot> {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the controller is dropped.
    pub async fn changed(&mut self) -> Option<Arc<StackSnapshot>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    pub fn into_stream(self) -> SnapshotWatchStream {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current snapshot first, then one per change.
pub struct SnapshotWatchStream {
    inner: WatchStream<Arc<StackSnapshot>>,
}

impl Stream for SnapshotWatchStream {
    type Item = Arc<StackSnapshot>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
