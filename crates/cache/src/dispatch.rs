//! Deferred notification delivery on a single coordinator task
//!
//! Cache mutations happen on whatever thread detected the change; listener
//! callbacks must not. Mutating code enqueues notifications here, and one
//! coordinator task drains the queue, so listeners always observe a cache
//! state that is not mid-mutation and UI-affine observers need no extra
//! marshalling.

use crate::listeners::ListenerList;
use cvsmeta_vfs::NodeHandle;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

pub(crate) enum Notification {
    EntriesChanged(NodeHandle),
    EntryChanged(NodeHandle),
    /// Queue barrier: acknowledged once everything enqueued before it has
    /// been delivered
    Flush(oneshot::Sender<()>),
}

/// Single-consumer notification queue plus its coordinator task
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<Notification>,
    shutdown: CancellationToken,
}

impl Dispatcher {
    /// Spawn the coordinator task. Must be called inside a tokio runtime.
    pub fn start(listeners: Arc<ListenerList>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    notification = rx.recv() => match notification {
                        Some(notification) => Self::deliver(&listeners, notification),
                        None => break,
                    },
                }
            }
            debug!("Notification coordinator stopped");
        });

        Self { tx, shutdown }
    }

    fn deliver(listeners: &ListenerList, notification: Notification) {
        match notification {
            Notification::EntriesChanged(directory) => {
                // The handle may have gone invalid between enqueue and
                // delivery; stale notifications are dropped.
                if !directory.is_valid() {
                    trace!("Dropping entries-changed for invalidated {directory}");
                    return;
                }
                for listener in listeners.snapshot() {
                    listener.entries_changed(&directory);
                }
            }
            Notification::EntryChanged(file) => {
                if !file.is_valid() {
                    trace!("Dropping entry-changed for invalidated {file}");
                    return;
                }
                for listener in listeners.snapshot() {
                    listener.entry_changed(&file);
                }
            }
            Notification::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }

    pub fn entries_changed(&self, directory: NodeHandle) {
        let _ = self.tx.send(Notification::EntriesChanged(directory));
    }

    pub fn entry_changed(&self, file: NodeHandle) {
        let _ = self.tx.send(Notification::EntryChanged(file));
    }

    /// Wait until every notification enqueued before this call is delivered
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Notification::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
