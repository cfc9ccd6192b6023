// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! The producer handle and its forwarding task.
//!
//! A producer accepts messages on a capacity-one conduit; a dedicated task
//! moves them into the topic log and fires the observer fan-out. The conduit
//! gives callers natural backpressure against the append path and lets
//! `close()` take effect between messages rather than mid-append.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::diag::InstantiationTrace;
use crate::error::Error;
use crate::sync::Closer;
use crate::topic::TopicInner;
use crate::types::Id;

/// A write handle attached to a topic.
///
/// Dropping an unclosed producer closes it; with leak diagnostics enabled
/// the drop also logs the instantiation backtrace.
pub struct Producer<T> {
    id: Id,
    tx: mpsc::Sender<T>,
    closer: Arc<Closer>,
    trace: Option<InstantiationTrace>,
}

impl<T: Clone + Send + Sync + 'static> Producer<T> {
    pub(crate) fn attach(inner: Arc<TopicInner<T>>) -> Self {
        let id = Id::new();
        let (tx, rx) = mpsc::channel(1);
        let closer = Arc::new(Closer::new());
        tokio::spawn(forward_loop(inner, rx, Arc::clone(&closer)));
        Self {
            id,
            tx,
            closer,
            trace: InstantiationTrace::capture("producer", id),
        }
    }

    /// The producer's opaque identifier.
    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Send a message, waiting for conduit space. Returns whether the message
    /// was accepted; `false` means the producer is closed.
    pub async fn send(&self, msg: T) -> bool {
        if self.closer.is_closed() {
            return false;
        }
        self.tx.send(msg).await.is_ok()
    }

    /// Like [`send`](Self::send), but treats a closed producer as a
    /// programming error.
    ///
    /// # Panics
    ///
    /// Panics if the producer is closed.
    pub async fn must_send(&self, msg: T) {
        assert!(self.send(msg).await, "{}", Error::ProducerClosed);
    }

    /// A clone of the underlying send conduit, for callers integrating with
    /// `select!` or fan-in patterns directly. Sends through it stop being
    /// drained once the producer closes.
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<T> {
        self.tx.clone()
    }

    /// Stop accepting sends. Messages already accepted into the conduit are
    /// still appended. Idempotent in effect; the second call reports the
    /// handle was already closed.
    pub fn close(&self) -> Result<(), Error> {
        if self.closer.close() {
            Ok(())
        } else {
            Err(Error::ProducerClosed)
        }
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        if self.closer.close() {
            if let Some(trace) = &self.trace {
                trace.warn_leak();
            }
        }
    }
}

/// Moves conduit messages into the log until closed, then drains whatever
/// the conduit already accepted so a close racing a send never loses the
/// message.
async fn forward_loop<T: Clone + Send + Sync + 'static>(
    inner: Arc<TopicInner<T>>,
    mut rx: mpsc::Receiver<T>,
    closer: Arc<Closer>,
) {
    loop {
        tokio::select! {
            _ = closer.closed() => break,
            msg = rx.recv() => match msg {
                Some(msg) => inner.put(msg),
                None => return,
            },
        }
    }
    rx.close();
    while let Ok(msg) = rx.try_recv() {
        inner.put(msg);
    }
}
