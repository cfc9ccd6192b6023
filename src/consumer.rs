// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! The consumer handle and its drain task.
//!
//! Each consumer owns a cursor into the topic log and a background task that
//! walks it: read the entry at the cursor, offer it on the capacity-one
//! delivery conduit, advance only once the caller has taken it. Offers are
//! bounded by the backoff delay so a consumer nobody reads from still yields
//! the task and keeps its cursor honest for retention. When the log has
//! nothing new the task parks on the cursor's ready signal, again bounded by
//! backoff, so delivery latency never exceeds the backoff ceiling even if a
//! notification is missed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

use crate::cursor::Cursor;
use crate::diag::InstantiationTrace;
use crate::error::Error;
use crate::sync::Closer;
use crate::topic::TopicInner;
use crate::types::Id;

/// A read handle attached to a topic, replaying the stream in offset order
/// from the position in effect when it was created.
///
/// Dropping an unclosed consumer closes it; with leak diagnostics enabled
/// the drop also logs the instantiation backtrace.
pub struct Consumer<T> {
    id: Id,
    inner: Arc<TopicInner<T>>,
    rx: mpsc::Receiver<T>,
    closer: Arc<Closer>,
    trace: Option<InstantiationTrace>,
}

impl<T: Clone + Send + Sync + 'static> Consumer<T> {
    pub(crate) fn attach(inner: Arc<TopicInner<T>>) -> Self {
        let id = Id::new();
        let cursor = inner.register_consumer(id);
        let (tx, rx) = mpsc::channel(1);
        let closer = Arc::new(Closer::new());
        tokio::spawn(drain_loop(
            Arc::clone(&inner),
            cursor,
            Arc::clone(&closer),
            tx,
        ));
        Self {
            id,
            inner,
            rx,
            closer,
            trace: InstantiationTrace::capture("consumer", id),
        }
    }

    /// The consumer's opaque identifier.
    #[must_use]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Receive the next message, waiting for one to arrive. Returns `None`
    /// once the consumer is closed and its conduit drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Receive the next message, giving up after `timeout`. A zero timeout
    /// checks the conduit once without waiting.
    pub async fn poll(&mut self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Like [`recv`](Self::recv), but treats a closed consumer as a
    /// programming error.
    ///
    /// # Panics
    ///
    /// Panics if the consumer is closed before a message arrives.
    pub async fn must_recv(&mut self) -> T {
        match self.recv().await {
            Some(msg) => msg,
            None => panic!("{}", Error::ConsumerClosed),
        }
    }

    /// Direct access to the delivery conduit, for callers integrating with
    /// `select!` directly.
    pub fn receiver(&mut self) -> &mut mpsc::Receiver<T> {
        &mut self.rx
    }

    /// Stop the drain task and deregister the cursor, releasing this
    /// consumer's unread backlog to the retention policy. Idempotent in
    /// effect; the second call reports the handle was already closed.
    pub fn close(&self) -> Result<(), Error> {
        if !self.closer.close() {
            return Err(Error::ConsumerClosed);
        }
        self.inner.deregister_consumer(&self.id);
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        if self.closer.close() {
            self.inner.deregister_consumer(&self.id);
            if let Some(trace) = &self.trace {
                trace.warn_leak();
            }
        }
    }
}

/// Walks the cursor and feeds the delivery conduit until closed.
///
/// The cursor's stored offset always reflects the next entry this consumer
/// will take, clamped past trimmed history, so the retention policy sees an
/// accurate read position even while the consumer idles.
async fn drain_loop<T: Clone + Send + Sync + 'static>(
    inner: Arc<TopicInner<T>>,
    cursor: Arc<Cursor>,
    closer: Arc<Closer>,
    tx: mpsc::Sender<T>,
) {
    let backoff = inner.backoff();
    let mut seq = backoff.sequence();
    loop {
        if closer.is_closed() {
            // Dropping the sender closes the conduit for the caller.
            return;
        }
        let (effective, msg) = inner.get(cursor.offset());
        cursor.store_offset(effective);
        match msg {
            Some(msg) => {
                let delay = seq.next_delay();
                tokio::select! {
                    _ = closer.closed() => return,
                    sent = tx.send_timeout(msg, delay) => match sent {
                        Ok(()) => {
                            cursor.store_offset(effective.next());
                            seq = backoff.sequence();
                        }
                        // Nobody took the entry in time; re-offer it next
                        // iteration without advancing.
                        Err(SendTimeoutError::Timeout(_)) => {}
                        Err(SendTimeoutError::Closed(_)) => return,
                    },
                }
            }
            None => {
                let delay = seq.next_delay();
                tokio::select! {
                    _ = closer.closed() => return,
                    _ = tx.closed() => return,
                    _ = cursor.ready.wait() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
