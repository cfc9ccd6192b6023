// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! The topic orchestrator: log, cursors, observers and the vacuum task.
//!
//! A [`Topic`] ties the segmented log to the handles attached to it. Appends
//! go through [`TopicInner::put`], which fans out to the observer registry
//! (every consumer's ready signal plus the vacuum task's own). Reads go
//! through [`TopicInner::get`], which nudges the vacuum signal so retention
//! progress tracks consumption.
//!
//! One long-lived vacuum task is spawned per topic. It parks on its ready
//! signal with a backoff-bounded timeout, trims whatever the retention policy
//! releases, and exits on its own once every handle to the topic internals is
//! gone. It holds the internals weakly, so an abandoned topic does not stay
//! alive just because its vacuum task does.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::backoff::Backoff;
use crate::config::{TopicBuilder, TopicConfig};
use crate::consumer::Consumer;
use crate::cursor::{Cursor, CursorRegistry};
use crate::error::Error;
use crate::log::Log;
use crate::producer::Producer;
use crate::retention::{LogStats, SegmentStats, Statistics};
use crate::sync::ReadySignal;
use crate::types::{Id, Length, Offset};

type Observer = Box<dyn Fn() + Send + Sync>;
type RetentionState = Mutex<Box<dyn std::any::Any + Send>>;

/// An ordered, multi-consumer, retention-bounded in-process message stream.
///
/// Producers append to a shared segmented log; every consumer replays the
/// stream independently from the offset in effect at its creation. Cloning
/// the handle is cheap and refers to the same stream.
///
/// Construction spawns the background vacuum task, so a tokio runtime must
/// be current.
#[derive(Clone)]
pub struct Topic<T> {
    inner: Arc<TopicInner<T>>,
}

impl<T: Clone + Send + Sync + 'static> Topic<T> {
    /// A topic with default settings: permanent retention, segment capacity
    /// 32, fibonacci backoff.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(TopicConfig::default())
    }

    /// Start configuring a topic.
    #[must_use]
    pub fn builder() -> TopicBuilder<T> {
        TopicBuilder::default()
    }

    pub(crate) fn with_config(config: TopicConfig) -> Self {
        let retention_state = Mutex::new(config.retention.initial_state());
        let inner = Arc::new(TopicInner {
            log: Log::new(config.segment_capacity),
            config,
            cursors: CursorRegistry::new(),
            observers: RwLock::new(HashMap::new()),
            retention_state,
            vacuum_ready: Arc::new(ReadySignal::new()),
        });
        inner.start_vacuum();
        Self { inner }
    }

    /// Attach a new producer. Its forwarding task starts immediately.
    #[must_use]
    pub fn producer(&self) -> Producer<T> {
        Producer::attach(Arc::clone(&self.inner))
    }

    /// Attach a new consumer positioned at the oldest retained offset. Its
    /// drain task starts immediately.
    #[must_use]
    pub fn consumer(&self) -> Consumer<T> {
        Consumer::attach(Arc::clone(&self.inner))
    }

    /// Messages ever appended to this topic, retained or not.
    #[must_use]
    pub fn length(&self) -> Length {
        self.inner.log.length()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Topic<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> TopicBuilder<T> {
    /// Validate the accumulated options and construct the topic.
    ///
    /// Fails if any singleton option was supplied twice or the segment
    /// capacity is zero.
    pub fn build(self) -> Result<Topic<T>, Error> {
        Ok(Topic::with_config(self.into_config()?))
    }
}

/// Shared topic internals. Every handle and background task works through an
/// `Arc` of this; the vacuum task alone holds it weakly.
pub(crate) struct TopicInner<T> {
    config: TopicConfig,
    log: Log<T>,
    cursors: CursorRegistry,
    observers: RwLock<HashMap<Id, Observer>>,
    retention_state: RetentionState,
    vacuum_ready: Arc<ReadySignal>,
}

impl<T> TopicInner<T> {
    pub(crate) fn backoff(&self) -> Backoff {
        self.config.backoff
    }

    /// Append a message and wake every observer.
    pub(crate) fn put(&self, msg: T) {
        self.log.put(msg);
        for callback in self.observers.read().values() {
            callback();
        }
    }

    /// Register a consumer: a cursor at the oldest retained offset plus an
    /// observer ringing the cursor's ready signal on every append. The signal
    /// is pre-notified when backlog already exists, so a brand-new consumer
    /// does not sit out a full backoff cycle before its first read.
    pub(crate) fn register_consumer(&self, id: Id) -> Arc<Cursor> {
        let start = self.log.start();
        let cursor = self.cursors.register(id, start);
        let doorbell = Arc::clone(&cursor);
        self.observers
            .write()
            .insert(id, Box::new(move || doorbell.ready.notify()));
        if self.log.length() > start.as_u64() {
            cursor.ready.notify();
        }
        cursor
    }

    /// Remove a consumer's cursor and observer. From this point its unread
    /// backlog no longer holds segments back from retention.
    pub(crate) fn deregister_consumer(&self, id: &Id) {
        self.cursors.deregister(id);
        self.observers.write().remove(id);
    }

    /// Run one vacuum pass if the head segment is sealed. Returns whether a
    /// pass ran, releasable or not.
    fn vacuum(&self) -> bool {
        if !self.log.can_vacuum() {
            return false;
        }
        // Memoized per pass; only the segment under evaluation varies.
        let log_stats = LogStats {
            length: self.log.length(),
            cursor_offsets: self.cursors.offsets(),
        };
        let now = Instant::now();
        let mut state = self.retention_state.lock();
        self.log.vacuum(|segment, first_offset| {
            let (first_timestamp, last_timestamp) =
                segment.time_range().unwrap_or((now, now));
            let stats = Statistics {
                current_time: now,
                log: &log_stats,
                segment: SegmentStats {
                    first_offset,
                    last_offset: Offset::new(
                        first_offset.as_u64() + u64::from(segment.len()) - 1,
                    ),
                    first_timestamp,
                    last_timestamp,
                },
            };
            let keep = self.config.retention.retain(&mut **state, &stats);
            if !keep {
                tracing::debug!(
                    first_offset = %first_offset,
                    entries = segment.len(),
                    "trimming segment"
                );
            }
            keep
        });
        true
    }
}

impl<T: Clone + Send + Sync + 'static> TopicInner<T> {
    /// Read the entry at `offset`, clamping past trimmed history. Every read
    /// also nudges the vacuum task, since consumption is what typically makes
    /// segments releasable.
    pub(crate) fn get(&self, offset: Offset) -> (Offset, Option<T>) {
        let result = self.log.get(offset);
        self.vacuum_ready.notify();
        result
    }

    fn start_vacuum(self: &Arc<Self>) {
        let ready = Arc::clone(&self.vacuum_ready);
        let doorbell = Arc::clone(&ready);
        self.observers
            .write()
            .insert(Id::new(), Box::new(move || doorbell.notify()));
        tokio::spawn(vacuum_loop(
            Arc::downgrade(self),
            ready,
            self.config.backoff,
        ));
    }
}

/// Background reclamation loop. Parks on the vacuum ready signal bounded by
/// the topic's backoff sequence; the sequence restarts only when a pass
/// actually ran, so a quiet topic settles at the ceiling.
async fn vacuum_loop<T: Clone + Send + Sync + 'static>(
    inner: Weak<TopicInner<T>>,
    ready: Arc<ReadySignal>,
    backoff: Backoff,
) {
    let mut seq = backoff.sequence();
    loop {
        let delay = seq.next_delay();
        tokio::select! {
            _ = ready.wait() => {}
            _ = tokio::time::sleep(delay) => {}
        }
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.vacuum() {
            seq = backoff.sequence();
        }
    }
}
