// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-consumer read positions and the registry the topic keeps them in.
//!
//! A cursor is the only piece of consumer state the topic itself needs to
//! see: retention policies read the registered offsets to decide what is
//! still unconsumed. Each cursor also carries the ready signal its owning
//! consumer parks on; the topic rings it through the observer registry so an
//! idle consumer wakes without sitting out a full backoff delay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::sync::ReadySignal;
use crate::types::{Id, Offset};

/// A consumer's read position in the log, plus its wake-up doorbell.
pub(crate) struct Cursor {
    offset: AtomicU64,
    pub(crate) ready: ReadySignal,
}

impl Cursor {
    fn new(start: Offset) -> Arc<Self> {
        Arc::new(Self {
            offset: AtomicU64::new(start.as_u64()),
            ready: ReadySignal::new(),
        })
    }

    /// The next offset this consumer will read.
    pub(crate) fn offset(&self) -> Offset {
        Offset::new(self.offset.load(Ordering::Acquire))
    }

    /// Record the consumer's position. Written by the drain task only.
    pub(crate) fn store_offset(&self, offset: Offset) {
        self.offset.store(offset.as_u64(), Ordering::Release);
    }
}

/// All cursors currently registered with a topic.
#[derive(Default)]
pub(crate) struct CursorRegistry {
    cursors: RwLock<HashMap<Id, Arc<Cursor>>>,
}

impl CursorRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a new cursor starting at `start` and return it.
    pub(crate) fn register(&self, id: Id, start: Offset) -> Arc<Cursor> {
        let cursor = Cursor::new(start);
        self.cursors.write().insert(id, Arc::clone(&cursor));
        cursor
    }

    /// Drop a cursor. Its offset no longer participates in retention.
    pub(crate) fn deregister(&self, id: &Id) {
        self.cursors.write().remove(id);
    }

    /// Snapshot of every registered read position.
    pub(crate) fn offsets(&self) -> Vec<Offset> {
        self.cursors.read().values().map(|c| c.offset()).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.cursors.read().len()
    }
}
