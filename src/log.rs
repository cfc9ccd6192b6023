// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! The segmented append-only log underneath every topic.
//!
//! Messages live in fixed-capacity segments linked head to tail. A segment is
//! *active* while it still accepts appends and seals irreversibly once full;
//! sealing bypasses its append lock, so reads of historical data never
//! contend with anything. Entry slots are write-once (`OnceLock`), which is
//! what makes the lock bypass sound: a sealed segment is immutable.
//!
//! Locking layout, hot path first:
//! - `virtual_length` / `start_offset` / segment `len` are atomics.
//! - reads take only the head pointer's read lock to snapshot the chain
//!   start, then walk `next` links lock-free.
//! - appends take the tail pointer's mutex plus the tail segment's
//!   [`InitialLock`].
//! - vacuum takes the head pointer's write lock and trims whole segments
//!   only, never entries inside an active segment.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use crate::sync::InitialLock;
use crate::types::{Length, Offset};

/// A single appended message plus its creation timestamp.
pub(crate) struct LogEntry<T> {
    pub(crate) msg: T,
    pub(crate) created_at: Instant,
}

/// A fixed-capacity, append-only run of log entries.
pub(crate) struct Segment<T> {
    lock: InitialLock,
    slots: Box<[OnceLock<LogEntry<T>>]>,
    len: AtomicU32,
    next: OnceLock<Arc<Segment<T>>>,
}

impl<T> Segment<T> {
    fn new(capacity: u32) -> Arc<Self> {
        let slots: Box<[OnceLock<LogEntry<T>>]> =
            (0..capacity).map(|_| OnceLock::new()).collect();
        Arc::new(Self {
            lock: InitialLock::new(),
            slots,
            len: AtomicU32::new(0),
            next: OnceLock::new(),
        })
    }

    pub(crate) fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    pub(crate) fn len(&self) -> u32 {
        self.len.load(Ordering::Acquire)
    }

    fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    /// An active segment still accepts appends and is never trimmed.
    pub(crate) fn is_active(&self) -> bool {
        !self.is_full()
    }

    fn next_segment(&self) -> Option<Arc<Segment<T>>> {
        self.next.get().cloned()
    }

    fn entry(&self, pos: u32) -> Option<&LogEntry<T>> {
        if pos < self.len() {
            self.slots[pos as usize].get()
        } else {
            None
        }
    }

    /// Creation timestamps of the first and last written entries. `None`
    /// only for an empty segment, which vacuum never evaluates.
    pub(crate) fn time_range(&self) -> Option<(Instant, Instant)> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let first = self.slots[0].get()?;
        let last = self.slots[(len - 1) as usize].get()?;
        Some((first.created_at, last.created_at))
    }

    /// Append into this segment, or seal it and append into a freshly linked
    /// successor. Returns the segment that received the entry.
    fn append(self: &Arc<Self>, entry: LogEntry<T>, capacity: u32) -> Arc<Segment<T>> {
        let _guard = self.lock.lock();
        let len = self.len.load(Ordering::Acquire);
        if len == self.capacity() {
            let next = Arc::clone(self.next.get_or_init(|| Segment::new(capacity)));
            // Sealed: no further mutation, so the lock is dead weight.
            self.lock.bypass();
            return next.append(entry, capacity);
        }
        let _ = self.slots[len as usize].set(entry);
        self.len.store(len + 1, Ordering::Release);
        Arc::clone(self)
    }
}

/// Owns the segment chain plus the logical position counters.
pub(crate) struct Log<T> {
    segment_capacity: u32,
    /// Logical offset of the head segment's first slot. Only ever increases.
    start_offset: AtomicU64,
    /// Messages ever appended, retained or not.
    virtual_length: AtomicU64,
    head: RwLock<Option<Arc<Segment<T>>>>,
    tail: Mutex<Option<Arc<Segment<T>>>>,
}

impl<T> Log<T> {
    pub(crate) fn new(segment_capacity: u32) -> Self {
        Self {
            segment_capacity,
            start_offset: AtomicU64::new(0),
            virtual_length: AtomicU64::new(0),
            head: RwLock::new(None),
            tail: Mutex::new(None),
        }
    }

    /// Oldest retained offset.
    pub(crate) fn start(&self) -> Offset {
        Offset::new(self.start_offset.load(Ordering::Acquire))
    }

    pub(crate) fn length(&self) -> Length {
        self.virtual_length.load(Ordering::Acquire)
    }

    /// Append a message to the tail, allocating and linking a new segment if
    /// the current tail is full.
    pub(crate) fn put(&self, msg: T) {
        let entry = LogEntry {
            msg,
            created_at: Instant::now(),
        };
        let mut tail = self.tail.lock();
        let current = match tail.as_ref() {
            Some(segment) => Arc::clone(segment),
            None => {
                // Empty log: the first segment is both head and tail.
                let segment = Segment::new(self.segment_capacity);
                *self.head.write() = Some(Arc::clone(&segment));
                *tail = Some(Arc::clone(&segment));
                segment
            }
        };
        let target = current.append(entry, self.segment_capacity);
        if !Arc::ptr_eq(&target, &current) {
            *tail = Some(target);
        }
        self.virtual_length.fetch_add(1, Ordering::Release);
    }

    /// Whether the head segment is sealed and therefore trimmable. Active
    /// segments are never trimmed, even if every entry is otherwise eligible.
    pub(crate) fn can_vacuum(&self) -> bool {
        self.head.read().as_ref().is_some_and(|head| !head.is_active())
    }

    /// Trim sealed segments from the head while `retain` answers `false`.
    ///
    /// The predicate receives each candidate segment along with the offset of
    /// its first entry (the log's start offset as it advances during this
    /// pass). Stops at the first active or retained segment. If everything is
    /// discarded the log becomes empty with its start offset advanced past
    /// the trimmed range.
    pub(crate) fn vacuum(&self, mut retain: impl FnMut(&Segment<T>, Offset) -> bool) {
        let mut head = self.head.write();
        while let Some(current) = head.clone() {
            let first_offset = self.start();
            if current.is_active() || retain(&current, first_offset) {
                return;
            }
            self.start_offset
                .fetch_add(u64::from(current.capacity()), Ordering::AcqRel);
            match current.next_segment() {
                Some(next) => *head = Some(next),
                None => {
                    let mut tail = self.tail.lock();
                    // An append may have linked a successor between the
                    // check above and taking the tail lock.
                    if let Some(next) = current.next_segment() {
                        *head = Some(next);
                        continue;
                    }
                    // Nothing left: both pointers drop to empty.
                    *head = None;
                    *tail = None;
                    return;
                }
            }
        }
    }
}

impl<T: Clone> Log<T> {
    /// Read the entry at `offset`, clamping expired offsets up to the oldest
    /// retained one. Returns the effective offset actually addressed and the
    /// message, or `None` if nothing is written there yet.
    pub(crate) fn get(&self, offset: Offset) -> (Offset, Option<T>) {
        let (effective, mut pos, mut current) = {
            let head = self.head.read();
            let start = self.start_offset.load(Ordering::Acquire);
            let clamped = offset.as_u64().max(start);
            (Offset::new(clamped), clamped - start, head.clone())
        };
        while let Some(segment) = current {
            let capacity = u64::from(segment.capacity());
            if pos >= capacity {
                pos -= capacity;
                current = segment.next_segment();
                continue;
            }
            return (effective, segment.entry(pos as u32).map(|e| e.msg.clone()));
        }
        (effective, None)
    }
}
