// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Topic construction options.
//!
//! [`TopicBuilder`] applies options left to right and records the first
//! conflicting duplicate; the conflict surfaces as an error when the topic is
//! built, never by silently picking one of the two values. Each singleton
//! setting (segment capacity, backoff generator, retention policy) may be
//! supplied at most once.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::backoff::Backoff;
use crate::error::Error;
use crate::retention::{self, DynPolicy, Erased, RetentionPolicy};
use crate::types::Length;

/// Messages per segment when no option overrides it.
pub const DEFAULT_SEGMENT_CAPACITY: u32 = 32;

/// Validated construction-time settings of a topic.
pub(crate) struct TopicConfig {
    pub(crate) segment_capacity: u32,
    pub(crate) backoff: Backoff,
    pub(crate) retention: Arc<dyn DynPolicy>,
}

impl std::fmt::Debug for TopicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicConfig")
            .field("segment_capacity", &self.segment_capacity)
            .field("backoff", &self.backoff)
            .field("retention", &"<dyn DynPolicy>")
            .finish()
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            segment_capacity: DEFAULT_SEGMENT_CAPACITY,
            backoff: Backoff::default(),
            retention: Arc::new(Erased(retention::Permanent)),
        }
    }
}

/// Accumulates topic options before [`Topic::new`](crate::Topic::new) runs.
///
/// Obtained from [`Topic::builder`](crate::Topic::builder). The type
/// parameter fixes the message type of the topic being configured.
pub struct TopicBuilder<T> {
    segment_capacity: Option<u32>,
    backoff: Option<Backoff>,
    retention: Option<Arc<dyn DynPolicy>>,
    conflict: Option<Error>,
    _msg: PhantomData<fn() -> T>,
}

impl<T> Default for TopicBuilder<T> {
    fn default() -> Self {
        Self {
            segment_capacity: None,
            backoff: None,
            retention: None,
            conflict: None,
            _msg: PhantomData,
        }
    }
}

impl<T> TopicBuilder<T> {
    /// How many messages each log segment holds. Also the granularity of
    /// retention trimming.
    #[must_use]
    pub fn segment_capacity(mut self, capacity: u32) -> Self {
        if self.segment_capacity.is_some() {
            self.record_conflict(Error::SegmentCapacityAlreadySet);
        } else {
            self.segment_capacity = Some(capacity);
        }
        self
    }

    /// The idle-wait generator used by consumers and the vacuum task.
    #[must_use]
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        if self.backoff.is_some() {
            self.record_conflict(Error::BackoffAlreadySet);
        } else {
            self.backoff = Some(backoff);
        }
        self
    }

    /// The retention policy deciding which sealed segments survive vacuum
    /// passes.
    #[must_use]
    pub fn retention(mut self, policy: impl RetentionPolicy) -> Self {
        if self.retention.is_some() {
            self.record_conflict(Error::RetentionAlreadySet);
        } else {
            self.retention = Some(Arc::new(Erased(policy)));
        }
        self
    }

    /// Shorthand for `retention(retention::permanent())`.
    #[must_use]
    pub fn retain_permanently(self) -> Self {
        self.retention(retention::permanent())
    }

    /// Shorthand for `retention(retention::consumed())`.
    #[must_use]
    pub fn retain_consumed(self) -> Self {
        self.retention(retention::consumed())
    }

    /// Shorthand for `retention(retention::counted(count))`.
    #[must_use]
    pub fn retain_last(self, count: Length) -> Self {
        self.retention(retention::counted(count))
    }

    /// Shorthand for `retention(retention::timed(duration))`.
    #[must_use]
    pub fn retain_for(self, duration: Duration) -> Self {
        self.retention(retention::timed(duration))
    }

    fn record_conflict(&mut self, error: Error) {
        if self.conflict.is_none() {
            self.conflict = Some(error);
        }
    }

    pub(crate) fn into_config(self) -> Result<TopicConfig, Error> {
        if let Some(conflict) = self.conflict {
            return Err(conflict);
        }
        let segment_capacity = self.segment_capacity.unwrap_or(DEFAULT_SEGMENT_CAPACITY);
        if segment_capacity == 0 {
            return Err(Error::InvalidSegmentCapacity);
        }
        Ok(TopicConfig {
            segment_capacity,
            backoff: self.backoff.unwrap_or_default(),
            retention: self
                .retention
                .unwrap_or_else(|| Arc::new(Erased(retention::Permanent))),
        })
    }
}
