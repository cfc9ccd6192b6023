// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

/// Errors produced by topic construction and handle lifecycle operations.
///
/// Per-operation "nothing yet" conditions are not errors -- reads simply
/// report absence -- so the taxonomy here is small: configuration conflicts
/// surfaced at construction time, and already-closed reports from idempotent
/// `close()` calls.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// A second backoff generator option was supplied for the same topic.
    #[error("backoff generator already set in topic")]
    BackoffAlreadySet,
    /// A second retention policy option was supplied for the same topic.
    #[error("retention policy already set in topic")]
    RetentionAlreadySet,
    /// A second segment capacity option was supplied for the same topic.
    #[error("segment capacity already set in topic")]
    SegmentCapacityAlreadySet,
    /// Segment capacity must be non-zero.
    #[error("segment capacity must be non-zero")]
    InvalidSegmentCapacity,
    /// `close()` was called on an already-closed producer, or a send was
    /// escalated through `must_send`.
    #[error("producer is closed")]
    ProducerClosed,
    /// `close()` was called on an already-closed consumer, or a receive was
    /// escalated through `must_recv`.
    #[error("consumer is closed")]
    ConsumerClosed,
}
