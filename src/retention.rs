// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Retention policies decide whether a sealed log segment may be discarded.
//!
//! A [`RetentionPolicy`] is a pure decision function plus an accumulator
//! state threaded through successive evaluations. The vacuum task evaluates
//! the topic's policy against every sealed head segment, oldest first, and
//! trims until the policy first answers "retain".
//!
//! # Combinators
//!
//! Policies compose with [`and`], [`or`] and [`not`]. Combinators always
//! advance the state of *both* branches on every evaluation, even when the
//! outcome does not depend on one side -- a time- or count-based sub-policy
//! must observe every statistics snapshot to keep its internal state correct.
//!
//! # State erasure
//!
//! The public trait carries an associated `State` so built-in and custom
//! policies stay strongly typed. The topic configuration holds policies
//! behind the internal object-safe [`DynPolicy`], which erases the state as
//! `Box<dyn Any + Send>` -- the same trait-object seam the handle types use
//! elsewhere in the crate.

use std::any::Any;
use std::time::{Duration, Instant};

use crate::types::{Length, Offset};

/// Per-pass statistics about the log as a whole. Captured once per vacuum
/// pass and shared across every segment evaluation in that pass.
#[derive(Debug, Clone)]
pub struct LogStats {
    /// Virtual length of the log: messages ever appended.
    pub length: Length,
    /// The next-offset-to-read of every live cursor.
    pub cursor_offsets: Vec<Offset>,
}

/// Statistics about the segment under evaluation.
#[derive(Debug, Clone, Copy)]
pub struct SegmentStats {
    /// Offset of the segment's first entry.
    pub first_offset: Offset,
    /// Offset of the segment's last written entry.
    pub last_offset: Offset,
    /// Creation time of the first entry.
    pub first_timestamp: Instant,
    /// Creation time of the last entry.
    pub last_timestamp: Instant,
}

/// The full snapshot handed to [`RetentionPolicy::retain`].
#[derive(Debug)]
pub struct Statistics<'a> {
    /// Time the vacuum pass started.
    pub current_time: Instant,
    /// Log-wide statistics, memoized per pass.
    pub log: &'a LogStats,
    /// The segment currently under evaluation.
    pub segment: SegmentStats,
}

/// A rule deciding whether a sealed segment may be discarded.
pub trait RetentionPolicy: Send + Sync + 'static {
    /// Accumulator threaded through successive `retain` evaluations.
    type State: Send + 'static;

    /// The state a fresh topic starts from.
    fn initial_state(&self) -> Self::State;

    /// Returns `true` to keep the segment, `false` to allow discarding it.
    fn retain(&self, state: &mut Self::State, stats: &Statistics<'_>) -> bool;
}

// ---------------------------------------------------------------------------
// Built-in policies
// ---------------------------------------------------------------------------

/// Retains every message forever. The default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Permanent;

/// A policy where all messages are retained without consideration.
#[must_use]
pub fn permanent() -> Permanent {
    Permanent
}

impl RetentionPolicy for Permanent {
    type State = ();

    fn initial_state(&self) -> Self::State {}

    fn retain(&self, _state: &mut Self::State, _stats: &Statistics<'_>) -> bool {
        true
    }
}

/// Discards a segment once every live cursor has read past it.
///
/// A segment is kept while at least one live cursor's offset is still at or
/// before its last entry. Closed cursors leave the computation immediately,
/// so abandoning a slow consumer is what releases its backlog. With zero
/// live cursors every sealed segment is discardable -- there is nobody left
/// the backlog could be replayed to.
#[derive(Debug, Clone, Copy, Default)]
pub struct Consumed;

/// A policy that discards messages already consumed by every live consumer.
#[must_use]
pub fn consumed() -> Consumed {
    Consumed
}

impl RetentionPolicy for Consumed {
    type State = ();

    fn initial_state(&self) -> Self::State {}

    fn retain(&self, _state: &mut Self::State, stats: &Statistics<'_>) -> bool {
        stats
            .log
            .cursor_offsets
            .iter()
            .any(|offset| *offset <= stats.segment.last_offset)
    }
}

/// Retains only the most recent `count` messages' worth of segments.
#[derive(Debug, Clone, Copy)]
pub struct Counted {
    count: Length,
}

/// A policy that only retains the most recent `count` messages.
#[must_use]
pub fn counted(count: Length) -> Counted {
    Counted { count }
}

impl Counted {
    /// The number of most-recent messages retained.
    #[must_use]
    pub fn count(&self) -> Length {
        self.count
    }
}

impl RetentionPolicy for Counted {
    type State = ();

    fn initial_state(&self) -> Self::State {}

    fn retain(&self, _state: &mut Self::State, stats: &Statistics<'_>) -> bool {
        stats.segment.last_offset.as_u64() >= stats.log.length.saturating_sub(self.count)
    }
}

/// Retains only messages produced within the last `duration`.
#[derive(Debug, Clone, Copy)]
pub struct Timed {
    duration: Duration,
}

/// A policy that only retains messages produced in the last `duration`.
#[must_use]
pub fn timed(duration: Duration) -> Timed {
    Timed { duration }
}

impl Timed {
    /// The retention window.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl RetentionPolicy for Timed {
    type State = ();

    fn initial_state(&self) -> Self::State {}

    fn retain(&self, _state: &mut Self::State, stats: &Statistics<'_>) -> bool {
        stats
            .current_time
            .saturating_duration_since(stats.segment.last_timestamp)
            <= self.duration
    }
}

// ---------------------------------------------------------------------------
// Combinators
// ---------------------------------------------------------------------------

/// Negates the keep decision of its inner policy. State passes through
/// unchanged in shape.
#[derive(Debug, Clone, Copy)]
pub struct Not<P> {
    inner: P,
}

/// A policy that negates the retention logic of the supplied policy.
#[must_use]
pub fn not<P: RetentionPolicy>(policy: P) -> Not<P> {
    Not { inner: policy }
}

impl<P: RetentionPolicy> RetentionPolicy for Not<P> {
    type State = P::State;

    fn initial_state(&self) -> Self::State {
        self.inner.initial_state()
    }

    fn retain(&self, state: &mut Self::State, stats: &Statistics<'_>) -> bool {
        !self.inner.retain(state, stats)
    }
}

/// Keeps a segment only when both sub-policies keep it.
#[derive(Debug, Clone, Copy)]
pub struct And<L, R> {
    left: L,
    right: R,
}

/// A policy from which both sub-policies must request retention.
#[must_use]
pub fn and<L: RetentionPolicy, R: RetentionPolicy>(left: L, right: R) -> And<L, R> {
    And { left, right }
}

impl<L: RetentionPolicy, R: RetentionPolicy> RetentionPolicy for And<L, R> {
    type State = (L::State, R::State);

    fn initial_state(&self) -> Self::State {
        (self.left.initial_state(), self.right.initial_state())
    }

    fn retain(&self, state: &mut Self::State, stats: &Statistics<'_>) -> bool {
        // Both sides evaluate unconditionally; no short-circuiting.
        let keep_left = self.left.retain(&mut state.0, stats);
        let keep_right = self.right.retain(&mut state.1, stats);
        keep_left && keep_right
    }
}

/// Keeps a segment when either sub-policy keeps it.
#[derive(Debug, Clone, Copy)]
pub struct Or<L, R> {
    left: L,
    right: R,
}

/// A policy from which either sub-policy can request retention.
#[must_use]
pub fn or<L: RetentionPolicy, R: RetentionPolicy>(left: L, right: R) -> Or<L, R> {
    Or { left, right }
}

impl<L: RetentionPolicy, R: RetentionPolicy> RetentionPolicy for Or<L, R> {
    type State = (L::State, R::State);

    fn initial_state(&self) -> Self::State {
        (self.left.initial_state(), self.right.initial_state())
    }

    fn retain(&self, state: &mut Self::State, stats: &Statistics<'_>) -> bool {
        // Both sides evaluate unconditionally; no short-circuiting.
        let keep_left = self.left.retain(&mut state.0, stats);
        let keep_right = self.right.retain(&mut state.1, stats);
        keep_left || keep_right
    }
}

// ---------------------------------------------------------------------------
// State erasure -- lets TopicConfig hold any policy behind one Arc
// ---------------------------------------------------------------------------

/// Object-safe form of [`RetentionPolicy`] with the state boxed as `Any`.
pub(crate) trait DynPolicy: Send + Sync {
    fn initial_state(&self) -> Box<dyn Any + Send>;
    fn retain(&self, state: &mut (dyn Any + Send), stats: &Statistics<'_>) -> bool;
}

pub(crate) struct Erased<P>(pub(crate) P);

impl<P: RetentionPolicy> DynPolicy for Erased<P> {
    fn initial_state(&self) -> Box<dyn Any + Send> {
        Box::new(self.0.initial_state())
    }

    fn retain(&self, state: &mut (dyn Any + Send), stats: &Statistics<'_>) -> bool {
        match state.downcast_mut::<P::State>() {
            Some(state) => self.0.retain(state, stats),
            // The state always originates from this policy's initial_state.
            None => true,
        }
    }
}
