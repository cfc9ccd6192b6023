// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Idle-polling backoff generators.
//!
//! A [`Backoff`] describes a restartable sequence of increasing wait
//! durations. Consumers and the vacuum task draw from a [`BackoffSequence`]
//! while idle and restart it (via [`Backoff::sequence`]) whenever real work
//! happens, so an active topic polls tightly and an idle one settles at the
//! sequence ceiling instead of busy-spinning.

use std::time::Duration;

const DEFAULT_UNIT: Duration = Duration::from_micros(1);
const DEFAULT_MAX: Duration = Duration::from_millis(125);

/// A restartable sequence of increasing idle-wait durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Every delay is the same fixed duration.
    Fixed(Duration),
    /// Delays follow the fibonacci sequence starting at `unit`, capped at
    /// `max`.
    Fibonacci {
        /// First delay and the step the sequence grows from.
        unit: Duration,
        /// Ceiling returned once the sequence would exceed it.
        max: Duration,
    },
}

impl Backoff {
    /// Start (or restart) the sequence from its first delay.
    #[must_use]
    pub fn sequence(&self) -> BackoffSequence {
        match *self {
            Backoff::Fixed(delay) => BackoffSequence(Seq::Fixed(delay)),
            Backoff::Fibonacci { unit, max } => BackoffSequence(Seq::Fibonacci {
                prev: Duration::ZERO,
                curr: unit,
                max,
            }),
        }
    }
}

/// The default generator: fibonacci from 1 microsecond up to 125
/// milliseconds. The ceiling bounds the extra delivery latency an idle
/// consumer can observe.
impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fibonacci {
            unit: DEFAULT_UNIT,
            max: DEFAULT_MAX,
        }
    }
}

/// A single run of a [`Backoff`] generator's delays.
#[derive(Debug)]
pub struct BackoffSequence(Seq);

#[derive(Debug)]
enum Seq {
    Fixed(Duration),
    Fibonacci {
        prev: Duration,
        curr: Duration,
        max: Duration,
    },
}

impl BackoffSequence {
    /// The next wait duration, advancing the sequence.
    pub fn next_delay(&mut self) -> Duration {
        match &mut self.0 {
            Seq::Fixed(delay) => *delay,
            Seq::Fibonacci { prev, curr, max } => {
                if *curr + *prev > *max {
                    return *max;
                }
                let tmp = *curr;
                *curr = tmp + *prev;
                *prev = tmp;
                *curr
            }
        }
    }
}
