// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Core value types shared across the crate.
//!
//! No behavior lives here -- only data definitions and conversions. The
//! message type itself is a generic parameter chosen per topic; the engine
//! never inspects its content.

use std::fmt;

use uuid::Uuid;

/// A location within a topic's logical stream.
///
/// Offsets start at 0 and increase monotonically with every append. An offset
/// is stable for the lifetime of its message, but becomes expired once the
/// log trims past it; reading an expired offset transparently serves the
/// oldest retained entry instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Offset(u64);

impl Offset {
    /// The first offset of every topic stream.
    pub const ZERO: Offset = Offset(0);

    /// Build an offset from its numeric position.
    #[must_use]
    pub const fn new(position: u64) -> Self {
        Offset(position)
    }

    /// The next logical offset. Should offsets ever become something other
    /// than integers, this spares consuming code.
    #[must_use]
    pub const fn next(self) -> Offset {
        Offset(self.0 + 1)
    }

    /// The numeric position of this offset.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for Offset {
    fn from(position: u64) -> Self {
        Offset(position)
    }
}

impl fmt::Display for Offset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The virtual size of a topic stream: the count of messages ever appended,
/// independent of how many remain retained.
pub type Length = u64;

/// A unique identifier for producers, consumers and topic observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(Uuid);

impl Id {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Id(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Id::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
