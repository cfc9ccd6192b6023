// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! A runtime-typed facade over the generic engine.
//!
//! Callers who cannot fix a message type at compile time instantiate the
//! same engine at [`Message`], an `Arc`-erased any-value. The engine logic is
//! not duplicated; these are aliases plus downcast helpers.

use std::any::Any;
use std::sync::Arc;

/// A runtime-typed message.
pub type Message = Arc<dyn Any + Send + Sync>;

/// A topic carrying runtime-typed messages.
pub type Topic = crate::Topic<Message>;

/// A producer of runtime-typed messages.
pub type Producer = crate::Producer<Message>;

/// A consumer of runtime-typed messages.
pub type Consumer = crate::Consumer<Message>;

/// Wrap a value as a runtime-typed message.
#[must_use]
pub fn message<T: Any + Send + Sync>(value: T) -> Message {
    Arc::new(value)
}

/// Borrow the payload as `T`, or `None` if the message holds another type.
#[must_use]
pub fn payload<T: Any>(msg: &Message) -> Option<&T> {
    msg.downcast_ref()
}
