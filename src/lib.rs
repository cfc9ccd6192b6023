// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! An in-process publish/subscribe message log.
//!
//! A [`Topic`] is an ordered stream of messages backed by a segmented
//! append-only log. Independent [`Producer`] handles append to it and
//! independent [`Consumer`] handles each replay the full stream from their
//! own position, at their own pace. Old messages are discarded in whole
//! segments by a background vacuum task according to a composable
//! [retention policy](retention); idle polling is throttled by a
//! configurable [backoff generator](backoff).
//!
//! Everything is in-memory and process-local. There is no persistence, no
//! cross-process distribution and no delivery guarantee stronger than
//! at-most-once per consumer conduit slot.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use logbus::Topic;
//!
//! let topic: Topic<String> = Topic::new();
//! let producer = topic.producer();
//! let mut consumer = topic.consumer();
//!
//! producer.send("hello".to_string()).await;
//! assert_eq!(consumer.recv().await.as_deref(), Some("hello"));
//!
//! producer.close().unwrap();
//! consumer.close().unwrap();
//! # }
//! ```

pub mod backoff;
pub mod dynamic;
pub mod retention;

mod config;
mod consumer;
mod cursor;
mod diag;
mod error;
mod log;
mod producer;
mod sync;
mod topic;
mod types;

pub use config::{TopicBuilder, DEFAULT_SEGMENT_CAPACITY};
pub use consumer::Consumer;
pub use diag::set_leak_diagnostics;
pub use error::Error;
pub use producer::Producer;
pub use topic::Topic;
pub use types::{Id, Length, Offset};

#[cfg(test)]
mod tests;
