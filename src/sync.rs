// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Small synchronization primitives used by the log and the handle
//! lifecycles.
//!
//! # InitialLock
//!
//! A tri-state lock (unlocked / locked / bypassed) guarding data that is
//! initially mutable and thereafter read-only. Appenders serialize through it
//! while a segment is active; sealing a segment flips it to bypassed exactly
//! once, after which every `lock()` is a no-op. Safe because a sealed segment
//! never mutates again.
//!
//! # ReadySignal
//!
//! One-permit readiness notification. `notify()` stores at most one permit,
//! so repeated notifications between waits coalesce -- the same semantics as
//! a capacity-1 channel used purely as a doorbell.
//!
//! # Closer
//!
//! An idempotent close latch. The first `close()` wins and wakes every
//! waiter; subsequent calls report that the latch was already closed.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::Notify;

/// A lock that can be permanently bypassed once its protected data seals.
pub(crate) struct InitialLock {
    bypassed: AtomicBool,
    inner: Mutex<()>,
}

/// Guard returned by [`InitialLock::lock`]. Holds the underlying mutex only
/// while the lock is still enabled.
pub(crate) struct InitialGuard<'a> {
    _guard: Option<MutexGuard<'a, ()>>,
}

impl InitialLock {
    pub(crate) fn new() -> Self {
        Self {
            bypassed: AtomicBool::new(false),
            inner: Mutex::new(()),
        }
    }

    /// Acquire the lock, or pass straight through if it has been bypassed.
    pub(crate) fn lock(&self) -> InitialGuard<'_> {
        if self.bypassed.load(Ordering::Acquire) {
            return InitialGuard { _guard: None };
        }
        let guard = self.inner.lock();
        if self.bypassed.load(Ordering::Acquire) {
            return InitialGuard { _guard: None };
        }
        InitialGuard {
            _guard: Some(guard),
        }
    }

    /// Permanently disable the lock. Callers must hold the guard (or know no
    /// other appender can run) when flipping.
    pub(crate) fn bypass(&self) {
        self.bypassed.store(true, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn is_bypassed(&self) -> bool {
        self.bypassed.load(Ordering::Acquire)
    }
}

/// One-permit readiness notification usable from `select!`.
pub(crate) struct ReadySignal {
    notify: Notify,
}

impl ReadySignal {
    pub(crate) fn new() -> Self {
        Self {
            notify: Notify::new(),
        }
    }

    /// Wake the waiter, or store a single permit if none is waiting.
    pub(crate) fn notify(&self) {
        self.notify.notify_one();
    }

    /// Wait until notified, consuming a stored permit if one exists.
    pub(crate) async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Idempotent close latch with an async wait side.
pub(crate) struct Closer {
    closed: AtomicBool,
    notify: Notify,
}

impl Closer {
    pub(crate) fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Close the latch. Returns `true` if this call performed the close,
    /// `false` if it was already closed.
    pub(crate) fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.notify.notify_waiters();
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolve once the latch is closed. Returns immediately if it already
    /// is.
    pub(crate) async fn closed(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}
