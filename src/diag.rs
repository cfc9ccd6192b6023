// Copyright The LogBus Authors
// SPDX-License-Identifier: Apache-2.0

//! Leak diagnostics for producer and consumer handles.
//!
//! When enabled (programmatically or through the `LOGBUS_DEBUG` environment
//! variable) every handle captures a backtrace at construction. A handle
//! dropped without being closed then emits a `tracing` warning carrying its
//! id and that backtrace, pointing at the call site that leaked it.
//!
//! Disabled by default; the capture is not free and the engine never depends
//! on it for correctness.

use std::backtrace::Backtrace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;

use crate::types::Id;

const ENV_VAR: &str = "LOGBUS_DEBUG";

static ENABLED: AtomicBool = AtomicBool::new(false);
static ENV_CHECK: Once = Once::new();

/// Turn leak diagnostics on or off for handles constructed afterwards.
pub fn set_leak_diagnostics(enabled: bool) {
    // Resolve the env var first so an explicit call always wins.
    ENV_CHECK.call_once(|| {});
    ENABLED.store(enabled, Ordering::Release);
}

pub(crate) fn enabled() -> bool {
    ENV_CHECK.call_once(|| {
        if std::env::var_os(ENV_VAR).is_some() {
            ENABLED.store(true, Ordering::Release);
        }
    });
    ENABLED.load(Ordering::Acquire)
}

/// Where and when a handle was created. Captured only while diagnostics are
/// enabled.
pub(crate) struct InstantiationTrace {
    kind: &'static str,
    id: Id,
    backtrace: Backtrace,
}

impl InstantiationTrace {
    pub(crate) fn capture(kind: &'static str, id: Id) -> Option<Self> {
        if !enabled() {
            return None;
        }
        Some(Self {
            kind,
            id,
            backtrace: Backtrace::force_capture(),
        })
    }

    /// Emit the leak warning. Called from `Drop` when the handle was never
    /// closed.
    pub(crate) fn warn_leak(&self) {
        tracing::warn!(
            kind = self.kind,
            id = %self.id,
            backtrace = %self.backtrace,
            "handle dropped without being closed"
        );
    }
}
