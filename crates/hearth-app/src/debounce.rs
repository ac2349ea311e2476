// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::{Duration, Instant};

/// Clock-driven coalescing timer. Every `push` replaces the pending value and
/// restarts the window; `poll` yields the value once the window has elapsed
/// without another push.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<Pending<T>>,
}

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    armed_at: Instant,
}

impl<T> Debouncer<T> {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some(Pending {
            value,
            armed_at: now,
        });
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let due = self
            .pending
            .as_ref()
            .is_some_and(|pending| now.saturating_duration_since(pending.armed_at) >= self.window);
        if !due {
            return None;
        }
        self.pending.take().map(|pending| pending.value)
    }

    /// Take the pending value immediately, ignoring the window.
    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|pending| pending.value)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending
            .as_ref()
            .map(|pending| pending.armed_at + self.window)
    }
}
