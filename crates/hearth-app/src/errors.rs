// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::error;
use uuid::Uuid;

use crate::Route;

pub const REPORT_QUEUE_CAPACITY: usize = 16;
pub const MAX_RETRYABLE_REPORTS: usize = 3;
pub const ERROR_PAGE_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub trace_id: Uuid,
    /// HTTP-style status; `None` for transport failures.
    pub status: Option<u16>,
    pub message: String,
    pub reported_at: Instant,
    pub retry_allowed: bool,
}

impl ErrorReport {
    pub fn is_server_error(&self) -> bool {
        self.status.is_some_and(|status| status >= 500)
    }

    fn is_transient(&self) -> bool {
        self.status.is_none_or(|status| status >= 500)
    }

    pub fn notice(&self) -> Notice {
        let suffix = if self.retry_allowed {
            " -- try again"
        } else {
            ""
        };
        Notice::error(format!("{}{suffix} (trace {})", self.message, self.trace_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingRedirect {
    route: Route,
    due_at: Instant,
}

/// Records failures, decides whether a retry is reasonable, and schedules the
/// error page for server failures. One instance per runtime.
#[derive(Debug)]
pub struct ErrorReporter {
    queue: VecDeque<ErrorReport>,
    capacity: usize,
    redirect: Option<PendingRedirect>,
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(REPORT_QUEUE_CAPACITY)
    }
}

impl ErrorReporter {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            redirect: None,
        }
    }

    pub fn report(
        &mut self,
        status: Option<u16>,
        message: impl Into<String>,
        now: Instant,
    ) -> ErrorReport {
        let message = message.into();
        let trace_id = Uuid::new_v4();
        let mut report = ErrorReport {
            trace_id,
            status,
            message,
            reported_at: now,
            retry_allowed: false,
        };
        if report.is_transient() {
            let earlier = self
                .queue
                .iter()
                .filter(|queued| queued.is_transient())
                .count();
            report.retry_allowed = earlier < MAX_RETRYABLE_REPORTS;
        }
        error!(
            trace = %trace_id,
            status = ?status,
            retry_allowed = report.retry_allowed,
            "{}",
            report.message
        );

        if report.is_server_error() {
            self.redirect = Some(PendingRedirect {
                route: Route::Error {
                    trace: trace_id.to_string(),
                },
                due_at: now + ERROR_PAGE_DELAY,
            });
        }
        self.queue.push_back(report.clone());
        while self.queue.len() > self.capacity {
            self.queue.pop_front();
        }
        report
    }

    /// Returns the error page route once its delay has passed.
    pub fn tick(&mut self, now: Instant) -> Option<Route> {
        let due = self
            .redirect
            .as_ref()
            .is_some_and(|redirect| now >= redirect.due_at);
        if !due {
            return None;
        }
        self.redirect.take().map(|redirect| redirect.route)
    }

    pub fn cancel_redirect(&mut self) {
        self.redirect = None;
    }

    pub fn has_pending_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    pub fn reports(&self) -> impl Iterator<Item = &ErrorReport> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.redirect = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{ERROR_PAGE_DELAY, ErrorReporter, NoticeLevel};
    use crate::Route;
    use std::time::{Duration, Instant};

    #[test]
    fn server_error_redirects_to_error_page_after_delay() {
        let now = Instant::now();
        let mut reporter = ErrorReporter::default();
        let report = reporter.report(Some(503), "goals failed to load", now);
        assert!(report.retry_allowed);

        assert_eq!(reporter.tick(now + Duration::from_millis(2_999)), None);
        assert_eq!(
            reporter.tick(now + ERROR_PAGE_DELAY),
            Some(Route::Error {
                trace: report.trace_id.to_string(),
            })
        );
        assert_eq!(reporter.tick(now + ERROR_PAGE_DELAY * 2), None);
    }

    #[test]
    fn client_errors_neither_retry_nor_redirect() {
        let now = Instant::now();
        let mut reporter = ErrorReporter::default();
        let report = reporter.report(Some(422), "goal title is required", now);
        assert!(!report.retry_allowed);
        assert!(!reporter.has_pending_redirect());
    }

    #[test]
    fn retry_is_suppressed_after_three_transient_failures() {
        let now = Instant::now();
        let mut reporter = ErrorReporter::default();
        let allowed = [Some(500), None, Some(502), Some(500)]
            .into_iter()
            .map(|status| reporter.report(status, "boom", now).retry_allowed)
            .collect::<Vec<_>>();
        assert_eq!(allowed, vec![true, true, true, false]);
    }

    #[test]
    fn queue_is_bounded_and_drops_oldest() {
        let now = Instant::now();
        let mut reporter = ErrorReporter::new(16);
        for index in 0..20 {
            reporter.report(Some(400), format!("failure {index}"), now);
        }
        assert_eq!(reporter.len(), 16);
        assert_eq!(
            reporter.reports().next().map(|report| report.message.as_str()),
            Some("failure 4")
        );
    }

    #[test]
    fn trace_ids_are_unique_and_appear_in_notice() {
        let now = Instant::now();
        let mut reporter = ErrorReporter::default();
        let first = reporter.report(None, "offline", now);
        let second = reporter.report(None, "offline", now);
        assert_ne!(first.trace_id, second.trace_id);

        let notice = first.notice();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.message.contains(&first.trace_id.to_string()));
        assert!(notice.message.contains("try again"));
    }

    #[test]
    fn cancel_redirect_keeps_reports() {
        let now = Instant::now();
        let mut reporter = ErrorReporter::default();
        reporter.report(Some(500), "boom", now);
        reporter.cancel_redirect();
        assert_eq!(reporter.tick(now + ERROR_PAGE_DELAY), None);
        assert_eq!(reporter.len(), 1);
    }
}
