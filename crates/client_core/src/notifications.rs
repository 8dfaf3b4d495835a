//! Transient user-facing notices (toasts). Every user-visible failure goes through here.

use std::time::{Duration, Instant};

pub const DEFAULT_NOTIFICATION_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub issued_at: Instant,
    pub expires_after: Duration,
}

impl Notification {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
            issued_at: Instant::now(),
            expires_after: DEFAULT_NOTIFICATION_TTL,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Severity::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_after = ttl;
        self
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.issued_at) >= self.expires_after
    }
}

/// Holds the single notification currently on screen; a newer one replaces it.
#[derive(Debug, Default)]
pub struct NotificationSlot {
    current: Option<Notification>,
}

impl NotificationSlot {
    pub fn show(&mut self, notification: Notification) {
        self.current = Some(notification);
    }

    /// Returns the visible notification, dropping it once expired.
    pub fn visible(&mut self, now: Instant) -> Option<&Notification> {
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.is_expired_at(now))
        {
            self.current = None;
        }
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_expires_and_replaces() {
        let mut slot = NotificationSlot::default();
        let first = Notification::info("first").with_ttl(Duration::from_millis(50));
        let issued = first.issued_at;
        slot.show(first);
        assert_eq!(slot.visible(issued).map(|n| n.message.as_str()), Some("first"));

        slot.show(Notification::error("second"));
        assert_eq!(
            slot.visible(Instant::now()).map(|n| n.severity),
            Some(Severity::Error)
        );

        let later = Instant::now() + DEFAULT_NOTIFICATION_TTL;
        assert!(slot.visible(later).is_none());
    }
}
