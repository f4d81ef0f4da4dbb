//! Transient notifications
//!
//! Entries auto-expire after a fixed display time and can be dismissed
//! manually. Several may be visible at once, in insertion order.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::types::Severity;

/// One visible notification
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    /// Wall-clock time, for display
    pub created_at: DateTime<Local>,
    expires_at: Instant,
}

impl Notification {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Queue of live notifications
pub struct Notifier {
    entries: VecDeque<Notification>,
    display_for: Duration,
    next_id: u64,
}

impl Notifier {
    pub fn new(display_for: Duration) -> Self {
        Self {
            entries: VecDeque::new(),
            display_for,
            next_id: 1,
        }
    }

    /// Add a notification, returning its id
    pub fn notify(&mut self, message: impl Into<String>, severity: Severity) -> u64 {
        self.notify_at(message, severity, Instant::now())
    }

    pub fn notify_at(&mut self, message: impl Into<String>, severity: Severity, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push_back(Notification {
            id,
            message: message.into(),
            severity,
            created_at: Local::now(),
            expires_at: now + self.display_for,
        });
        id
    }

    /// Remove one notification; false if it was already gone
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|n| n.id != id);
        self.entries.len() != before
    }

    pub fn dismiss_all(&mut self) {
        self.entries.clear();
    }

    /// Drop everything past its display time, returning how many went
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|n| !n.is_expired(now));
        before - self.entries.len()
    }

    pub fn visible(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }

    pub fn get(&self, id: u64) -> Option<&Notification> {
        self.entries.iter().find(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
