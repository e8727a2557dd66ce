//! Who else is looking at the board, and where their pointer is.
//!
//! Purely decorative state: never persisted and never authoritative.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use boardsync_common::UserId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEntry {
    pub user_id: UserId,
    pub display_name: String,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
    pub updated_at: DateTime<Utc>,
}

/// Presence entries and cursors, kept together so a departure clears both in
/// one step.
#[derive(Debug, Clone, Default)]
pub struct PresenceRoster {
    entries: HashMap<UserId, PresenceEntry>,
    cursors: HashMap<UserId, CursorPosition>,
}

impl PresenceRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-ignore. Returns true when the user was not present before.
    pub fn arrive(&mut self, user_id: UserId, display_name: String, now: DateTime<Utc>) -> bool {
        if self.entries.contains_key(&user_id) {
            return false;
        }
        self.entries.insert(
            user_id.clone(),
            PresenceEntry {
                user_id,
                display_name,
                last_seen: now,
            },
        );
        true
    }

    /// Drop the user's entry and cursor. Returns true if either existed.
    pub fn depart(&mut self, user_id: &UserId) -> bool {
        let entry = self.entries.remove(user_id).is_some();
        let cursor = self.cursors.remove(user_id).is_some();
        entry || cursor
    }

    /// Latest position wins; there is no ordering protection.
    pub fn move_cursor(&mut self, user_id: UserId, x: f64, y: f64, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(&user_id) {
            entry.last_seen = now;
        }
        self.cursors.insert(
            user_id,
            CursorPosition {
                x,
                y,
                updated_at: now,
            },
        );
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.entries.contains_key(user_id)
    }

    pub fn cursor(&self, user_id: &UserId) -> Option<CursorPosition> {
        self.cursors.get(user_id).copied()
    }

    /// Present users ordered by display name.
    pub fn users(&self) -> Vec<PresenceEntry> {
        let mut users: Vec<_> = self.entries.values().cloned().collect();
        users.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        users
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursors.clear();
    }
}

/// Sender-side rate limit for cursor broadcasts.
#[derive(Debug, Clone)]
pub struct CursorThrottle {
    min_interval: Duration,
    last: Option<Instant>,
}

impl CursorThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// True when at least `min_interval` has passed since the last admitted
    /// emission.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn arrival_is_idempotent() {
        let mut roster = PresenceRoster::new();
        let now = Utc::now();
        assert!(roster.arrive(uid("u1"), "Ada".into(), now));
        assert!(!roster.arrive(uid("u1"), "Ada again".into(), now));
        assert_eq!(roster.len(), 1);
        assert_eq!(roster.users()[0].display_name, "Ada");
    }

    #[test]
    fn departure_clears_entry_and_cursor_together() {
        let mut roster = PresenceRoster::new();
        let now = Utc::now();
        roster.arrive(uid("u1"), "Ada".into(), now);
        roster.arrive(uid("u2"), "Bob".into(), now);
        roster.move_cursor(uid("u1"), 10.0, 20.0, now);
        roster.move_cursor(uid("u2"), 1.0, 2.0, now);

        assert!(roster.depart(&uid("u1")));
        assert!(!roster.contains(&uid("u1")));
        assert!(roster.cursor(&uid("u1")).is_none());
        assert!(roster.contains(&uid("u2")));
        assert!(roster.cursor(&uid("u2")).is_some());
        assert!(!roster.depart(&uid("u1")));
    }

    #[test]
    fn cursor_overwrites_latest() {
        let mut roster = PresenceRoster::new();
        let now = Utc::now();
        roster.move_cursor(uid("u1"), 1.0, 1.0, now);
        roster.move_cursor(uid("u1"), 5.0, 6.0, now);
        let cursor = roster.cursor(&uid("u1")).unwrap();
        assert_eq!((cursor.x, cursor.y), (5.0, 6.0));
    }

    #[test]
    fn throttle_enforces_minimum_gap() {
        let mut throttle = CursorThrottle::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert!(throttle.admit_at(t0));
        assert!(!throttle.admit_at(t0 + Duration::from_millis(40)));
        assert!(!throttle.admit_at(t0 + Duration::from_millis(99)));
        assert!(throttle.admit_at(t0 + Duration::from_millis(100)));
        assert!(!throttle.admit_at(t0 + Duration::from_millis(150)));
        assert!(throttle.admit_at(t0 + Duration::from_millis(250)));
    }
}
