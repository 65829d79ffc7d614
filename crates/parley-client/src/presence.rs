//! Per-participant presence tracking.
//!
//! A pure current-value map, not an event log. Participants enter the map
//! when conversations are loaded; presence updates never create or delete
//! participants.

use std::collections::HashMap;

use parley_shared::{Presence, UserId};

#[derive(Debug, Default)]
pub struct PresenceTracker {
    statuses: HashMap<UserId, Presence>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant with an initial status.
    pub fn track(&mut self, id: &UserId, initial: Presence) {
        self.statuses.entry(id.clone()).or_insert(initial);
    }

    /// Update a tracked participant's status. Idempotent; unknown
    /// participant ids are ignored and `false` is returned.
    pub fn set_status(&mut self, id: &UserId, status: Presence) -> bool {
        match self.statuses.get_mut(id) {
            Some(slot) => {
                *slot = status;
                true
            }
            None => false,
        }
    }

    /// Current status, defaulting to `Offline` for anyone never observed.
    pub fn status_of(&self, id: &UserId) -> Presence {
        self.statuses.get(id).copied().unwrap_or(Presence::Offline)
    }

    pub fn is_tracked(&self, id: &UserId) -> bool {
        self.statuses.contains_key(id)
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> UserId {
        UserId(s.to_string())
    }

    #[test]
    fn unknown_participants_default_to_offline() {
        let tracker = PresenceTracker::new();
        assert_eq!(tracker.status_of(&id("nobody")), Presence::Offline);
    }

    #[test]
    fn set_status_ignores_unknown_ids() {
        let mut tracker = PresenceTracker::new();
        assert!(!tracker.set_status(&id("ghost"), Presence::Online));
        assert!(!tracker.is_tracked(&id("ghost")));
    }

    #[test]
    fn set_status_is_idempotent() {
        let mut tracker = PresenceTracker::new();
        tracker.track(&id("u1"), Presence::Offline);
        assert!(tracker.set_status(&id("u1"), Presence::Away));
        assert!(tracker.set_status(&id("u1"), Presence::Away));
        assert_eq!(tracker.status_of(&id("u1")), Presence::Away);
    }

    #[test]
    fn track_keeps_existing_status() {
        let mut tracker = PresenceTracker::new();
        tracker.track(&id("u1"), Presence::Offline);
        tracker.set_status(&id("u1"), Presence::Online);
        // Re-tracking (e.g. the same participant in a second conversation)
        // must not reset an observed status.
        tracker.track(&id("u1"), Presence::Offline);
        assert_eq!(tracker.status_of(&id("u1")), Presence::Online);
    }

    #[test]
    fn clear_forgets_everything() {
        let mut tracker = PresenceTracker::new();
        tracker.track(&id("u1"), Presence::Online);
        tracker.clear();
        assert_eq!(tracker.status_of(&id("u1")), Presence::Offline);
        assert!(!tracker.is_tracked(&id("u1")));
    }
}
