//! Time-boxed storage for in-progress user input.
//!
//! Drafts are keyed by `(user_id, activity)` and expire after a fixed TTL.
//! All methods take the current instant explicitly.

use std::collections::HashMap;

use chrono::Duration;

use crate::types::{DbId, Timestamp};

/// Default lifetime of a saved draft.
pub const DEFAULT_DRAFT_TTL_HOURS: i64 = 24;

/// What the draft was being written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    SessionChat(DbId),
    AssignmentNote(DbId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftKey {
    pub user_id: DbId,
    pub activity: Activity,
}

impl DraftKey {
    pub fn chat(user_id: DbId, session_id: DbId) -> Self {
        Self {
            user_id,
            activity: Activity::SessionChat(session_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Draft {
    text: String,
    expires_at: Timestamp,
}

pub struct DraftStore {
    ttl: Duration,
    drafts: HashMap<DraftKey, Draft>,
}

impl DraftStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            drafts: HashMap::new(),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Save `text` for `key`, restarting its TTL. Blank text discards it.
    pub fn save(&mut self, key: DraftKey, text: &str, now: Timestamp) {
        if text.trim().is_empty() {
            self.drafts.remove(&key);
            return;
        }
        self.drafts.insert(
            key,
            Draft {
                text: text.to_string(),
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn get(&self, key: &DraftKey, now: Timestamp) -> Option<&str> {
        self.drafts
            .get(key)
            .filter(|draft| now < draft.expires_at)
            .map(|draft| draft.text.as_str())
    }

    /// Remove and return an unexpired draft.
    pub fn take(&mut self, key: &DraftKey, now: Timestamp) -> Option<String> {
        let draft = self.drafts.remove(key)?;
        (now < draft.expires_at).then_some(draft.text)
    }

    pub fn discard(&mut self, key: &DraftKey) {
        self.drafts.remove(key);
    }

    /// Drop every expired draft, returning how many were removed.
    pub fn purge_expired(&mut self, now: Timestamp) -> usize {
        let before = self.drafts.len();
        self.drafts.retain(|_, draft| now < draft.expires_at);
        before - self.drafts.len()
    }

    pub fn len(&self) -> usize {
        self.drafts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drafts.is_empty()
    }
}

impl Default for DraftStore {
    fn default() -> Self {
        Self::new(Duration::hours(DEFAULT_DRAFT_TTL_HOURS))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn saved_draft_is_returned_before_expiry() {
        let mut store = DraftStore::new(Duration::minutes(30));
        let key = DraftKey::chat(1, 9);
        store.save(key, "half a thought", t0());
        assert_eq!(store.get(&key, t0() + Duration::minutes(29)), Some("half a thought"));
    }

    #[test]
    fn expired_draft_is_hidden_and_purged() {
        let mut store = DraftStore::new(Duration::minutes(30));
        let key = DraftKey::chat(1, 9);
        store.save(key, "stale", t0());

        let later = t0() + Duration::minutes(30);
        assert_eq!(store.get(&key, later), None);
        assert_eq!(store.purge_expired(later), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn drafts_are_scoped_per_user_and_activity() {
        let mut store = DraftStore::default();
        store.save(DraftKey::chat(1, 9), "mine", t0());
        assert_eq!(store.get(&DraftKey::chat(2, 9), t0()), None);
        assert_eq!(store.get(&DraftKey::chat(1, 8), t0()), None);
        let note = DraftKey {
            user_id: 1,
            activity: Activity::AssignmentNote(9),
        };
        assert_eq!(store.get(&note, t0()), None);
    }

    #[test]
    fn take_removes_the_draft() {
        let mut store = DraftStore::default();
        let key = DraftKey::chat(1, 9);
        store.save(key, "resume me", t0());
        assert_eq!(store.take(&key, t0()), Some("resume me".to_string()));
        assert_eq!(store.take(&key, t0()), None);
    }

    #[test]
    fn blank_save_discards() {
        let mut store = DraftStore::default();
        let key = DraftKey::chat(1, 9);
        store.save(key, "x", t0());
        store.save(key, "   ", t0());
        assert!(store.is_empty());
    }
}
