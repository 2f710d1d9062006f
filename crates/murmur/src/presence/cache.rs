//! In-process presence records with time-based expiry.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PresenceNotifier;

/// Default lifetime of a presence record without a refresh.
pub const DEFAULT_PRESENCE_TTL_SECS: u64 = 24 * 60 * 60;

/// Last known status of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: String,
    pub username: String,
    pub last_seen: DateTime<Utc>,
    pub is_online: bool,
}

#[derive(Debug, Clone)]
struct Entry {
    record: PresenceRecord,
    expires_at: DateTime<Utc>,
}

/// Presence records keyed by user id.
///
/// Records are not authoritative for delivery. Expired entries are dropped
/// lazily when read.
#[derive(Debug)]
pub struct PresenceCache {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl PresenceCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(365)),
        }
    }

    /// Get a user's record if it has not expired.
    pub fn get(&self, user_id: &str) -> Option<PresenceRecord> {
        self.get_at(user_id, Utc::now())
    }

    /// Unexpired records currently marked online, sorted by username.
    pub fn online_users(&self) -> Vec<PresenceRecord> {
        self.online_users_at(Utc::now())
    }

    /// Drop every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_at(&self, user_id: &str, username: &str, online: bool, now: DateTime<Utc>) {
        let record = PresenceRecord {
            user_id: user_id.to_string(),
            username: username.to_string(),
            last_seen: now,
            is_online: online,
        };
        self.entries.insert(
            user_id.to_string(),
            Entry {
                record,
                expires_at: now
                    .checked_add_signed(self.ttl)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            },
        );
    }

    fn get_at(&self, user_id: &str, now: DateTime<Utc>) -> Option<PresenceRecord> {
        let record = {
            let entry = self.entries.get(user_id)?;
            (entry.expires_at > now).then(|| entry.record.clone())
        };
        if record.is_none() {
            self.entries.remove_if(user_id, |_, entry| entry.expires_at <= now);
        }
        record
    }

    fn online_users_at(&self, now: DateTime<Utc>) -> Vec<PresenceRecord> {
        self.purge_expired_at(now);
        let mut users: Vec<PresenceRecord> = self
            .entries
            .iter()
            .filter(|entry| entry.record.is_online)
            .map(|entry| entry.record.clone())
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Purged expired presence records");
        }
        removed
    }
}

impl Default for PresenceCache {
    fn default() -> Self {
        Self::new(std::time::Duration::from_secs(DEFAULT_PRESENCE_TTL_SECS))
    }
}

impl PresenceNotifier for PresenceCache {
    fn notify(&self, user_id: &str, username: &str, online: bool) {
        self.record_at(user_id, username, online, Utc::now());
    }
}
