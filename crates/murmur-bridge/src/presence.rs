//! Usernames with at least one live bridge client.

use std::collections::BTreeMap;

use tokio::sync::RwLock;

/// Online users, counted per live client so a second tab keeps its user
/// online until the last one leaves.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    users: RwLock<BTreeMap<String, usize>>,
}

impl PresenceTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one more live client for `username`.
    pub async fn join(&self, username: &str) {
        *self.users.write().await.entry(username.to_string()).or_default() += 1;
    }

    /// Drop one live client for `username`. Returns `true` when that was the
    /// user's last client.
    pub async fn leave(&self, username: &str) -> bool {
        let mut users = self.users.write().await;
        let Some(count) = users.get_mut(username) else {
            return false;
        };

        *count -= 1;
        if *count == 0 {
            users.remove(username);
            true
        } else {
            false
        }
    }

    /// Whether `username` has a live client.
    pub async fn is_online(&self, username: &str) -> bool {
        self.users.read().await.contains_key(username)
    }

    /// Online usernames, sorted and de-duplicated.
    pub async fn online_users(&self) -> Vec<String> {
        self.users.read().await.keys().cloned().collect()
    }

    /// Number of distinct online usernames.
    pub async fn count(&self) -> usize {
        self.users.read().await.len()
    }
}
