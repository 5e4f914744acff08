use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::hka::{Environment, TransportKind};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub transport: TransportKind,
    pub environment: Environment,
    pub user: String,
}

/// Process-local cache of vendor session tokens with a fixed time-to-live.
///
/// Entries are invalidated explicitly when the vendor answers 401, and
/// dropped once they outlive `ttl`.
pub struct TokenCache {
    /// key -> (token, issued_at)
    entries: DashMap<TokenKey, (String, Instant)>,
    ttl: Duration,
}

impl TokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &TokenKey) -> Option<String> {
        let entry = self.entries.get(key)?;
        let (token, issued_at) = entry.value();
        if issued_at.elapsed() < self.ttl {
            Some(token.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: TokenKey, token: String) {
        self.entries.insert(key, (token, Instant::now()));
    }

    pub fn invalidate(&self, key: &TokenKey) {
        self.entries.remove(key);
    }

    /// Remove entries past their TTL.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, issued_at)| issued_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
