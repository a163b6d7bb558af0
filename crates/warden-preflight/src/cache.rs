//! TTL verdict cache keyed by `(text-hash, user_id)` (spec.md §4.5).
//!
//! Eviction happens on access, not on a background timer, matching the
//! donor's preference for access-triggered maintenance over janitor
//! threads (see also [`crate::usercontext`]).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use warden_core::UserId;

use crate::types::Verdict;

/// Default cache TTL: one hour (spec.md §4.5).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

#[derive(Clone)]
struct CacheEntry {
    verdict: Verdict,
    expires_at: Instant,
}

/// Cache of recent preflight verdicts.
pub struct VerdictCache {
    ttl: Duration,
    entries: RwLock<HashMap<(u64, UserId), CacheEntry>>,
}

impl VerdictCache {
    /// A cache with the given TTL.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// A cache using [`DEFAULT_TTL`].
    #[must_use]
    pub fn with_default_ttl() -> Self {
        Self::new(DEFAULT_TTL)
    }

    fn key_hash(text: &str) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        text.hash(&mut hasher);
        hasher.finish()
    }

    /// Look up a cached verdict for `(text, user_id)`. Expired entries are
    /// evicted on this call and treated as a miss, so an identical
    /// `SUSPICIOUS` input re-evaluates after `TTL + ε` rather than
    /// returning a stale verdict (spec.md §8 boundary behavior).
    #[must_use]
    pub fn get(&self, text: &str, user_id: &UserId) -> Option<Verdict> {
        let key = (Self::key_hash(text), user_id.clone());
        let mut entries = self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        match entries.get(&key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.verdict.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            },
            None => None,
        }
    }

    /// Store a verdict for `(text, user_id)`, valid for this cache's TTL.
    pub fn put(&self, text: &str, user_id: &UserId, verdict: Verdict) {
        let key = (Self::key_hash(text), user_id.clone());
        let entry = CacheEntry {
            verdict,
            expires_at: Instant::now() + self.ttl,
        };
        let mut entries = self.entries.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key, entry);
    }
}

impl std::fmt::Debug for VerdictCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerdictCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Decision;

    #[test]
    fn put_then_get_roundtrips() {
        let cache = VerdictCache::with_default_ttl();
        let user = UserId::from("u1");
        cache.put("hello", &user, Verdict::allow());
        let cached = cache.get("hello", &user).expect("present");
        assert_eq!(cached.decision, Decision::Allow);
    }

    #[test]
    fn miss_for_unknown_key() {
        let cache = VerdictCache::with_default_ttl();
        assert!(cache.get("hello", &UserId::from("u1")).is_none());
    }

    #[test]
    fn expired_entry_is_evicted_and_treated_as_miss() {
        let cache = VerdictCache::new(Duration::from_millis(1));
        let user = UserId::from("u1");
        cache.put("hello", &user, Verdict::allow());
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("hello", &user).is_none());
    }

    #[test]
    fn cache_is_keyed_by_user_as_well_as_text() {
        let cache = VerdictCache::with_default_ttl();
        cache.put("hello", &UserId::from("alice"), Verdict::allow());
        assert!(cache.get("hello", &UserId::from("bob")).is_none());
    }
}
