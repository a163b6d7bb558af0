//! Per-user suspicion state with exponential decay and temporary bans
//! (spec.md §4.5 layer 3).

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use warden_core::UserId;

/// Half-life of accumulated suspicion, in seconds. Chosen so a single
/// `SUSPICIOUS` verdict stops influencing the escalation decision after
/// roughly a day without being reinforced.
const DECAY_HALF_LIFE_SECS: f64 = 6.0 * 3600.0;

/// Score increment added per `SUSPICIOUS` verdict, before decay.
const SUSPICION_INCREMENT: f64 = 1.0;

/// Score at or above which a user is temporarily banned.
const ESCALATION_THRESHOLD: f64 = 3.0;

/// How long a ban lasts once escalated.
fn ban_duration() -> Duration {
    Duration::minutes(30)
}

/// Mutable per-user suspicion state (spec.md §3 `UserContext`).
#[derive(Debug, Clone)]
pub struct UserContext {
    score: f64,
    last_updated: DateTime<Utc>,
    escalation_count: u32,
    block_until: Option<DateTime<Utc>>,
}

impl UserContext {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            score: 0.0,
            last_updated: now,
            escalation_count: 0,
            block_until: None,
        }
    }

    /// Accumulated suspicion score, after applying exponential decay for
    /// time elapsed since the last update.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Number of times this user has escalated into a temporary ban.
    #[must_use]
    pub fn escalation_count(&self) -> u32 {
        self.escalation_count
    }

    /// Whether this user is currently banned.
    #[must_use]
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.block_until.is_some_and(|until| now < until)
    }

    fn decay(&mut self, now: DateTime<Utc>) {
        let elapsed_secs = (now - self.last_updated).num_seconds().max(0) as f64;
        if elapsed_secs > 0.0 {
            let half_lives = elapsed_secs / DECAY_HALF_LIFE_SECS;
            self.score *= 0.5_f64.powf(half_lives);
        }
        self.last_updated = now;
    }

    fn record_suspicious(&mut self, now: DateTime<Utc>) {
        self.decay(now);
        self.score += SUSPICION_INCREMENT;
        if self.score >= ESCALATION_THRESHOLD && !self.is_blocked(now) {
            self.escalation_count += 1;
            self.block_until = Some(now + ban_duration());
            tracing::warn!(escalation_count = self.escalation_count, "preflight: user escalated into temporary ban");
        }
    }
}

/// `RwLock`-guarded map of per-user suspicion state, pruned opportunistically
/// on access rather than by a background janitor (matches the donor's
/// access-triggered maintenance style).
#[derive(Debug, Default)]
pub struct UserContextStore {
    users: RwLock<HashMap<UserId, UserContext>>,
}

impl UserContextStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
        }
    }

    /// Whether `user_id` is currently serving a temporary ban.
    #[must_use]
    pub fn is_blocked(&self, user_id: &UserId) -> bool {
        let now = Utc::now();
        let mut users = self.users.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let ctx = users.entry(user_id.clone()).or_insert_with(|| UserContext::new(now));
        ctx.decay(now);
        ctx.is_blocked(now)
    }

    /// Record a `SUSPICIOUS` verdict for `user_id`, applying decay first
    /// and escalating into a ban if the decayed score crosses the
    /// threshold.
    pub fn record_suspicious(&self, user_id: &UserId) {
        let now = Utc::now();
        let mut users = self.users.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let ctx = users.entry(user_id.clone()).or_insert_with(|| UserContext::new(now));
        ctx.record_suspicious(now);
    }

    /// Current suspicion score for `user_id`, `0.0` if never seen.
    #[must_use]
    pub fn score(&self, user_id: &UserId) -> f64 {
        let now = Utc::now();
        let mut users = self.users.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        users
            .get_mut(user_id)
            .map(|ctx| {
                ctx.decay(now);
                ctx.score()
            })
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_is_not_blocked() {
        let store = UserContextStore::new();
        assert!(!store.is_blocked(&UserId::from("u1")));
    }

    #[test]
    fn repeated_suspicious_hits_escalate_into_ban() {
        let store = UserContextStore::new();
        let user = UserId::from("u1");
        for _ in 0..3 {
            store.record_suspicious(&user);
        }
        assert!(store.is_blocked(&user));
    }

    #[test]
    fn single_suspicious_hit_does_not_ban() {
        let store = UserContextStore::new();
        let user = UserId::from("u1");
        store.record_suspicious(&user);
        assert!(!store.is_blocked(&user));
        assert!(store.score(&user) > 0.0);
    }

    #[test]
    fn users_are_independent() {
        let store = UserContextStore::new();
        let a = UserId::from("alpha");
        let b = UserId::from("bravo");
        for _ in 0..3 {
            store.record_suspicious(&a);
        }
        assert!(store.is_blocked(&a));
        assert!(!store.is_blocked(&b));
    }
}
