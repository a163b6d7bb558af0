//! Warden Permissions — default-deny action gate with per-hour quotas and
//! cooldowns (spec.md §4.8).
//!
//! Grounded on the donor's `astrid-approval::policy` (ordered rule checks,
//! default-deny) and `astrid-approval::budget` (trailing-window counters),
//! generalized from dollar budgets to action occurrence counts.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::collections::{BTreeMap, VecDeque};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use warden_core::PermissionRule;

fn trailing_window() -> chrono::Duration {
    chrono::Duration::hours(1)
}

struct ActionState {
    /// Timestamps of recorded occurrences in the trailing window, oldest
    /// first.
    occurrences: VecDeque<DateTime<Utc>>,
    last_recorded: Option<DateTime<Utc>>,
}

impl ActionState {
    fn new() -> Self {
        Self {
            occurrences: VecDeque::new(),
            last_recorded: None,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some(&front) = self.occurrences.front() {
            if now - front > trailing_window() {
                self.occurrences.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Default-deny permission checker for one identity.
///
/// Any action absent from the configured rule map is denied
/// (spec.md §4.8 "Default is denied for any action not explicitly
/// allowed").
pub struct PermissionChecker {
    rules: BTreeMap<String, PermissionRule>,
    state: RwLock<BTreeMap<String, ActionState>>,
}

impl PermissionChecker {
    /// Build a checker from an identity's `permissions:` map.
    #[must_use]
    pub fn new(rules: BTreeMap<String, PermissionRule>) -> Self {
        Self {
            rules,
            state: RwLock::new(BTreeMap::new()),
        }
    }

    fn rule(&self, action: &str) -> Option<&PermissionRule> {
        self.rules.get(action)
    }

    /// Whether `action` is currently allowed: present in the rule map,
    /// `allowed: true`, within `max_per_hour` if set, and past
    /// `cooldown_seconds` since the last recorded occurrence if set.
    #[must_use]
    pub fn is_allowed(&self, action: &str) -> bool {
        let Some(rule) = self.rule(action) else {
            return false;
        };
        if !rule.allowed {
            return false;
        }

        let now = Utc::now();
        let mut state_map = self.state.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = state_map.entry(action.to_string()).or_insert_with(ActionState::new);
        state.prune(now);

        if let Some(max) = rule.max_per_hour {
            if state.occurrences.len() >= max as usize {
                return false;
            }
        }

        if let (Some(cooldown), Some(last)) = (rule.cooldown_seconds, state.last_recorded) {
            let elapsed = (now - last).num_seconds().max(0);
            if elapsed < i64::try_from(cooldown).unwrap_or(i64::MAX) {
                return false;
            }
        }

        true
    }

    /// Whether `action` additionally requires interactive approval before
    /// its side effect runs, independent of the rate/cooldown decision.
    #[must_use]
    pub fn requires_approval(&self, action: &str) -> bool {
        self.rule(action).is_some_and(|r| r.requires_approval)
    }

    /// Record that `action` was just performed, for future rate/cooldown
    /// checks. Call only after the side effect has actually run (or is
    /// about to, under a lock that prevents duplicate execution).
    pub fn record_action(&self, action: &str) {
        let now = Utc::now();
        let mut state_map = self.state.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = state_map.entry(action.to_string()).or_insert_with(ActionState::new);
        state.prune(now);
        state.occurrences.push_back(now);
        state.last_recorded = Some(now);
    }

    /// A human-readable reason `action` would currently be denied, for
    /// surfacing to a plugin or an admin. Returns an empty string if the
    /// action is currently allowed.
    #[must_use]
    pub fn denial_reason(&self, action: &str) -> String {
        let Some(rule) = self.rule(action) else {
            return format!("action `{action}` is not in the permission whitelist (default-deny)");
        };
        if !rule.allowed {
            return format!("action `{action}` is explicitly denied");
        }
        if self.is_allowed(action) {
            return String::new();
        }

        let now = Utc::now();
        let state_map = self.state.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(state) = state_map.get(action) {
            if let Some(max) = rule.max_per_hour {
                if state.occurrences.len() >= max as usize {
                    return format!("action `{action}` exceeded {max} per hour");
                }
            }
            if let (Some(cooldown), Some(last)) = (rule.cooldown_seconds, state.last_recorded) {
                let elapsed = (now - last).num_seconds().max(0);
                if elapsed < i64::try_from(cooldown).unwrap_or(i64::MAX) {
                    return format!(
                        "action `{action}` is in cooldown, {} seconds remaining",
                        i64::try_from(cooldown).unwrap_or(i64::MAX) - elapsed
                    );
                }
            }
        }
        format!("action `{action}` is currently denied")
    }
}

impl std::fmt::Debug for PermissionChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionChecker")
            .field("configured_actions", &self.rules.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(allowed: bool, max_per_hour: Option<u32>, cooldown: Option<u64>) -> PermissionRule {
        PermissionRule {
            allowed,
            max_per_hour,
            cooldown_seconds: cooldown,
            requires_approval: false,
        }
    }

    #[test]
    fn unknown_action_is_denied() {
        let checker = PermissionChecker::new(BTreeMap::new());
        assert!(!checker.is_allowed("post_tweet"));
    }

    #[test]
    fn explicitly_denied_action_stays_denied() {
        let mut rules = BTreeMap::new();
        rules.insert("post_tweet".to_string(), rule(false, None, None));
        let checker = PermissionChecker::new(rules);
        assert!(!checker.is_allowed("post_tweet"));
    }

    #[test]
    fn allowed_action_without_limits_is_allowed() {
        let mut rules = BTreeMap::new();
        rules.insert("reply".to_string(), rule(true, None, None));
        let checker = PermissionChecker::new(rules);
        assert!(checker.is_allowed("reply"));
    }

    #[test]
    fn max_per_hour_is_enforced() {
        let mut rules = BTreeMap::new();
        rules.insert("reply".to_string(), rule(true, Some(2), None));
        let checker = PermissionChecker::new(rules);

        assert!(checker.is_allowed("reply"));
        checker.record_action("reply");
        assert!(checker.is_allowed("reply"));
        checker.record_action("reply");
        assert!(!checker.is_allowed("reply"));
    }

    #[test]
    fn cooldown_is_enforced_immediately_after_recording() {
        let mut rules = BTreeMap::new();
        rules.insert("post_tweet".to_string(), rule(true, None, Some(3600)));
        let checker = PermissionChecker::new(rules);

        assert!(checker.is_allowed("post_tweet"));
        checker.record_action("post_tweet");
        assert!(!checker.is_allowed("post_tweet"));
    }

    #[test]
    fn requires_approval_is_independent_of_allow_decision() {
        let mut rules = BTreeMap::new();
        rules.insert(
            "transfer_funds".to_string(),
            PermissionRule {
                allowed: true,
                max_per_hour: None,
                cooldown_seconds: None,
                requires_approval: true,
            },
        );
        let checker = PermissionChecker::new(rules);
        assert!(checker.is_allowed("transfer_funds"));
        assert!(checker.requires_approval("transfer_funds"));
    }

    #[test]
    fn denial_reason_is_empty_when_allowed() {
        let mut rules = BTreeMap::new();
        rules.insert("reply".to_string(), rule(true, None, None));
        let checker = PermissionChecker::new(rules);
        assert_eq!(checker.denial_reason("reply"), "");
    }

    #[test]
    fn denial_reason_names_unknown_action() {
        let checker = PermissionChecker::new(BTreeMap::new());
        assert!(checker.denial_reason("post_tweet").contains("whitelist"));
    }
}
