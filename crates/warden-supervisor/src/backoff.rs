//! Exponential restart backoff (spec.md §4.16 "exponential backoff up to
//! a configurable maximum restart count").
//!
//! Grounded on the donor's `astralis-mcp::server::ServerManager::restart_backoff`
//! (base delay doubled per attempt, capped), narrowed to the one
//! calculation a restarting child needs — no jitter, since nothing here
//! reconnects in a thundering herd the way the donor's MCP clients did.

use std::time::Duration;

/// `delay(0) = 0`, `delay(n) = min(cap, base * 2^(n-1))` for `n >= 1`.
#[derive(Debug, Clone, Copy)]
pub struct RestartBackoff {
    base: Duration,
    cap: Duration,
}

impl RestartBackoff {
    /// Build a calculator from a base delay and a cap, both in seconds.
    #[must_use]
    pub const fn new(base_secs: u64, cap_secs: u64) -> Self {
        Self {
            base: Duration::from_secs(base_secs),
            cap: Duration::from_secs(cap_secs),
        }
    }

    /// Delay before the `attempt`-th restart (1-indexed: `attempt == 1` is
    /// the first restart after the initial crash).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let shift = attempt.saturating_sub(1);
        let multiplier = 1u64.checked_shl(shift).unwrap_or(u64::MAX);
        let scaled = self.base.as_secs().saturating_mul(multiplier);
        Duration::from_secs(scaled.min(self.cap.as_secs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_restart_uses_base_delay() {
        let backoff = RestartBackoff::new(5, 300);
        assert_eq!(backoff.delay_for_attempt(1), Duration::from_secs(5));
    }

    #[test]
    fn delay_doubles_per_attempt() {
        let backoff = RestartBackoff::new(5, 300);
        assert_eq!(backoff.delay_for_attempt(2), Duration::from_secs(10));
        assert_eq!(backoff.delay_for_attempt(3), Duration::from_secs(20));
        assert_eq!(backoff.delay_for_attempt(4), Duration::from_secs(40));
    }

    #[test]
    fn delay_caps_at_maximum() {
        let backoff = RestartBackoff::new(5, 60);
        assert_eq!(backoff.delay_for_attempt(10), Duration::from_secs(60));
    }

    #[test]
    fn zero_attempt_is_immediate() {
        let backoff = RestartBackoff::new(5, 300);
        assert_eq!(backoff.delay_for_attempt(0), Duration::ZERO);
    }
}
