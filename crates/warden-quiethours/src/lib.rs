//! Warden Quiet Hours — a time-window predicate controlling self-initiated
//! LLM use (spec.md §4.11).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use warden_core::QuietHoursSettings;

/// Errors raised while evaluating quiet hours.
#[derive(Debug, Error)]
pub enum QuietHoursError {
    /// The configured timezone name is not a valid IANA timezone.
    #[error("unknown timezone `{0}`")]
    UnknownTimezone(String),
}

/// Result alias for quiet-hours operations.
pub type QuietHoursResult<T> = Result<T, QuietHoursError>;

/// Seconds-until-next-transition status, as returned by
/// [`QuietHoursGate::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuietHoursStatus {
    /// Whether quiet hours are in effect right now.
    pub is_quiet: bool,
    /// Seconds until the next transition (quiet → active or vice versa).
    pub seconds_until_transition: i64,
}

/// Timezone-aware quiet-hours gate for one identity.
#[derive(Debug, Clone)]
pub struct QuietHoursGate {
    settings: QuietHoursSettings,
    tz: Tz,
}

impl QuietHoursGate {
    /// Build a gate from an identity's quiet-hours settings.
    ///
    /// # Errors
    ///
    /// Returns [`QuietHoursError::UnknownTimezone`] if `settings.timezone`
    /// is not a recognized IANA timezone name.
    pub fn new(settings: QuietHoursSettings) -> QuietHoursResult<Self> {
        let tz: Tz = settings
            .timezone
            .parse()
            .map_err(|_| QuietHoursError::UnknownTimezone(settings.timezone.clone()))?;
        Ok(Self { settings, tz })
    }

    /// Whether quiet hours are currently in effect.
    ///
    /// Always `false` if the gate is disabled. Supports overnight spans
    /// (`start_hour > end_hour`, e.g. 22 → 7).
    #[must_use]
    pub fn is_quiet_hours(&self) -> bool {
        if !self.settings.enabled {
            return false;
        }
        let now_hour = Utc::now().with_timezone(&self.tz).hour_u8();
        self.hour_is_quiet(now_hour)
    }

    fn hour_is_quiet(&self, hour: u8) -> bool {
        let start = self.settings.start_hour;
        let end = self.settings.end_hour;
        if start == end {
            // A zero-width or full-day window: treat as "always quiet"
            // only when the gate is meaningfully configured; an
            // identity that sets start == end almost certainly means
            // "quiet hours span the whole day" is not intended, so we
            // treat it as never-quiet to fail open on a degenerate config.
            return false;
        }
        if start < end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    /// Current status, including seconds until the next quiet/active
    /// transition.
    #[must_use]
    pub fn status(&self) -> QuietHoursStatus {
        if !self.settings.enabled {
            return QuietHoursStatus {
                is_quiet: false,
                seconds_until_transition: i64::MAX,
            };
        }

        let now_local = Utc::now().with_timezone(&self.tz);
        let now_hour = now_local.hour_u8();
        let is_quiet = self.hour_is_quiet(now_hour);

        let transition_hour = if is_quiet {
            self.settings.end_hour
        } else {
            self.settings.start_hour
        };

        let today_transition = self
            .tz
            .with_ymd_and_hms(
                now_local.year(),
                now_local.month(),
                now_local.day(),
                u32::from(transition_hour),
                0,
                0,
            )
            .single();

        let Some(mut transition) = today_transition else {
            return QuietHoursStatus {
                is_quiet,
                seconds_until_transition: 0,
            };
        };

        if transition <= now_local {
            transition += chrono::Duration::days(1);
        }

        let seconds = (transition - now_local).num_seconds().max(0);
        QuietHoursStatus {
            is_quiet,
            seconds_until_transition: seconds,
        }
    }
}

trait HourExt {
    fn hour_u8(&self) -> u8;
    fn year(&self) -> i32;
    fn month(&self) -> u32;
    fn day(&self) -> u32;
}

impl<Tz2: TimeZone> HourExt for chrono::DateTime<Tz2> {
    fn hour_u8(&self) -> u8 {
        u8::try_from(chrono::Timelike::hour(self)).unwrap_or(0)
    }
    fn year(&self) -> i32 {
        chrono::Datelike::year(self)
    }
    fn month(&self) -> u32 {
        chrono::Datelike::month(self)
    }
    fn day(&self) -> u32 {
        chrono::Datelike::day(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(enabled: bool, start: u8, end: u8) -> QuietHoursSettings {
        QuietHoursSettings {
            enabled,
            timezone: "UTC".to_string(),
            start_hour: start,
            end_hour: end,
        }
    }

    #[test]
    fn disabled_gate_is_never_quiet() {
        let gate = QuietHoursGate::new(settings(false, 22, 7)).unwrap();
        assert!(!gate.is_quiet_hours());
    }

    #[test]
    fn overnight_span_wraps_midnight() {
        let gate = QuietHoursGate::new(settings(true, 22, 7)).unwrap();
        assert!(gate.hour_is_quiet(23));
        assert!(gate.hour_is_quiet(0));
        assert!(gate.hour_is_quiet(6));
        assert!(!gate.hour_is_quiet(7));
        assert!(!gate.hour_is_quiet(12));
    }

    #[test]
    fn same_day_span_does_not_wrap() {
        let gate = QuietHoursGate::new(settings(true, 9, 17)).unwrap();
        assert!(gate.hour_is_quiet(10));
        assert!(!gate.hour_is_quiet(8));
        assert!(!gate.hour_is_quiet(17));
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let mut bad = settings(true, 22, 7);
        bad.timezone = "Not/A_Timezone".to_string();
        assert!(matches!(
            QuietHoursGate::new(bad),
            Err(QuietHoursError::UnknownTimezone(_))
        ));
    }

    #[test]
    fn status_reports_future_transition() {
        let gate = QuietHoursGate::new(settings(true, 22, 7)).unwrap();
        let status = gate.status();
        assert!(status.seconds_until_transition >= 0);
    }
}
