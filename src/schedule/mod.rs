//! Due-time evaluation, shared by both trigger paths.
//!
//! The OS-notification path and the background checker both decide whether
//! an alarm should fire through [`evaluate`], so the two paths can never
//! disagree about what "due" means. Firing is minute-granular; seconds are
//! ignored everywhere.
//!
//! Weekday numbering is canonically 0 = Sunday through 6 = Saturday.

use chrono::{DateTime, Datelike, Days, Local, TimeZone, Timelike};

use crate::types::Alarm;

// ============================================================================
// DueReason
// ============================================================================

/// Why an alarm is due at the evaluated instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueReason {
    /// A pending snooze deadline has been reached.
    Snooze,
    /// A one-shot alarm's time-of-day matched.
    OneShot,
    /// A repeating alarm matched today's weekday and time-of-day.
    Repeat,
}

// ============================================================================
// Evaluation
// ============================================================================

/// Returns the weekday index (0 = Sunday .. 6 = Saturday) of a local instant.
#[must_use]
pub fn weekday_index(at: DateTime<Local>) -> u8 {
    at.weekday().num_days_from_sunday() as u8
}

/// Truncates an instant to minute granularity for comparison.
fn minute_of(at: DateTime<Local>) -> i64 {
    at.timestamp().div_euclid(60)
}

/// Answers "should this alarm fire now?".
///
/// Rules, in order:
/// 1. Disabled alarms never fire.
/// 2. A set `snooze_until` bypasses the time-of-day match: the alarm fires
///    once the current minute reaches the snooze minute.
/// 3. A one-shot alarm fires when the current (hour, minute) exactly equals
///    its time; the caller disables it after the fire-and-stop cycle.
/// 4. A repeating alarm additionally requires today's weekday to be in its
///    repeat set.
#[must_use]
pub fn evaluate(alarm: &Alarm, now: DateTime<Local>) -> Option<DueReason> {
    if !alarm.enabled {
        return None;
    }

    if let Some(snooze_until) = alarm.snooze_until {
        if minute_of(now) >= minute_of(snooze_until) {
            return Some(DueReason::Snooze);
        }
        return None;
    }

    let (hour, minute) = alarm.time.as_tuple();
    if now.hour() != hour || now.minute() != minute {
        return None;
    }

    if alarm.is_one_shot() {
        return Some(DueReason::OneShot);
    }

    if alarm.repeat_days.contains(&weekday_index(now)) {
        return Some(DueReason::Repeat);
    }

    None
}

/// Computes the next instant at which the alarm should fire, strictly after
/// `after`. Used to schedule the OS-level notification.
///
/// A pending snooze deadline wins over the regular schedule. Returns `None`
/// for disabled alarms or repeating alarms with an empty-but-invalid day set
/// (no candidate within the next week).
#[must_use]
pub fn next_occurrence(alarm: &Alarm, after: DateTime<Local>) -> Option<DateTime<Local>> {
    if !alarm.enabled {
        return None;
    }

    if let Some(snooze_until) = alarm.snooze_until {
        return Some(snooze_until);
    }

    let (hour, minute) = alarm.time.as_tuple();
    for days_ahead in 0..=7u64 {
        let date = after.date_naive().checked_add_days(Days::new(days_ahead))?;
        let Some(naive) = date.and_hms_opt(hour, minute, 0) else {
            continue;
        };
        // A DST gap can make a local time nonexistent; skip to the next day.
        let Some(candidate) = Local.from_local_datetime(&naive).earliest() else {
            continue;
        };
        if candidate <= after {
            continue;
        }
        if alarm.is_one_shot() || alarm.repeat_days.contains(&weekday_index(candidate)) {
            return Some(candidate);
        }
    }

    None
}

// ============================================================================
// Tests
// ============================================================================
