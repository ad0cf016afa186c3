//! Working-hours policy.
//!
//! The analysis job splits a privileged user's events into in-hours and
//! off-hours subsets before detection; the off-hours detector itself never
//! re-checks timestamps (it only counts what the caller hands it).

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use siem_core::SecurityEvent;

fn default_start_hour() -> u32 {
    8
}

fn default_end_hour() -> u32 {
    18
}

/// Working window definition. Defaults to Mon-Fri 08:00-18:00.
///
/// "Local" time is made explicit as a configured UTC offset instead of the
/// host timezone, so the policy survives deployment moves unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkingHoursPolicy {
    /// First working hour, inclusive.
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
    /// End of the working day, exclusive (18 means 18:00 is off-hours).
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
    /// Minutes east of UTC applied before the weekday/hour check.
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Saturday and Sunday count as working days when set.
    #[serde(default)]
    pub include_weekends: bool,
}

impl Default for WorkingHoursPolicy {
    fn default() -> Self {
        Self {
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            utc_offset_minutes: 0,
            include_weekends: false,
        }
    }
}

impl WorkingHoursPolicy {
    pub fn is_within_working_hours(&self, ts: DateTime<Utc>) -> bool {
        let local = ts + Duration::minutes(i64::from(self.utc_offset_minutes));
        if !self.include_weekends && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        local.hour() >= self.start_hour && local.hour() < self.end_hour
    }

    pub fn is_off_hours(&self, ts: DateTime<Utc>) -> bool {
        !self.is_within_working_hours(ts)
    }

    /// Events falling outside the working window, order preserved.
    pub fn filter_off_hours(&self, events: &[SecurityEvent]) -> Vec<SecurityEvent> {
        events
            .iter()
            .filter(|e| self.is_off_hours(e.timestamp))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_weekday_working_window() {
        let policy = WorkingHoursPolicy::default();
        // 2026-03-02 is a Monday
        assert!(policy.is_within_working_hours(at(2026, 3, 2, 8, 0)));
        assert!(policy.is_within_working_hours(at(2026, 3, 2, 17, 59)));
        assert!(policy.is_off_hours(at(2026, 3, 2, 7, 59)));
        assert!(policy.is_off_hours(at(2026, 3, 2, 18, 0)));
        assert!(policy.is_off_hours(at(2026, 3, 2, 23, 30)));
    }

    #[test]
    fn test_weekends_are_off_hours_by_default() {
        let policy = WorkingHoursPolicy::default();
        // 2026-03-07 is a Saturday
        assert!(policy.is_off_hours(at(2026, 3, 7, 12, 0)));
        let weekend_policy = WorkingHoursPolicy {
            include_weekends: true,
            ..Default::default()
        };
        assert!(weekend_policy.is_within_working_hours(at(2026, 3, 7, 12, 0)));
    }

    #[test]
    fn test_utc_offset_shifts_the_window() {
        // UTC+5:30: 03:00 UTC is 08:30 local, inside the window
        let policy = WorkingHoursPolicy {
            utc_offset_minutes: 330,
            ..Default::default()
        };
        assert!(policy.is_within_working_hours(at(2026, 3, 2, 3, 0)));
        assert!(policy.is_off_hours(at(2026, 3, 2, 2, 0)));
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: WorkingHoursPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, WorkingHoursPolicy::default());
        let custom: WorkingHoursPolicy =
            serde_json::from_str(r#"{"start_hour": 9, "end_hour": 17}"#).unwrap();
        assert_eq!(custom.start_hour, 9);
        assert_eq!(custom.end_hour, 17);
        assert_eq!(custom.utc_offset_minutes, 0);
    }
}
