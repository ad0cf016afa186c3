//! Off-hours access heuristic.
//!
//! The caller filters the batch against the working-hours policy first
//! and passes only the off-hours subset; this function never re-checks
//! timestamps. Any off-hours activity at all is at least LOW.

use chrono::{DateTime, Utc};
use siem_core::{DetectionResult, RiskLevel, SecurityEvent, ThreatMetadata, ThreatType};

const CRITICAL_THRESHOLD: usize = 20;
const HIGH_THRESHOLD: usize = 10;
const MEDIUM_THRESHOLD: usize = 5;

pub fn detect_off_hours_access(
    user_id: &str,
    off_hours_events: &[SecurityEvent],
    analysis_time: DateTime<Utc>,
) -> Option<DetectionResult> {
    let count = off_hours_events.len();
    if count == 0 {
        return None;
    }

    let risk_level = if count >= CRITICAL_THRESHOLD {
        RiskLevel::Critical
    } else if count >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if count >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    Some(DetectionResult {
        threat_type: ThreatType::OffHoursAccess,
        risk_level,
        description: format!(
            "User {} accessed systems {} times outside working hours",
            user_id, count
        ),
        metadata: ThreatMetadata::OffHoursAccess {
            event_count: count,
            critical_threshold: CRITICAL_THRESHOLD,
            high_threshold: HIGH_THRESHOLD,
            medium_threshold: MEDIUM_THRESHOLD,
            analysis_time,
        },
        correlated_event_ids: off_hours_events.iter().map(|e| e.id).collect(),
    })
}
