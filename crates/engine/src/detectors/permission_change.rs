//! Permission change heuristic: repeated privilege or role manipulation
//! among WARNING/INFO events in one window.

use chrono::{DateTime, Utc};
use siem_core::{DetectionResult, EventType, RiskLevel, SecurityEvent, ThreatMetadata, ThreatType};

use super::description_matches;

const PERMISSION_KEYWORDS: &[&str] = &[
    "permission",
    "privilege",
    "role chang",
    "elevated access",
    "access level",
];

const CRITICAL_THRESHOLD: usize = 10;
const HIGH_THRESHOLD: usize = 5;
const MEDIUM_THRESHOLD: usize = 3;

fn is_permission_change(event: &SecurityEvent) -> bool {
    matches!(event.event_type, EventType::Warning | EventType::Info)
        && description_matches(&event.description, PERMISSION_KEYWORDS)
}

pub fn detect_permission_change(
    user_id: &str,
    events: &[SecurityEvent],
    analysis_time: DateTime<Utc>,
) -> Option<DetectionResult> {
    let matched: Vec<&SecurityEvent> = events.iter().filter(|e| is_permission_change(e)).collect();
    let count = matched.len();

    let risk_level = if count >= CRITICAL_THRESHOLD {
        RiskLevel::Critical
    } else if count >= HIGH_THRESHOLD {
        RiskLevel::High
    } else if count >= MEDIUM_THRESHOLD {
        RiskLevel::Medium
    } else {
        return None;
    };

    Some(DetectionResult {
        threat_type: ThreatType::PermissionChange,
        risk_level,
        description: format!(
            "User {} made {} permission or privilege changes",
            user_id, count
        ),
        metadata: ThreatMetadata::PermissionChange {
            event_count: count,
            critical_threshold: CRITICAL_THRESHOLD,
            high_threshold: HIGH_THRESHOLD,
            medium_threshold: MEDIUM_THRESHOLD,
            analysis_time,
        },
        correlated_event_ids: matched.iter().map(|e| e.id).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::event;
    use super::*;

    fn permission_events(n: usize, event_type: EventType) -> Vec<SecurityEvent> {
        (0..n)
            .map(|i| {
                event(
                    i as i64 + 1,
                    event_type,
                    "Permission granted on share \\\\fs01\\payroll",
                    Utc::now(),
                )
            })
            .collect()
    }

    #[test]
    fn test_two_changes_are_below_the_floor() {
        let events = permission_events(2, EventType::Warning);
        assert!(detect_permission_change("admin.blake", &events, Utc::now()).is_none());
    }

    #[test]
    fn test_tier_boundaries() {
        let cases = [
            (3, RiskLevel::Medium),
            (4, RiskLevel::Medium),
            (5, RiskLevel::High),
            (9, RiskLevel::High),
            (10, RiskLevel::Critical),
        ];
        for (count, expected) in cases {
            let result = detect_permission_change(
                "admin.blake",
                &permission_events(count, EventType::Warning),
                Utc::now(),
            )
            .unwrap_or_else(|| panic!("count {} should detect", count));
            assert_eq!(result.risk_level, expected, "count {}", count);
        }
    }

    #[test]
    fn test_error_events_are_ignored() {
        // only WARNING/INFO events count toward the pattern
        let mut events = permission_events(2, EventType::Info);
        events.extend(permission_events(5, EventType::Error));
        assert!(detect_permission_change("admin.blake", &events, Utc::now()).is_none());
    }

    #[test]
    fn test_role_change_language_matches() {
        let events: Vec<SecurityEvent> = (0..3)
            .map(|i| {
                event(
                    i + 1,
                    EventType::Info,
                    "Role changed from auditor to administrator",
                    Utc::now(),
                )
            })
            .collect();
        let result = detect_permission_change("admin.blake", &events, Utc::now()).unwrap();
        assert_eq!(result.risk_level, RiskLevel::Medium);
        assert_eq!(result.correlated_event_ids, vec![1, 2, 3]);
    }
}
